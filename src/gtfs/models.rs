use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct GtfsAgency {
    /// Optional in single agency feeds.
    pub agency_id: Option<String>,
    pub agency_name: String,
    pub agency_url: String,
    pub agency_timezone: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct GtfsRoute {
    pub route_id: String,
    pub agency_id: Option<String>,
    pub route_short_name: Option<String>,
    pub route_long_name: Option<String>,
    pub route_desc: Option<String>,
    pub route_type: i32,
}

/// A row of `calendar.txt`. Weekday columns are `1` when the service runs.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct GtfsCalendar {
    pub service_id: String,
    pub monday: u8,
    pub tuesday: u8,
    pub wednesday: u8,
    pub thursday: u8,
    pub friday: u8,
    pub saturday: u8,
    pub sunday: u8,
    /// `YYYYMMDD`
    pub start_date: String,
    /// `YYYYMMDD`
    pub end_date: String,
}

/// A row of `calendar_dates.txt`. `exception_type` is `1` for added
/// service and `2` for removed service.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct GtfsCalendarDate {
    pub service_id: String,
    pub date: String,
    pub exception_type: u8,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct GtfsStop {
    pub stop_id: String,
    pub stop_name: Option<String>,
    pub stop_lat: Option<f64>,
    pub stop_lon: Option<f64>,
    pub location_type: Option<u8>,
    pub parent_station: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct GtfsTransfer {
    pub from_stop_id: String,
    pub to_stop_id: String,
    pub transfer_type: Option<u8>,
    pub min_transfer_time: Option<u32>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct GtfsStopTime {
    pub trip_id: String,
    pub arrival_time: Option<String>,
    pub departure_time: Option<String>,
    pub stop_id: String,
    pub stop_sequence: u32,
    pub stop_headsign: Option<String>,
    pub pickup_type: Option<u8>,
    pub drop_off_type: Option<u8>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct GtfsTrip {
    pub route_id: String,
    pub service_id: String,
    pub trip_id: String,
    pub trip_headsign: Option<String>,
    pub trip_short_name: Option<String>,
    pub direction_id: Option<u8>,
}
