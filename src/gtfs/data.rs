use crate::gtfs::{
    GtfsAgency, GtfsCalendar, GtfsCalendarDate, GtfsRoute, GtfsStop, GtfsStopTime, GtfsTransfer,
    GtfsTrip,
};

/// A feed already held in memory, one vector per table.
///
/// `None` marks a table that is absent from the feed, which matters for
/// the optional tables.
#[derive(Default, Debug, Clone)]
pub struct GtfsData {
    pub agencies: Vec<GtfsAgency>,
    pub routes: Vec<GtfsRoute>,
    pub calendars: Option<Vec<GtfsCalendar>>,
    pub calendar_dates: Option<Vec<GtfsCalendarDate>>,
    pub stops: Vec<GtfsStop>,
    pub trips: Vec<GtfsTrip>,
    pub stop_times: Vec<GtfsStopTime>,
    pub transfers: Option<Vec<GtfsTransfer>>,
}
