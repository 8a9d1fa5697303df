use std::{fmt::Display, sync::Arc};

use crate::shared::{
    geo::Coordinate,
    time::{Duration, Time},
};

/// A transit operator.
#[derive(Debug, Default, Clone)]
pub struct Agency {
    /// The global internal index used for O(1) array lookups in the repository.
    pub index: u32,
    /// The unique external identifier.
    pub id: Arc<str>,
    pub name: Arc<str>,
    pub url: Arc<str>,
    pub timezone: Arc<str>,
}

/// Classification of the vehicle serving a route.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum RouteType {
    Tram,
    Subway,
    Rail,
    #[default]
    Bus,
    Ferry,
    CableTram,
    AerialLift,
    Funicular,
    Trolleybus,
    Monorail,
    /// Extended route types and anything else outside the basic set.
    Other(i32),
}

impl From<i32> for RouteType {
    fn from(value: i32) -> Self {
        match value {
            0 => Self::Tram,
            1 => Self::Subway,
            2 => Self::Rail,
            3 => Self::Bus,
            4 => Self::Ferry,
            5 => Self::CableTram,
            6 => Self::AerialLift,
            7 => Self::Funicular,
            11 => Self::Trolleybus,
            12 => Self::Monorail,
            other => Self::Other(other),
        }
    }
}

impl Display for RouteType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouteType::Tram => f.write_str("Tram"),
            RouteType::Subway => f.write_str("Subway"),
            RouteType::Rail => f.write_str("Rail"),
            RouteType::Bus => f.write_str("Bus"),
            RouteType::Ferry => f.write_str("Ferry"),
            RouteType::CableTram => f.write_str("Cable tram"),
            RouteType::AerialLift => f.write_str("Aerial lift"),
            RouteType::Funicular => f.write_str("Funicular"),
            RouteType::Trolleybus => f.write_str("Trolleybus"),
            RouteType::Monorail => f.write_str("Monorail"),
            RouteType::Other(value) => write!(f, "Route type {value}"),
        }
    }
}

/// A grouping of trips that are displayed to riders under a single name (e.g., "Blue Line").
#[derive(Debug, Default, Clone)]
pub struct Route {
    pub index: u32,
    pub id: Arc<str>,
    /// Pointer to the owning [`Agency`].
    pub agency_idx: u32,
    pub short_name: Option<Arc<str>>,
    pub long_name: Option<Arc<str>>,
    pub desc: Option<Arc<str>>,
    pub route_type: RouteType,
}

impl Route {
    /// Best available display name.
    pub fn name(&self) -> &str {
        self.short_name
            .as_deref()
            .or(self.long_name.as_deref())
            .unwrap_or(&self.id)
    }
}

/// Categorizes the specific nature of a stop location.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum LocationType {
    /// A standard bus stop or platform.
    #[default]
    Stop,
    /// A station containing one or more stops.
    Station,
    /// A specific physical entrance to a station.
    Entrance,
    /// A generic node in a station.
    Node,
    /// A specific designated boarding point.
    Boarding,
}

impl From<u8> for LocationType {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Station,
            2 => Self::Entrance,
            3 => Self::Node,
            4 => Self::Boarding,
            _ => Self::Stop,
        }
    }
}

/// A physical point where passengers can board or alight from a vehicle.
#[derive(Debug, Default, Clone)]
pub struct Stop {
    /// The global internal index for this stop.
    pub index: u32,
    /// Unique external identifier for the stop.
    pub id: Arc<str>,
    /// Human-readable name (e.g., "Main St & 4th Ave").
    pub name: Arc<str>,
    pub coordinate: Coordinate,
    pub location_type: LocationType,
    /// Index of the parent station, if any. Non-owning.
    pub parent_idx: Option<u32>,
}

/// Whether passengers may board or alight at a stop time.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum StopAccessType {
    #[default]
    Regularly,
    NoneAvailable,
    AgencyArrange,
    DriverArrange,
}

impl From<u8> for StopAccessType {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::NoneAvailable,
            2 => Self::AgencyArrange,
            3 => Self::DriverArrange,
            _ => Self::Regularly,
        }
    }
}

impl StopAccessType {
    pub fn is_available(&self) -> bool {
        !matches!(self, StopAccessType::NoneAvailable)
    }
}

/// Metadata describing a contiguous range within the global `stop_times` array.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slice {
    /// The index where the trip's stop times begin.
    pub start_idx: u32,
    /// The total number of stop times in the trip.
    pub count: u32,
}

impl Slice {
    pub fn range(&self) -> std::ops::Range<usize> {
        self.start_idx as usize..(self.start_idx + self.count) as usize
    }
}

/// Individual event within a trip where a vehicle calls at a stop.
#[derive(Debug, Default, Clone)]
pub struct StopTime {
    /// Global internal index of this stop time record.
    pub index: u32,
    /// Internal index of the parent [`Trip`].
    pub trip_idx: u32,
    /// Internal index of the associated [`Stop`].
    pub stop_idx: u32,
    /// The order of this stop within the trip, strictly increasing.
    pub sequence: u32,
    /// Pointer to the full range of stop times for the parent trip.
    pub slice: Slice,
    /// Zero-based position of this stop within its trip.
    pub inner_idx: u32,
    pub arrival_time: Time,
    pub departure_time: Time,
    /// Destination shown to passengers when at this stop.
    pub headsign: Option<Arc<str>>,
    pub pickup_type: StopAccessType,
    pub drop_off_type: StopAccessType,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum TransferType {
    #[default]
    Recommended,
    Timed,
    MinimumTime,
}

impl TransferType {
    /// Maps the GTFS code. Codes that are not walking connections yield `None`.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Recommended),
            1 => Some(Self::Timed),
            2 => Some(Self::MinimumTime),
            _ => None,
        }
    }
}

/// A walking connection between two stops.
#[derive(Debug, Default, Clone)]
pub struct Transfer {
    pub index: u32,
    pub from_stop_idx: u32,
    pub to_stop_idx: u32,
    pub transfer_type: TransferType,
    pub duration: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outbound,
    Inbound,
}

/// A specific journey taken by a vehicle through a sequence of stops.
#[derive(Debug, Default, Clone)]
pub struct Trip {
    pub index: u32,
    pub id: Arc<str>,
    /// Pointer to the parent [`Route`].
    pub route_idx: u32,
    /// Pointer to the [`Service`](super::Service) deciding on which dates it runs.
    pub service_idx: u32,
    pub headsign: Option<Arc<str>>,
    pub short_name: Option<Arc<str>>,
    pub direction: Option<Direction>,
}
