pub use crate::{
    gtfs::Gtfs,
    planner::{Itinerary, Leg, LegKind, Planner, Query, SearchConfig, SearchStats},
    repository::Repository,
    shared::{Duration, Time},
};
