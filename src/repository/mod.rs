use std::{collections::HashMap, sync::Arc};

mod calendar;
mod models;
mod source;
pub use calendar::*;
pub use models::*;
use rayon::prelude::*;
use thiserror::Error;

use crate::{
    gtfs,
    planner::{self, Itinerary, Planner, Query, SearchConfig},
    shared::time::Time,
};

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Gtfs(#[from] gtfs::Error),
    #[error("{entity} with id {id} does not exist")]
    NotFound { entity: &'static str, id: String },
    #[error("{entity} {id} references unknown {reference} {target}")]
    MissingReference {
        entity: &'static str,
        id: String,
        reference: &'static str,
        target: String,
    },
    #[error("Duplicate {entity} id: {id}")]
    DuplicateId { entity: &'static str, id: String },
    #[error("Invalid time {value:?} in {context}")]
    InvalidTime { value: String, context: String },
    #[error("Invalid date {value:?} in {context}")]
    InvalidDate { value: String, context: String },
    #[error("Trip {trip_id} has an invalid schedule: {reason}")]
    InvalidSchedule { trip_id: String, reason: String },
}

type IdToIndex = HashMap<Arc<str>, u32>;
type IndexToIndexes = Box<[Box<[u32]>]>;

/// The schedule graph.
///
/// Entities live in flat arenas and reference each other by `u32` index.
/// A repository is built once by [`Repository::load_gtfs`] and is read only
/// afterwards, so it can be shared between threads answering queries.
#[derive(Debug, Clone, Default)]
pub struct Repository {
    pub agencies: Box<[Agency]>,
    pub routes: Box<[Route]>,
    pub services: Box<[Service]>,
    pub stops: Box<[Stop]>,
    pub trips: Box<[Trip]>,
    /// Grouped by trip, each group ordered by sequence.
    pub stop_times: Box<[StopTime]>,
    pub transfers: Box<[Transfer]>,

    agency_lookup: IdToIndex,
    route_lookup: IdToIndex,
    service_lookup: IdToIndex,
    stop_lookup: IdToIndex,
    trip_lookup: IdToIndex,

    agency_to_routes: IndexToIndexes,
    route_to_trips: IndexToIndexes,
    station_to_stops: IndexToIndexes,
    trip_to_stop_times_slice: Box<[Slice]>,
    /// Stop time indexes per stop, ordered by departure time then index.
    stop_to_departures: IndexToIndexes,
    stop_to_transfers: IndexToIndexes,
}

impl Repository {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn agency_by_id(&self, id: &str) -> Result<&Agency, self::Error> {
        let index = lookup(&self.agency_lookup, "Agency", id)?;
        Ok(&self.agencies[index as usize])
    }

    pub fn route_by_id(&self, id: &str) -> Result<&Route, self::Error> {
        let index = lookup(&self.route_lookup, "Route", id)?;
        Ok(&self.routes[index as usize])
    }

    pub fn service_by_id(&self, id: &str) -> Result<&Service, self::Error> {
        let index = lookup(&self.service_lookup, "Service", id)?;
        Ok(&self.services[index as usize])
    }

    pub fn stop_by_id(&self, id: &str) -> Result<&Stop, self::Error> {
        let index = lookup(&self.stop_lookup, "Stop", id)?;
        Ok(&self.stops[index as usize])
    }

    pub fn trip_by_id(&self, id: &str) -> Result<&Trip, self::Error> {
        let index = lookup(&self.trip_lookup, "Trip", id)?;
        Ok(&self.trips[index as usize])
    }

    pub fn routes_by_agency_idx(&self, agency_idx: u32) -> Vec<&Route> {
        self.agency_to_routes[agency_idx as usize]
            .iter()
            .map(|route_idx| &self.routes[*route_idx as usize])
            .collect()
    }

    pub fn trips_by_route_idx(&self, route_idx: u32) -> Vec<&Trip> {
        self.route_to_trips[route_idx as usize]
            .iter()
            .map(|trip_idx| &self.trips[*trip_idx as usize])
            .collect()
    }

    /// Stops whose parent station is the given stop.
    pub fn children_by_stop_idx(&self, stop_idx: u32) -> Vec<&Stop> {
        self.station_to_stops[stop_idx as usize]
            .iter()
            .map(|child_idx| &self.stops[*child_idx as usize])
            .collect()
    }

    pub fn route_by_trip_idx(&self, trip_idx: u32) -> &Route {
        let trip = &self.trips[trip_idx as usize];
        &self.routes[trip.route_idx as usize]
    }

    pub fn service_by_trip_idx(&self, trip_idx: u32) -> &Service {
        let trip = &self.trips[trip_idx as usize];
        &self.services[trip.service_idx as usize]
    }

    /// All the stop times of a trip in sequence order.
    pub fn stop_times_by_trip_idx(&self, trip_idx: u32) -> &[StopTime] {
        let slice = self.trip_to_stop_times_slice[trip_idx as usize];
        &self.stop_times[slice.range()]
    }

    /// The stop times that follow `stop_time` within its trip.
    pub fn stop_times_after(&self, stop_time: &StopTime) -> &[StopTime] {
        let range = stop_time.slice.range();
        &self.stop_times[range.start + stop_time.inner_idx as usize + 1..range.end]
    }

    /// Stop time indexes calling at a stop, ordered by departure time.
    pub fn departures_by_stop_idx(&self, stop_idx: u32) -> &[u32] {
        &self.stop_to_departures[stop_idx as usize]
    }

    /// Stop times calling at a stop that depart at or after `time`,
    /// in departure order.
    pub fn departures_after(&self, stop_idx: u32, time: Time) -> impl Iterator<Item = &StopTime> {
        let departures = self.departures_by_stop_idx(stop_idx);
        let start = departures.partition_point(|stop_time_idx| {
            self.stop_times[*stop_time_idx as usize].departure_time < time
        });
        departures[start..]
            .iter()
            .map(|stop_time_idx| &self.stop_times[*stop_time_idx as usize])
    }

    /// Walking connections leaving a stop.
    pub fn transfers_by_stop_idx(&self, stop_idx: u32) -> impl Iterator<Item = &Transfer> {
        self.stop_to_transfers[stop_idx as usize]
            .iter()
            .map(|transfer_idx| &self.transfers[*transfer_idx as usize])
    }

    pub fn planner<'a>(&'a self, start: &'a str, finish: &'a str) -> Planner<'a> {
        Planner::new(self, start, finish)
    }

    /// Answers independent queries in parallel. Results keep the order of `queries`.
    pub fn plan_many(
        &self,
        queries: &[Query],
        config: &SearchConfig,
    ) -> Vec<Result<Itinerary, planner::Error>> {
        queries
            .par_iter()
            .map(|query| {
                self.planner(&query.start, &query.finish)
                    .departure_at(query.departure)
                    .with_config(config.clone())
                    .solve()
            })
            .collect()
    }
}

fn lookup(lookup: &IdToIndex, entity: &'static str, id: &str) -> Result<u32, self::Error> {
    lookup
        .get(id)
        .copied()
        .ok_or_else(|| self::Error::NotFound {
            entity,
            id: id.to_string(),
        })
}
