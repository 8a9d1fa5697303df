pub mod config;
pub mod itinerary;
mod path;
mod state;

pub use config::*;
pub use itinerary::*;

use std::time::Instant;

use chrono::{Local, NaiveDateTime};
use thiserror::Error;
use tracing::{debug, trace};

use crate::{
    planner::state::{Arrival, Label, State},
    repository::Repository,
    shared::time::{Time, seconds_since_midnight},
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Stop id {0} does not match any entry")]
    UnknownStop(String),
    #[error("No connection between the stops")]
    NoConnection,
    #[error("Search budget exhausted")]
    Timeout,
}

/// A journey request that can be answered independently of others.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub start: String,
    pub finish: String,
    pub departure: NaiveDateTime,
}

impl Query {
    pub fn new(start: impl Into<String>, finish: impl Into<String>, departure: NaiveDateTime) -> Self {
        Self {
            start: start.into(),
            finish: finish.into(),
            departure,
        }
    }
}

/// Earliest-arrival search between two stops.
///
/// Labels `(stop, arrival)` are settled in arrival order, the first label
/// settled at a stop being its earliest arrival. From a settled label every
/// trip run departing afterwards is boarded at most once per query and all
/// of its later calls are enqueued in one pass, together with the walking
/// transfers leaving the stop.
pub struct Planner<'a> {
    repository: &'a Repository,
    start: &'a str,
    finish: &'a str,
    departure: NaiveDateTime,
    config: SearchConfig,
}

impl<'a> Planner<'a> {
    pub fn new(repository: &'a Repository, start: &'a str, finish: &'a str) -> Self {
        Self {
            repository,
            start,
            finish,
            departure: Local::now().naive_local(),
            config: SearchConfig::default(),
        }
    }

    pub fn departure_at(mut self, departure: NaiveDateTime) -> Self {
        self.departure = departure;
        self
    }

    pub fn with_config(mut self, config: SearchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn solve(self) -> Result<Itinerary, self::Error> {
        let start = self
            .repository
            .stop_by_id(self.start)
            .map_err(|_| Error::UnknownStop(self.start.to_string()))?;
        let finish = self
            .repository
            .stop_by_id(self.finish)
            .map_err(|_| Error::UnknownStop(self.finish.to_string()))?;
        debug!(
            "Searching from [{}] {} to [{}] {} departing {}",
            start.id, start.name, finish.id, finish.name, self.departure
        );

        let now = Instant::now();
        let mut state = State::new(self.repository.stops.len(), finish.index);
        state.push(Label {
            stop_idx: start.index,
            arrival: self.departure,
            arrival_by: Arrival::Origin,
            parent: None,
        });

        while let Some(label_idx) = state.pop() {
            self.check_budget(&state, now)?;
            if !state.finalize(label_idx) {
                continue;
            }
            let label = state.labels[label_idx as usize];
            trace!(
                "Settled stop {} at {} (label {label_idx})",
                self.repository.stops[label.stop_idx as usize].id,
                label.arrival
            );
            if label.stop_idx == finish.index {
                let itinerary = Itinerary::new(self.repository, &state, label_idx, self.departure);
                debug!(
                    "Found arrival {} with {} legs in {:?} ({:?})",
                    label.arrival,
                    itinerary.legs.len(),
                    now.elapsed(),
                    state.stats
                );
                return Ok(itinerary);
            }
            self.expand_rides(&mut state, label_idx, label);
            self.expand_transfers(&mut state, label_idx, label);
        }

        debug!(
            "No connection found in {:?} ({:?})",
            now.elapsed(),
            state.stats
        );
        Err(Error::NoConnection)
    }

    fn check_budget(&self, state: &State, started: Instant) -> Result<(), self::Error> {
        if self
            .config
            .max_iterations
            .is_some_and(|max| state.stats.labels_popped > max)
        {
            debug!("Gave up after {} labels", state.stats.labels_popped);
            return Err(Error::Timeout);
        }
        if self
            .config
            .time_budget
            .is_some_and(|budget| started.elapsed() > budget)
        {
            debug!("Gave up after {:?}", started.elapsed());
            return Err(Error::Timeout);
        }
        Ok(())
    }

    fn expand_rides(&self, state: &mut State, label_idx: u32, label: Label) {
        for service_date in self.config.service_dates(label.arrival.date()) {
            // Departures on later service dates may have negative offsets
            // relative to the label, in which case all of them qualify.
            let offset = seconds_since_midnight(service_date, label.arrival);
            let earliest = Time::from_seconds(offset.clamp(0, u32::MAX as i64) as u32);

            for boarding in self.repository.departures_after(label.stop_idx, earliest) {
                let departure = boarding.departure_time.on(service_date);
                if state.best_target().is_some_and(|best| departure >= best) {
                    break;
                }
                if !boarding.pickup_type.is_available() {
                    continue;
                }
                if !self
                    .repository
                    .service_by_trip_idx(boarding.trip_idx)
                    .is_active(service_date)
                {
                    continue;
                }
                if !state.mark_run(boarding.trip_idx, service_date) {
                    continue;
                }
                trace!(
                    "Boarding trip {} on {service_date} at {departure}",
                    self.repository.trips[boarding.trip_idx as usize].id
                );
                for alighting in self.repository.stop_times_after(boarding) {
                    if !alighting.drop_off_type.is_available() {
                        continue;
                    }
                    state.push(Label {
                        stop_idx: alighting.stop_idx,
                        arrival: alighting.arrival_time.on(service_date),
                        arrival_by: Arrival::Ride {
                            boarding: boarding.index,
                            alighting: alighting.index,
                            service_date,
                        },
                        parent: Some(label_idx),
                    });
                }
            }
        }
    }

    fn expand_transfers(&self, state: &mut State, label_idx: u32, label: Label) {
        for transfer in self.repository.transfers_by_stop_idx(label.stop_idx) {
            state.push(Label {
                stop_idx: transfer.to_stop_idx,
                arrival: label.arrival + transfer.duration.to_time_delta(),
                arrival_by: Arrival::Walk {
                    transfer_idx: transfer.index,
                },
                parent: Some(label_idx),
            });
        }
    }
}
