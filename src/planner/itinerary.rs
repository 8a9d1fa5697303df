use std::sync::Arc;

use chrono::NaiveDateTime;

use crate::{
    planner::{
        path,
        state::{Arrival, State},
    },
    repository::Repository,
    shared::time::Duration,
};

/// Counters describing the work a search did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SearchStats {
    pub labels_enqueued: usize,
    pub labels_popped: usize,
    /// Distinct trip runs boarded.
    pub trips_expanded: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LegKind {
    /// The journey's starting point.
    Origin,
    Ride {
        trip_idx: u32,
        route_idx: u32,
        /// Stop the trip was boarded at.
        from_stop_idx: u32,
        departure: NaiveDateTime,
        /// Stop time the trip was left at.
        stop_time_idx: u32,
        headsign: Option<Arc<str>>,
    },
    Walk {
        transfer_idx: u32,
        from_stop_idx: u32,
        duration: Duration,
    },
}

/// Arrival at one stop of the journey and how it was reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leg {
    pub stop_idx: u32,
    pub stop_id: Arc<str>,
    pub stop_name: Arc<str>,
    pub arrival: NaiveDateTime,
    pub kind: LegKind,
}

impl Leg {
    pub fn is_ride(&self) -> bool {
        matches!(self.kind, LegKind::Ride { .. })
    }

    pub fn is_walk(&self) -> bool {
        matches!(self.kind, LegKind::Walk { .. })
    }
}

#[derive(Debug, Clone)]
pub struct Itinerary {
    pub start_idx: u32,
    pub finish_idx: u32,
    pub departure: NaiveDateTime,
    /// The first leg is always the origin.
    pub legs: Vec<Leg>,
    pub stats: SearchStats,
}

impl Itinerary {
    pub(crate) fn new(
        repository: &Repository,
        state: &State,
        target_label: u32,
        departure: NaiveDateTime,
    ) -> Self {
        let legs: Vec<Leg> = path::backtrack(repository, state, target_label)
            .into_iter()
            .map(|label_idx| {
                let label = &state.labels[label_idx as usize];
                let stop = &repository.stops[label.stop_idx as usize];
                let kind = match label.arrival_by {
                    Arrival::Origin => LegKind::Origin,
                    Arrival::Ride {
                        boarding,
                        alighting,
                        service_date,
                    } => {
                        let boarding = &repository.stop_times[boarding as usize];
                        let trip = &repository.trips[boarding.trip_idx as usize];
                        LegKind::Ride {
                            trip_idx: trip.index,
                            route_idx: trip.route_idx,
                            from_stop_idx: boarding.stop_idx,
                            departure: boarding.departure_time.on(service_date),
                            stop_time_idx: alighting,
                            headsign: boarding.headsign.clone().or(trip.headsign.clone()),
                        }
                    }
                    Arrival::Walk { transfer_idx } => {
                        let transfer = &repository.transfers[transfer_idx as usize];
                        LegKind::Walk {
                            transfer_idx,
                            from_stop_idx: transfer.from_stop_idx,
                            duration: transfer.duration,
                        }
                    }
                };
                Leg {
                    stop_idx: stop.index,
                    stop_id: stop.id.clone(),
                    stop_name: stop.name.clone(),
                    arrival: label.arrival,
                    kind,
                }
            })
            .collect();

        Self {
            start_idx: legs.first().map(|leg| leg.stop_idx).unwrap_or_default(),
            finish_idx: legs.last().map(|leg| leg.stop_idx).unwrap_or_default(),
            departure,
            legs,
            stats: state.stats,
        }
    }

    /// Arrival time at the destination.
    pub fn arrival(&self) -> NaiveDateTime {
        self.legs
            .last()
            .map(|leg| leg.arrival)
            .unwrap_or(self.departure)
    }

    /// Number of vehicles boarded.
    pub fn rides(&self) -> usize {
        self.legs.iter().filter(|leg| leg.is_ride()).count()
    }
}
