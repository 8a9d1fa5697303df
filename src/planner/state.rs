use std::{
    cmp::Reverse,
    collections::{BinaryHeap, HashSet},
};

use chrono::{NaiveDate, NaiveDateTime};

use crate::planner::SearchStats;

/// How a label's stop was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Arrival {
    Origin,
    Ride {
        /// Stop time the trip was boarded at.
        boarding: u32,
        /// Stop time the trip was left at.
        alighting: u32,
        service_date: NaiveDate,
    },
    Walk {
        transfer_idx: u32,
    },
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Label {
    pub stop_idx: u32,
    pub arrival: NaiveDateTime,
    pub arrival_by: Arrival,
    /// Index into the label arena of the label this one was expanded from.
    pub parent: Option<u32>,
}

/// Per query search state. Labels are never removed, only appended.
pub(crate) struct State {
    pub labels: Vec<Label>,
    queue: BinaryHeap<Reverse<(NaiveDateTime, u32)>>,
    finalized: Vec<Option<u32>>,
    /// Trip runs already boarded, keyed by trip and service date.
    used_runs: HashSet<(u32, NaiveDate)>,
    target_idx: u32,
    best_target: Option<NaiveDateTime>,
    pub stats: SearchStats,
}

impl State {
    pub fn new(stop_count: usize, target_idx: u32) -> Self {
        Self {
            labels: Vec::new(),
            queue: BinaryHeap::new(),
            finalized: vec![None; stop_count],
            used_runs: HashSet::new(),
            target_idx,
            best_target: None,
            stats: SearchStats::default(),
        }
    }

    /// Appends a label and enqueues it keyed by arrival then insertion order.
    /// Labels for finalized stops can never win and are dropped.
    pub fn push(&mut self, label: Label) {
        if self.finalized[label.stop_idx as usize].is_some() {
            return;
        }
        if label.stop_idx == self.target_idx
            && self.best_target.is_none_or(|best| label.arrival < best)
        {
            self.best_target = Some(label.arrival);
        }
        let label_idx = self.labels.len() as u32;
        self.queue.push(Reverse((label.arrival, label_idx)));
        self.labels.push(label);
        self.stats.labels_enqueued += 1;
    }

    pub fn pop(&mut self) -> Option<u32> {
        let Reverse((_, label_idx)) = self.queue.pop()?;
        self.stats.labels_popped += 1;
        Some(label_idx)
    }

    /// Commits the label as the final one for its stop.
    /// Returns `false` when the stop already has a committed label.
    pub fn finalize(&mut self, label_idx: u32) -> bool {
        let stop_idx = self.labels[label_idx as usize].stop_idx as usize;
        if self.finalized[stop_idx].is_some() {
            return false;
        }
        self.finalized[stop_idx] = Some(label_idx);
        true
    }

    /// Marks a trip run as boarded. Returns `false` if it already was.
    pub fn mark_run(&mut self, trip_idx: u32, service_date: NaiveDate) -> bool {
        let inserted = self.used_runs.insert((trip_idx, service_date));
        if inserted {
            self.stats.trips_expanded += 1;
        }
        inserted
    }

    /// Earliest arrival at the target enqueued so far.
    pub fn best_target(&self) -> Option<NaiveDateTime> {
        self.best_target
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(hour: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(hour, min, 0)
            .unwrap()
    }

    fn label(stop_idx: u32, arrival: NaiveDateTime) -> Label {
        Label {
            stop_idx,
            arrival,
            arrival_by: Arrival::Origin,
            parent: None,
        }
    }

    #[test]
    fn pops_by_arrival_then_insertion() {
        let mut state = State::new(4, 3);
        state.push(label(0, at(10, 0)));
        state.push(label(1, at(9, 0)));
        state.push(label(2, at(10, 0)));

        assert_eq!(state.pop(), Some(1));
        assert_eq!(state.pop(), Some(0));
        assert_eq!(state.pop(), Some(2));
        assert_eq!(state.pop(), None);
        assert_eq!(state.stats.labels_popped, 3);
    }

    #[test]
    fn finalize_once() {
        let mut state = State::new(2, 1);
        state.push(label(0, at(8, 0)));
        state.push(label(0, at(9, 0)));

        assert!(state.finalize(0));
        assert!(!state.finalize(1));
        state.push(label(0, at(7, 0)));
        assert_eq!(state.stats.labels_enqueued, 2);
    }

    #[test]
    fn tracks_best_target() {
        let mut state = State::new(2, 1);
        assert_eq!(state.best_target(), None);
        state.push(label(1, at(11, 0)));
        state.push(label(1, at(10, 30)));
        state.push(label(1, at(12, 0)));
        assert_eq!(state.best_target(), Some(at(10, 30)));
    }

    #[test]
    fn trip_runs_are_per_date() {
        let mut state = State::new(1, 0);
        let monday = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let tuesday = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();

        assert!(state.mark_run(7, monday));
        assert!(!state.mark_run(7, monday));
        assert!(state.mark_run(7, tuesday));
        assert_eq!(state.stats.trips_expanded, 2);
    }
}
