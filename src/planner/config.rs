use std::time::Duration;

use chrono::{Days, NaiveDate};

/// Tuning and budgets for a single earliest-arrival search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchConfig {
    /// How many service days before a label's date are scanned for departures.
    /// Trips running past midnight belong to the previous service day.
    pub days_back: u32,

    /// How many service days after a label's date are scanned.
    pub days_ahead: u32,

    /// Maximum number of labels popped from the queue before giving up.
    pub max_iterations: Option<usize>,

    /// Wall clock budget for the search.
    pub time_budget: Option<Duration>,
}

impl SearchConfig {
    pub fn new(days_back: u32, days_ahead: u32) -> Self {
        Self {
            days_back,
            days_ahead,
            ..Default::default()
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }

    pub fn with_time_budget(mut self, time_budget: Duration) -> Self {
        self.time_budget = Some(time_budget);
        self
    }

    /// The service dates scanned from a label on `date`, in ascending order.
    pub fn service_dates(&self, date: NaiveDate) -> impl Iterator<Item = NaiveDate> {
        let first = date
            .checked_sub_days(Days::new(self.days_back as u64))
            .unwrap_or(NaiveDate::MIN);
        let count = (self.days_back + self.days_ahead) as usize + 1;
        first.iter_days().take(count)
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            days_back: 3,
            days_ahead: 2,
            max_iterations: None,
            time_budget: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = SearchConfig::default();

        assert_eq!(config.days_back, 3);
        assert_eq!(config.days_ahead, 2);
        assert_eq!(config.max_iterations, None);
        assert_eq!(config.time_budget, None);
    }

    #[test]
    fn custom_config() {
        let config = SearchConfig::new(1, 0)
            .with_max_iterations(10)
            .with_time_budget(Duration::from_millis(250));

        assert_eq!(config.days_back, 1);
        assert_eq!(config.days_ahead, 0);
        assert_eq!(config.max_iterations, Some(10));
        assert_eq!(config.time_budget, Some(Duration::from_millis(250)));
    }

    #[test]
    fn service_dates_window() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let dates: Vec<NaiveDate> = SearchConfig::default().service_dates(date).collect();

        assert_eq!(dates.len(), 6);
        assert_eq!(dates[0], NaiveDate::from_ymd_opt(2023, 12, 29).unwrap());
        assert_eq!(dates[5], NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
        assert!(dates.windows(2).all(|pair| pair[0] < pair[1]));
    }
}
