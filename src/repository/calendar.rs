use std::{collections::HashMap, ops::RangeInclusive, sync::Arc};

use chrono::{Datelike, NaiveDate, Weekday};

/// Set of weekdays a service runs on, one bit per day starting at Monday.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Weekdays(u8);

impl Weekdays {
    pub const EMPTY: Self = Self(0);
    pub const ALL: Self = Self(0b111_1111);

    pub fn with(mut self, day: Weekday) -> Self {
        self.insert(day);
        self
    }

    pub fn insert(&mut self, day: Weekday) {
        self.0 |= 1 << day.num_days_from_monday();
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & (1 << day.num_days_from_monday()) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl FromIterator<Weekday> for Weekdays {
    fn from_iter<T: IntoIterator<Item = Weekday>>(iter: T) -> Self {
        iter.into_iter().fold(Self::EMPTY, Weekdays::with)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceException {
    Added,
    Removed,
}

impl ServiceException {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Added),
            2 => Some(Self::Removed),
            _ => None,
        }
    }
}

/// The set of dates on which trips referencing it operate.
#[derive(Debug, Default, Clone)]
pub struct Service {
    pub index: u32,
    pub id: Arc<str>,
    pub weekdays: Weekdays,
    /// `None` for services defined only through exceptions.
    pub validity: Option<RangeInclusive<NaiveDate>>,
    pub exceptions: HashMap<NaiveDate, ServiceException>,
}

impl Service {
    /// Whether the service runs on `date`.
    ///
    /// An exception for the date wins over the weekly pattern.
    pub fn is_active(&self, date: NaiveDate) -> bool {
        if let Some(exception) = self.exceptions.get(&date) {
            return *exception == ServiceException::Added;
        }
        self.validity
            .as_ref()
            .is_some_and(|validity| validity.contains(&date))
            && self.weekdays.contains(date.weekday())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn weekday_service() -> Service {
        Service {
            index: 0,
            id: "WEEKDAYS".into(),
            weekdays: [
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
            ]
            .into_iter()
            .collect(),
            validity: Some(date(2024, 1, 1)..=date(2024, 12, 31)),
            exceptions: HashMap::new(),
        }
    }

    #[test]
    fn weekly_pattern() {
        let service = weekday_service();
        // 2024-01-01 is a Monday
        assert!(service.is_active(date(2024, 1, 1)));
        assert!(service.is_active(date(2024, 1, 5)));
        assert!(!service.is_active(date(2024, 1, 6)));
        assert!(!service.is_active(date(2024, 1, 7)));
    }

    #[test]
    fn outside_validity() {
        let service = weekday_service();
        assert!(!service.is_active(date(2023, 12, 29)));
        assert!(!service.is_active(date(2025, 1, 1)));
    }

    #[test]
    fn exception_added_outside_pattern() {
        let mut service = weekday_service();
        service
            .exceptions
            .insert(date(2024, 1, 6), ServiceException::Added);
        service
            .exceptions
            .insert(date(2025, 3, 1), ServiceException::Added);
        assert!(service.is_active(date(2024, 1, 6)));
        assert!(service.is_active(date(2025, 3, 1)));
    }

    #[test]
    fn exception_removed_inside_pattern() {
        let mut service = weekday_service();
        service
            .exceptions
            .insert(date(2024, 1, 2), ServiceException::Removed);
        assert!(!service.is_active(date(2024, 1, 2)));
        assert!(service.is_active(date(2024, 1, 3)));
    }

    #[test]
    fn exceptions_only_service() {
        let mut service = Service {
            weekdays: Weekdays::EMPTY,
            validity: None,
            ..Default::default()
        };
        service
            .exceptions
            .insert(date(2024, 7, 14), ServiceException::Added);
        assert!(service.is_active(date(2024, 7, 14)));
        assert!(!service.is_active(date(2024, 7, 15)));
    }

    #[test]
    fn weekdays_set() {
        let days = Weekdays::EMPTY.with(Weekday::Sun);
        assert!(days.contains(Weekday::Sun));
        assert!(!days.contains(Weekday::Mon));
        assert!(Weekdays::ALL.contains(Weekday::Wed));
        assert!(Weekdays::EMPTY.is_empty());
    }
}
