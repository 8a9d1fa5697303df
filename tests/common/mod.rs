#![allow(dead_code)]

use std::{fs::File, io::Write, path::Path};

use chrono::{NaiveDate, NaiveDateTime};
use planner::{
    gtfs::{
        Gtfs, GtfsAgency, GtfsCalendar, GtfsCalendarDate, GtfsData, GtfsRoute, GtfsStop,
        GtfsStopTime, GtfsTransfer, GtfsTrip,
    },
    repository::Repository,
};
use serde::Serialize;

pub const EVERY_DAY: [u8; 7] = [1, 1, 1, 1, 1, 1, 1];

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn at(y: i32, m: u32, d: u32, hour: u32, min: u32) -> NaiveDateTime {
    date(y, m, d).and_hms_opt(hour, min, 0).unwrap()
}

/// One stop time row: stop id, arrival and departure.
pub type Call<'a> = (&'a str, &'a str, &'a str);

/// Builds small in-memory feeds. Every feed has a single agency `AG` and a
/// route `R1`, plus whatever the test adds.
pub struct FeedBuilder {
    pub data: GtfsData,
}

impl FeedBuilder {
    pub fn new() -> Self {
        let data = GtfsData {
            agencies: vec![GtfsAgency {
                agency_id: Some("AG".into()),
                agency_name: "Test Transit".into(),
                agency_url: "https://example.org".into(),
                agency_timezone: "Europe/Stockholm".into(),
            }],
            calendars: Some(Vec::new()),
            ..Default::default()
        };
        Self { data }.route("R1", "1")
    }

    pub fn route(mut self, id: &str, short_name: &str) -> Self {
        self.data.routes.push(GtfsRoute {
            route_id: id.into(),
            agency_id: Some("AG".into()),
            route_short_name: Some(short_name.into()),
            route_long_name: None,
            route_desc: Some("Bus".into()),
            route_type: 3,
        });
        self
    }

    pub fn stop(mut self, id: &str) -> Self {
        self.data.stops.push(GtfsStop {
            stop_id: id.into(),
            stop_name: Some(format!("Stop {id}")),
            stop_lat: Some(59.33),
            stop_lon: Some(18.06),
            location_type: None,
            parent_station: None,
        });
        self
    }

    pub fn stops(self, ids: &[&str]) -> Self {
        ids.iter().fold(self, |builder, id| builder.stop(id))
    }

    /// A weekly service, `weekdays` ordered Monday first.
    pub fn service(mut self, id: &str, weekdays: [u8; 7], start: &str, end: &str) -> Self {
        self.data
            .calendars
            .get_or_insert_with(Vec::new)
            .push(GtfsCalendar {
                service_id: id.into(),
                monday: weekdays[0],
                tuesday: weekdays[1],
                wednesday: weekdays[2],
                thursday: weekdays[3],
                friday: weekdays[4],
                saturday: weekdays[5],
                sunday: weekdays[6],
                start_date: start.into(),
                end_date: end.into(),
            });
        self
    }

    /// A service running every day for years around the test dates.
    pub fn daily_service(self, id: &str) -> Self {
        self.service(id, EVERY_DAY, "20200101", "20301231")
    }

    pub fn calendar_date(mut self, service_id: &str, date: &str, exception_type: u8) -> Self {
        self.data
            .calendar_dates
            .get_or_insert_with(Vec::new)
            .push(GtfsCalendarDate {
                service_id: service_id.into(),
                date: date.into(),
                exception_type,
            });
        self
    }

    pub fn trip(self, id: &str, service_id: &str, calls: &[Call]) -> Self {
        self.trip_on_route(id, "R1", service_id, calls)
    }

    pub fn trip_on_route(
        mut self,
        id: &str,
        route_id: &str,
        service_id: &str,
        calls: &[Call],
    ) -> Self {
        self.data.trips.push(GtfsTrip {
            route_id: route_id.into(),
            service_id: service_id.into(),
            trip_id: id.into(),
            trip_headsign: Some(format!("Towards {}", calls.last().map(|c| c.0).unwrap_or(""))),
            trip_short_name: None,
            direction_id: Some(0),
        });
        for (i, (stop_id, arrival, departure)) in calls.iter().enumerate() {
            self.data.stop_times.push(GtfsStopTime {
                trip_id: id.into(),
                arrival_time: Some(arrival.to_string()),
                departure_time: Some(departure.to_string()),
                stop_id: stop_id.to_string(),
                stop_sequence: (i as u32 + 1) * 10,
                stop_headsign: None,
                pickup_type: None,
                drop_off_type: None,
            });
        }
        self
    }

    /// Changes the pickup and drop off types of the stop time of `trip_id` at `stop_id`.
    pub fn access(mut self, trip_id: &str, stop_id: &str, pickup: u8, drop_off: u8) -> Self {
        self.data
            .stop_times
            .iter_mut()
            .filter(|st| st.trip_id == trip_id && st.stop_id == stop_id)
            .for_each(|st| {
                st.pickup_type = Some(pickup);
                st.drop_off_type = Some(drop_off);
            });
        self
    }

    pub fn transfer(mut self, from: &str, to: &str, seconds: u32) -> Self {
        self.data
            .transfers
            .get_or_insert_with(Vec::new)
            .push(GtfsTransfer {
                from_stop_id: from.into(),
                to_stop_id: to.into(),
                transfer_type: Some(2),
                min_transfer_time: Some(seconds),
            });
        self
    }

    pub fn gtfs(self) -> Gtfs {
        Gtfs::new().from_data(self.data)
    }

    pub fn build(self) -> Repository {
        Repository::new()
            .load_gtfs(self.gtfs())
            .expect("Failed to build repository")
    }
}

fn write_table<T: Serialize>(dir: &Path, name: &str, rows: &[T]) {
    let mut writer = csv::Writer::from_path(dir.join(name)).unwrap();
    for row in rows {
        writer.serialize(row).unwrap();
    }
    writer.flush().unwrap();
}

/// Writes the feed as a directory of csv tables. Absent optional tables are
/// left out.
pub fn write_feed(dir: &Path, data: &GtfsData) {
    write_table(dir, "agency.txt", &data.agencies);
    write_table(dir, "routes.txt", &data.routes);
    write_table(dir, "stops.txt", &data.stops);
    write_table(dir, "trips.txt", &data.trips);
    write_table(dir, "stop_times.txt", &data.stop_times);
    if let Some(calendars) = &data.calendars {
        write_table(dir, "calendar.txt", calendars);
    }
    if let Some(calendar_dates) = &data.calendar_dates {
        write_table(dir, "calendar_dates.txt", calendar_dates);
    }
    if let Some(transfers) = &data.transfers {
        write_table(dir, "transfers.txt", transfers);
    }
}

/// Packs every file of `dir` into a zip archive at `zip_path`.
pub fn zip_feed(dir: &Path, zip_path: &Path) {
    let mut zip = zip::ZipWriter::new(File::create(zip_path).unwrap());
    let options = zip::write::SimpleFileOptions::default();
    for entry in std::fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        zip.start_file(name, options).unwrap();
        zip.write_all(&std::fs::read(&path).unwrap()).unwrap();
    }
    zip.finish().unwrap();
}
