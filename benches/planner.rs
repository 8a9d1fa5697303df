use chrono::{NaiveDate, NaiveDateTime};
use criterion::{Criterion, criterion_group, criterion_main};
use planner::{
    gtfs::{
        Gtfs, GtfsAgency, GtfsCalendar, GtfsData, GtfsRoute, GtfsStop, GtfsStopTime, GtfsTransfer,
        GtfsTrip,
    },
    prelude::{Query, Repository, SearchConfig, Time},
    shared::Duration,
};
use std::{env, hint::black_box, path::Path, time::Duration as StdDuration};

const LINES: usize = 20;
const STOPS_PER_LINE: usize = 30;
const TRIPS_PER_LINE: usize = 60;

/// A grid of lines: even lines run east-west, odd lines north-south, and
/// every line shares a stop with every line of the other orientation.
fn synthetic_feed() -> GtfsData {
    let mut data = GtfsData {
        agencies: vec![GtfsAgency {
            agency_id: Some("AG".into()),
            agency_name: "Grid Transit".into(),
            agency_url: "https://example.org".into(),
            agency_timezone: "UTC".into(),
        }],
        calendars: Some(vec![GtfsCalendar {
            service_id: "ALL".into(),
            monday: 1,
            tuesday: 1,
            wednesday: 1,
            thursday: 1,
            friday: 1,
            saturday: 1,
            sunday: 1,
            start_date: "20200101".into(),
            end_date: "20301231".into(),
        }]),
        transfers: Some(Vec::new()),
        ..Default::default()
    };

    let stop_id = |line: usize, position: usize| format!("L{line}P{position}");
    for line in 0..LINES {
        for position in 0..STOPS_PER_LINE {
            data.stops.push(GtfsStop {
                stop_id: stop_id(line, position),
                stop_name: Some(format!("Line {line} stop {position}")),
                ..Default::default()
            });
        }
        data.routes.push(GtfsRoute {
            route_id: format!("R{line}"),
            agency_id: Some("AG".into()),
            route_short_name: Some(line.to_string()),
            route_type: 3,
            ..Default::default()
        });
        for trip in 0..TRIPS_PER_LINE {
            let trip_id = format!("R{line}T{trip}");
            data.trips.push(GtfsTrip {
                route_id: format!("R{line}"),
                service_id: "ALL".into(),
                trip_id: trip_id.clone(),
                ..Default::default()
            });
            let start = Time::from_hms_parts(5, 0, 0) + Duration::from_minutes((trip * 15) as u32);
            for position in 0..STOPS_PER_LINE {
                let time = start + Duration::from_minutes((position * 2) as u32);
                data.stop_times.push(GtfsStopTime {
                    trip_id: trip_id.clone(),
                    arrival_time: Some(time.to_hms_string()),
                    departure_time: Some(time.to_hms_string()),
                    stop_id: stop_id(line, position),
                    stop_sequence: position as u32,
                    ..Default::default()
                });
            }
        }
    }

    // Crossings are a short walk between the two lines' stops
    let transfers = data.transfers.get_or_insert_with(Vec::new);
    for a in (0..LINES).step_by(2) {
        for b in (1..LINES).step_by(2) {
            let (from, to) = (stop_id(a, b), stop_id(b, a));
            for (from, to) in [(from.clone(), to.clone()), (to, from)] {
                transfers.push(GtfsTransfer {
                    from_stop_id: from,
                    to_stop_id: to,
                    transfer_type: Some(2),
                    min_transfer_time: Some(120),
                });
            }
        }
    }
    data
}

fn load_repository() -> Repository {
    let gtfs = match env::var("GTFS_DATA_PATH") {
        Ok(path) => Gtfs::new()
            .from_path(Path::new(&path))
            .expect("Failed to open GTFS feed"),
        Err(_) => Gtfs::new().from_data(synthetic_feed()),
    };
    Repository::new()
        .load_gtfs(gtfs)
        .expect("Failed to build repository")
}

fn departure() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 15)
        .unwrap()
        .and_hms_opt(8, 0, 0)
        .unwrap()
}

fn query(repository: &Repository, start: &str, finish: &str) {
    let _ = black_box(
        repository
            .planner(start, finish)
            .departure_at(departure())
            .solve(),
    );
}

fn criterion_benchmark(c: &mut Criterion) {
    let repository = load_repository();
    let (short_from, short_to) = (
        env::var("BENCH_SHORT_FROM").unwrap_or("L0P0".into()),
        env::var("BENCH_SHORT_TO").unwrap_or("L0P10".into()),
    );
    let (long_from, long_to) = (
        env::var("BENCH_LONG_FROM").unwrap_or("L0P0".into()),
        env::var("BENCH_LONG_TO").unwrap_or("L19P29".into()),
    );
    let queries: Vec<Query> = (0..64)
        .map(|i| Query::new(long_from.clone(), long_to.clone(), departure() + chrono::TimeDelta::minutes(i)))
        .collect();
    let config = SearchConfig::default();

    let mut group = c.benchmark_group("Planning");
    group.warm_up_time(StdDuration::from_secs(5));
    group.measurement_time(StdDuration::from_secs(15));

    group.bench_function("Short solve", |b| {
        b.iter(|| query(&repository, &short_from, &short_to))
    });

    group.bench_function("Long solve", |b| {
        b.iter(|| query(&repository, &long_from, &long_to))
    });

    group.bench_function("Batch of 64", |b| {
        b.iter(|| black_box(repository.plan_many(&queries, &config)))
    });

    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
