use crate::{
    gtfs::{self, Gtfs, GtfsStopTime},
    repository::{
        Agency, Direction, Error, IdToIndex, LocationType, Repository, Route, Service,
        ServiceException, Slice, Stop, StopTime, Transfer, TransferType, Trip, Weekdays,
    },
    shared::{
        geo::Coordinate,
        time::{Duration, Time},
    },
};
use chrono::{NaiveDate, Weekday};
use rayon::prelude::*;
use std::{collections::HashMap, sync::Arc, time::Instant};
use tracing::{debug, warn};

/// Keeps the first error raised inside a streaming callback.
#[derive(Default)]
struct FirstError(Option<Error>);

impl FirstError {
    fn set(&mut self, error: Error) {
        if self.0.is_none() {
            self.0 = Some(error);
        }
    }

    fn is_set(&self) -> bool {
        self.0.is_some()
    }

    fn check(self) -> Result<(), Error> {
        match self.0 {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl Repository {
    /// Builds the schedule graph from a feed.
    /// Depending on the size of the feed this can be a long blocking function.
    pub fn load_gtfs(mut self, mut gtfs: Gtfs) -> Result<Self, Error> {
        let now = Instant::now();
        self.load_agencies(&mut gtfs)?;
        self.load_routes(&mut gtfs)?;
        self.load_services(&mut gtfs)?;
        self.load_stops(&mut gtfs)?;
        self.load_trips(&mut gtfs)?;
        self.load_stop_times(&mut gtfs)?;
        self.load_transfers(&mut gtfs)?;
        self.generate_departures();
        debug!(
            "Loaded {} stops, {} trips and {} stop times in {:?}",
            self.stops.len(),
            self.trips.len(),
            self.stop_times.len(),
            now.elapsed()
        );
        Ok(self)
    }

    fn load_agencies(&mut self, gtfs: &mut Gtfs) -> Result<(), Error> {
        debug!("Loading agencies...");
        let now = Instant::now();
        let mut agency_lookup: IdToIndex = HashMap::new();
        let mut agencies: Vec<Agency> = Vec::new();
        let mut error = FirstError::default();
        gtfs.stream_agencies(|(_, agency)| {
            if error.is_set() {
                return;
            }
            let index = agencies.len() as u32;
            let id: Arc<str> = agency.agency_id.unwrap_or_default().into();
            if agency_lookup.insert(id.clone(), index).is_some() {
                error.set(Error::DuplicateId {
                    entity: "Agency",
                    id: id.to_string(),
                });
                return;
            }
            agencies.push(Agency {
                index,
                id,
                name: agency.agency_name.into(),
                url: agency.agency_url.into(),
                timezone: agency.agency_timezone.into(),
            });
        })?;
        error.check()?;
        self.agencies = agencies.into();
        self.agency_lookup = agency_lookup;
        debug!("Loading agencies took {:?}", now.elapsed());
        Ok(())
    }

    fn load_routes(&mut self, gtfs: &mut Gtfs) -> Result<(), Error> {
        debug!("Loading routes...");
        let now = Instant::now();
        let mut route_lookup: IdToIndex = HashMap::new();
        let mut routes: Vec<Route> = Vec::new();
        let mut agency_to_routes: Vec<Vec<u32>> = vec![Vec::new(); self.agencies.len()];
        let mut error = FirstError::default();
        gtfs.stream_routes(|(_, route)| {
            if error.is_set() {
                return;
            }
            let index = routes.len() as u32;
            let agency_idx = match route.agency_id.as_deref() {
                Some(agency_id) if !agency_id.is_empty() => self.agency_lookup.get(agency_id).copied(),
                // Single agency feeds may leave the column out
                _ if self.agencies.len() == 1 => Some(0),
                _ => None,
            };
            let Some(agency_idx) = agency_idx else {
                error.set(Error::MissingReference {
                    entity: "Route",
                    id: route.route_id,
                    reference: "agency",
                    target: route.agency_id.unwrap_or_default(),
                });
                return;
            };
            let id: Arc<str> = route.route_id.into();
            if route_lookup.insert(id.clone(), index).is_some() {
                error.set(Error::DuplicateId {
                    entity: "Route",
                    id: id.to_string(),
                });
                return;
            }
            agency_to_routes[agency_idx as usize].push(index);
            routes.push(Route {
                index,
                id,
                agency_idx,
                short_name: route.route_short_name.map(|val| val.into()),
                long_name: route.route_long_name.map(|val| val.into()),
                desc: route.route_desc.map(|val| val.into()),
                route_type: route.route_type.into(),
            });
        })?;
        error.check()?;
        self.routes = routes.into();
        self.route_lookup = route_lookup;
        self.agency_to_routes = agency_to_routes
            .into_iter()
            .map(|val| val.into())
            .collect();
        debug!("Loading routes took {:?}", now.elapsed());
        Ok(())
    }

    fn load_services(&mut self, gtfs: &mut Gtfs) -> Result<(), Error> {
        debug!("Loading services...");
        let now = Instant::now();
        let mut service_lookup: IdToIndex = HashMap::new();
        let mut services: Vec<Service> = Vec::new();
        let mut error = FirstError::default();
        let has_calendar = gtfs.stream_calendars(|(_, calendar)| {
            if error.is_set() {
                return;
            }
            let context = format!("calendar of service {}", calendar.service_id);
            let validity = parse_date(&calendar.start_date, &context).and_then(|start| {
                parse_date(&calendar.end_date, &context).map(|end| start..=end)
            });
            let validity = match validity {
                Ok(validity) => validity,
                Err(err) => {
                    error.set(err);
                    return;
                }
            };
            let weekdays: Weekdays = [
                (calendar.monday, Weekday::Mon),
                (calendar.tuesday, Weekday::Tue),
                (calendar.wednesday, Weekday::Wed),
                (calendar.thursday, Weekday::Thu),
                (calendar.friday, Weekday::Fri),
                (calendar.saturday, Weekday::Sat),
                (calendar.sunday, Weekday::Sun),
            ]
            .into_iter()
            .filter(|(flag, _)| *flag == 1)
            .map(|(_, day)| day)
            .collect();

            let index = services.len() as u32;
            let id: Arc<str> = calendar.service_id.into();
            if service_lookup.insert(id.clone(), index).is_some() {
                error.set(Error::DuplicateId {
                    entity: "Service",
                    id: id.to_string(),
                });
                return;
            }
            services.push(Service {
                index,
                id,
                weekdays,
                validity: Some(validity),
                exceptions: HashMap::new(),
            });
        })?;
        error.check()?;

        let mut error = FirstError::default();
        let mut skipped = 0;
        let has_calendar_dates = gtfs.stream_calendar_dates(|(_, calendar_date)| {
            if error.is_set() {
                return;
            }
            let Some(exception) = ServiceException::from_code(calendar_date.exception_type)
            else {
                skipped += 1;
                return;
            };
            let context = format!("calendar date of service {}", calendar_date.service_id);
            let date = match parse_date(&calendar_date.date, &context) {
                Ok(date) => date,
                Err(err) => {
                    error.set(err);
                    return;
                }
            };
            // Services may be defined by their exceptions alone
            let index = *service_lookup
                .entry(calendar_date.service_id.as_str().into())
                .or_insert_with_key(|id| {
                    let index = services.len() as u32;
                    services.push(Service {
                        index,
                        id: id.clone(),
                        weekdays: Weekdays::EMPTY,
                        validity: None,
                        exceptions: HashMap::new(),
                    });
                    index
                });
            services[index as usize].exceptions.insert(date, exception);
        })?;
        error.check()?;
        if skipped > 0 {
            warn!("Skipped {skipped} calendar dates with an unknown exception type");
        }
        if !has_calendar && !has_calendar_dates {
            return Err(gtfs::Error::MissingCalendar.into());
        }

        self.services = services.into();
        self.service_lookup = service_lookup;
        debug!("Loading services took {:?}", now.elapsed());
        Ok(())
    }

    fn load_stops(&mut self, gtfs: &mut Gtfs) -> Result<(), Error> {
        debug!("Loading stops...");
        let now = Instant::now();
        let mut stop_lookup: IdToIndex = HashMap::new();
        let mut stops: Vec<(Stop, Option<String>)> = Vec::new();
        let mut error = FirstError::default();
        gtfs.stream_stops(|(_, mut stop)| {
            if error.is_set() {
                return;
            }
            let index = stops.len() as u32;
            let id: Arc<str> = stop.stop_id.into();
            if stop_lookup.insert(id.clone(), index).is_some() {
                error.set(Error::DuplicateId {
                    entity: "Stop",
                    id: id.to_string(),
                });
                return;
            }
            let coordinate = match (stop.stop_lat, stop.stop_lon) {
                (Some(latitude), Some(longitude)) => Coordinate::new(latitude, longitude),
                _ => Coordinate::default(),
            };
            if !coordinate.is_valid() {
                warn!("Stop {id} has out of range coordinates {coordinate}");
            }
            let parent_station = stop.parent_station.take().filter(|val| !val.is_empty());
            let value = Stop {
                index,
                id,
                name: stop.stop_name.unwrap_or_default().into(),
                coordinate,
                location_type: stop.location_type.unwrap_or_default().into(),
                parent_idx: None,
            };
            stops.push((value, parent_station));
        })?;
        error.check()?;

        let mut station_to_stops: Vec<Vec<u32>> = vec![Vec::new(); stops.len()];
        for (stop, parent_station) in stops.iter_mut() {
            let Some(parent_station) = parent_station else {
                continue;
            };
            let parent_idx = *stop_lookup.get(parent_station.as_str()).ok_or_else(|| {
                Error::MissingReference {
                    entity: "Stop",
                    id: stop.id.to_string(),
                    reference: "parent station",
                    target: parent_station.clone(),
                }
            })?;
            station_to_stops[parent_idx as usize].push(stop.index);
            stop.parent_idx = Some(parent_idx);
        }

        self.stops = stops.into_iter().map(|(stop, _)| stop).collect();
        self.stop_lookup = stop_lookup;
        self.station_to_stops = station_to_stops
            .into_iter()
            .map(|stops| stops.into())
            .collect();
        let stations = self
            .stops
            .iter()
            .filter(|stop| stop.location_type == LocationType::Station)
            .count();
        debug!(
            "Loading stops took {:?} ({stations} stations)",
            now.elapsed()
        );
        Ok(())
    }

    fn load_trips(&mut self, gtfs: &mut Gtfs) -> Result<(), Error> {
        debug!("Loading trips...");
        let now = Instant::now();
        let mut trip_lookup: IdToIndex = HashMap::new();
        let mut route_to_trips: Vec<Vec<u32>> = vec![Vec::new(); self.routes.len()];
        let mut trips: Vec<Trip> = Vec::new();
        let mut error = FirstError::default();
        gtfs.stream_trips(|(_, trip)| {
            if error.is_set() {
                return;
            }
            let Some(route_idx) = self.route_lookup.get(trip.route_id.as_str()).copied() else {
                error.set(Error::MissingReference {
                    entity: "Trip",
                    id: trip.trip_id,
                    reference: "route",
                    target: trip.route_id,
                });
                return;
            };
            let Some(service_idx) = self.service_lookup.get(trip.service_id.as_str()).copied()
            else {
                error.set(Error::MissingReference {
                    entity: "Trip",
                    id: trip.trip_id,
                    reference: "service",
                    target: trip.service_id,
                });
                return;
            };
            let index = trips.len() as u32;
            let id: Arc<str> = trip.trip_id.into();
            if trip_lookup.insert(id.clone(), index).is_some() {
                error.set(Error::DuplicateId {
                    entity: "Trip",
                    id: id.to_string(),
                });
                return;
            }
            route_to_trips[route_idx as usize].push(index);
            trips.push(Trip {
                index,
                id,
                route_idx,
                service_idx,
                headsign: trip.trip_headsign.map(|val| val.into()),
                short_name: trip.trip_short_name.map(|val| val.into()),
                direction: match trip.direction_id {
                    Some(0) => Some(Direction::Outbound),
                    Some(1) => Some(Direction::Inbound),
                    _ => None,
                },
            });
        })?;
        error.check()?;
        self.trips = trips.into();
        self.trip_lookup = trip_lookup;
        self.route_to_trips = route_to_trips
            .into_iter()
            .map(|val| val.into())
            .collect();
        debug!("Loading trips took {:?}", now.elapsed());
        Ok(())
    }

    fn load_stop_times(&mut self, gtfs: &mut Gtfs) -> Result<(), Error> {
        debug!("Loading stop times...");
        let now = Instant::now();
        // Feeds do not have to keep the rows of a trip together
        let mut buckets: Vec<Vec<StopTime>> = vec![Vec::new(); self.trips.len()];
        let mut untimed = 0;
        let mut error = FirstError::default();
        gtfs.stream_stop_times(|(_, stop_time)| {
            if error.is_set() {
                return;
            }
            let Some(trip_idx) = self.trip_lookup.get(stop_time.trip_id.as_str()).copied() else {
                error.set(Error::MissingReference {
                    entity: "Stop time",
                    id: format!("{}#{}", stop_time.trip_id, stop_time.stop_sequence),
                    reference: "trip",
                    target: stop_time.trip_id,
                });
                return;
            };
            let Some(stop_idx) = self.stop_lookup.get(stop_time.stop_id.as_str()).copied() else {
                error.set(Error::MissingReference {
                    entity: "Stop time",
                    id: format!("{}#{}", stop_time.trip_id, stop_time.stop_sequence),
                    reference: "stop",
                    target: stop_time.stop_id,
                });
                return;
            };
            match parse_stop_time(stop_time, trip_idx, stop_idx) {
                Ok(Some(value)) => buckets[trip_idx as usize].push(value),
                Ok(None) => untimed += 1,
                Err(err) => error.set(err),
            }
        })?;
        error.check()?;
        if untimed > 0 {
            warn!("Skipped {untimed} stop times without arrival or departure time");
        }

        buckets
            .par_iter_mut()
            .for_each(|buffer| buffer.sort_by_key(|val| val.sequence));
        for (trip, buffer) in self.trips.iter().zip(buckets.iter()) {
            validate_trip(trip, buffer)?;
        }

        let mut trip_to_stop_times_slice: Vec<Slice> = vec![Default::default(); self.trips.len()];
        let mut stop_times: Vec<StopTime> = Vec::with_capacity(buckets.iter().map(Vec::len).sum());
        for (trip_idx, mut buffer) in buckets.into_iter().enumerate() {
            let slice = Slice {
                start_idx: stop_times.len() as u32,
                count: buffer.len() as u32,
            };
            buffer.iter_mut().enumerate().for_each(|(j, st)| {
                st.inner_idx = j as u32;
                st.slice = slice;
                st.index = slice.start_idx + st.inner_idx;
            });
            trip_to_stop_times_slice[trip_idx] = slice;
            stop_times.append(&mut buffer);
        }

        self.stop_times = stop_times.into();
        self.trip_to_stop_times_slice = trip_to_stop_times_slice.into();
        debug!("Loading stop times took {:?}", now.elapsed());
        Ok(())
    }

    fn load_transfers(&mut self, gtfs: &mut Gtfs) -> Result<(), Error> {
        debug!("Loading transfers...");
        let now = Instant::now();
        let mut transfers: Vec<Transfer> = Vec::new();
        let mut stop_to_transfers: Vec<Vec<u32>> = vec![Vec::new(); self.stops.len()];
        let mut skipped = 0;
        let mut error = FirstError::default();
        gtfs.stream_transfers(|(_, transfer)| {
            if error.is_set() {
                return;
            }
            let Some(from_stop_idx) = self.stop_lookup.get(transfer.from_stop_id.as_str()).copied()
            else {
                error.set(Error::MissingReference {
                    entity: "Transfer",
                    id: format!("{}->{}", transfer.from_stop_id, transfer.to_stop_id),
                    reference: "stop",
                    target: transfer.from_stop_id,
                });
                return;
            };
            let Some(to_stop_idx) = self.stop_lookup.get(transfer.to_stop_id.as_str()).copied()
            else {
                error.set(Error::MissingReference {
                    entity: "Transfer",
                    id: format!("{}->{}", transfer.from_stop_id, transfer.to_stop_id),
                    reference: "stop",
                    target: transfer.to_stop_id,
                });
                return;
            };
            // Not possible and in-seat transfers are no walking connections
            let Some(transfer_type) =
                TransferType::from_code(transfer.transfer_type.unwrap_or_default())
            else {
                skipped += 1;
                return;
            };
            let index = transfers.len() as u32;
            stop_to_transfers[from_stop_idx as usize].push(index);
            transfers.push(Transfer {
                index,
                from_stop_idx,
                to_stop_idx,
                transfer_type,
                duration: Duration::from_seconds(transfer.min_transfer_time.unwrap_or_default()),
            });
        })?;
        error.check()?;
        if skipped > 0 {
            debug!("Skipped {skipped} transfers that are not walking connections");
        }
        self.transfers = transfers.into();
        self.stop_to_transfers = stop_to_transfers
            .into_iter()
            .map(|val| val.into())
            .collect();
        debug!("Loading transfers took {:?}", now.elapsed());
        Ok(())
    }

    fn generate_departures(&mut self) {
        debug!("Generating departures per stop...");
        let now = Instant::now();
        let mut stop_to_departures: Vec<Vec<u32>> = vec![Vec::new(); self.stops.len()];
        self.stop_times
            .iter()
            // The last call of a trip has nothing to ride to
            .filter(|st| st.inner_idx + 1 < st.slice.count)
            .for_each(|st| stop_to_departures[st.stop_idx as usize].push(st.index));
        stop_to_departures.par_iter_mut().for_each(|departures| {
            departures.sort_by_key(|idx| (self.stop_times[*idx as usize].departure_time, *idx))
        });
        self.stop_to_departures = stop_to_departures
            .into_iter()
            .map(|val| val.into())
            .collect();
        debug!("Generating departures per stop took {:?}", now.elapsed());
    }
}

fn parse_date(value: &str, context: &str) -> Result<NaiveDate, Error> {
    NaiveDate::parse_from_str(value, "%Y%m%d").map_err(|_| Error::InvalidDate {
        value: value.to_string(),
        context: context.to_string(),
    })
}

fn parse_time(value: &str, context: impl FnOnce() -> String) -> Result<Time, Error> {
    Time::from_hms(value).ok_or_else(|| Error::InvalidTime {
        value: value.to_string(),
        context: context(),
    })
}

/// Returns `None` for untimed stop times, which are left out of the graph.
fn parse_stop_time(
    stop_time: GtfsStopTime,
    trip_idx: u32,
    stop_idx: u32,
) -> Result<Option<StopTime>, Error> {
    let context = || {
        format!(
            "stop time {} of trip {}",
            stop_time.stop_sequence, stop_time.trip_id
        )
    };
    let arrival = stop_time.arrival_time.as_deref().filter(|val| !val.is_empty());
    let departure = stop_time
        .departure_time
        .as_deref()
        .filter(|val| !val.is_empty());
    let (arrival_time, departure_time) = match (arrival, departure) {
        (Some(arrival), Some(departure)) => {
            (parse_time(arrival, context)?, parse_time(departure, context)?)
        }
        (Some(time), None) | (None, Some(time)) => {
            let time = parse_time(time, context)?;
            (time, time)
        }
        (None, None) => return Ok(None),
    };
    Ok(Some(StopTime {
        index: u32::MAX,
        trip_idx,
        stop_idx,
        sequence: stop_time.stop_sequence,
        slice: Slice::default(),
        inner_idx: u32::MAX,
        arrival_time,
        departure_time,
        headsign: stop_time.stop_headsign.map(|val| val.into()),
        pickup_type: stop_time.pickup_type.unwrap_or_default().into(),
        drop_off_type: stop_time.drop_off_type.unwrap_or_default().into(),
    }))
}

/// Checks the ordering invariants of a trip's stop times, sorted by sequence.
fn validate_trip(trip: &Trip, stop_times: &[StopTime]) -> Result<(), Error> {
    let invalid = |reason: String| Error::InvalidSchedule {
        trip_id: trip.id.to_string(),
        reason,
    };
    for stop_time in stop_times {
        if stop_time.arrival_time > stop_time.departure_time {
            return Err(invalid(format!(
                "stop time {} arrives at {} after departing at {}",
                stop_time.sequence, stop_time.arrival_time, stop_time.departure_time
            )));
        }
    }
    for pair in stop_times.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        if prev.sequence == next.sequence {
            return Err(invalid(format!("duplicate stop sequence {}", next.sequence)));
        }
        if prev.departure_time > next.arrival_time {
            return Err(invalid(format!(
                "stop time {} arrives at {} before stop time {} departs at {}",
                next.sequence, next.arrival_time, prev.sequence, prev.departure_time
            )));
        }
    }
    Ok(())
}
