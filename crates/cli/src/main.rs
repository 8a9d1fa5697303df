use chrono::NaiveDateTime;
use clap::Parser;
use planner::{
    gtfs::Gtfs,
    planner::{Itinerary, LegKind, SearchConfig},
    repository::Repository,
};
use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
    process::ExitCode,
    time::Instant,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEPARTURE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Plans journeys over a GTFS feed, reading queries from stdin.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// GTFS feed directory or zip archive
    feed: PathBuf,
    /// Service days before a stop's arrival date to scan for departures
    #[arg(long, default_value_t = 3)]
    days_back: u32,
    /// Service days after a stop's arrival date to scan for departures
    #[arg(long, default_value_t = 2)]
    days_ahead: u32,
    /// Give up a query after this many settled labels
    #[arg(long)]
    max_iterations: Option<usize>,
}

impl Args {
    fn search_config(&self) -> SearchConfig {
        let config = SearchConfig::new(self.days_back, self.days_ahead);
        match self.max_iterations {
            Some(max_iterations) => config.with_max_iterations(max_iterations),
            None => config,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let args = Args::parse();

    info!("Loading feed {}...", args.feed.display());
    let now = Instant::now();
    let repository = match Gtfs::new()
        .from_path(&args.feed)
        .map_err(planner::repository::Error::from)
        .and_then(|gtfs| Repository::new().load_gtfs(gtfs))
    {
        Ok(repository) => repository,
        Err(err) => {
            error!("Failed to load feed: {err}");
            return ExitCode::FAILURE;
        }
    };
    info!("Loading feed took {:?}", now.elapsed());

    let config = args.search_config();
    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();
    if let Err(err) = run(&repository, &config, stdin.lock(), &mut stdout) {
        error!("{err}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn run(
    repository: &Repository,
    config: &SearchConfig,
    mut input: impl BufRead,
    out: &mut impl Write,
) -> io::Result<()> {
    writeln!(
        out,
        "Enter the start id, the finish id and the departure date time each on its own line"
    )?;
    writeln!(out, "Enter 'q' to exit")?;
    loop {
        let Some(start) = read_line(&mut input)? else {
            break;
        };
        if start == "q" {
            break;
        }
        let (Some(finish), Some(departure)) = (read_line(&mut input)?, read_line(&mut input)?)
        else {
            break;
        };
        let Some(departure) = parse_departure(&departure) else {
            writeln!(out, "Something wrong: invalid departure {departure:?}")?;
            continue;
        };
        match repository
            .planner(&start, &finish)
            .departure_at(departure)
            .with_config(config.clone())
            .solve()
        {
            Ok(itinerary) => print_itinerary(repository, &itinerary, out)?,
            Err(err) => writeln!(out, "Something wrong: {err}")?,
        }
    }
    Ok(())
}

fn read_line(input: &mut impl BufRead) -> io::Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn parse_departure(value: &str) -> Option<NaiveDateTime> {
    DEPARTURE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
}

fn print_itinerary(
    repository: &Repository,
    itinerary: &Itinerary,
    out: &mut impl Write,
) -> io::Result<()> {
    for leg in itinerary.legs.iter() {
        writeln!(out, "Next stop: {}", leg.stop_name)?;
        writeln!(out, "\tDate and time: {}", leg.arrival)?;
        match &leg.kind {
            LegKind::Origin => {}
            LegKind::Ride {
                route_idx,
                headsign,
                ..
            } => {
                let route = &repository.routes[*route_idx as usize];
                writeln!(
                    out,
                    "\tArrived by {} {} direction to {}",
                    route.desc.as_deref().unwrap_or(&route.route_type.to_string()),
                    route.name(),
                    headsign.as_deref().unwrap_or_default()
                )?;
            }
            LegKind::Walk { duration, .. } => {
                writeln!(out, "\tArrived by foot. Transfer time: {duration}")?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn departure_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        assert_eq!(parse_departure("2024-01-01 09:00:00"), Some(expected));
        assert_eq!(parse_departure("2024-01-01T09:00:00"), Some(expected));
        assert_eq!(parse_departure("09:00"), None);
    }

    #[test]
    fn quits_on_q() {
        let repository = Repository::new();
        let mut out = Vec::new();
        run(
            &repository,
            &SearchConfig::default(),
            "q\nA\nB\n".as_bytes(),
            &mut out,
        )
        .unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(!out.contains("Something wrong"));
    }

    #[test]
    fn reports_errors_and_continues() {
        let repository = Repository::new();
        let mut out = Vec::new();
        run(
            &repository,
            &SearchConfig::default(),
            "A\nB\nnot a date\nA\nB\n2024-01-01 09:00:00\n".as_bytes(),
            &mut out,
        )
        .unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("Something wrong: invalid departure"));
        assert!(out.contains("Something wrong: Stop id A does not match any entry"));
    }
}
