use serde::de::DeserializeOwned;
use std::{
    fs::File,
    io::{self, Read},
    mem,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::debug;
use zip::ZipArchive;

mod config;
mod data;
pub mod models;
pub use config::*;
pub use data::*;
pub use models::*;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("Csv error in {file}: {source}")]
    Csv {
        file: String,
        #[source]
        source: csv::Error,
    },
    #[error("Could not find file with name: {0}")]
    FileNotFound(String),
    #[error("Feed path is neither a directory nor a zip archive: {0}")]
    NotAFeed(PathBuf),
    #[error("Feed has neither a calendar nor a calendar dates table")]
    MissingCalendar,
}

/// Where the feed tables are read from.
#[derive(Default, Debug)]
pub enum StorageType {
    #[default]
    None,
    Directory(PathBuf),
    Zip(PathBuf),
    Memory(GtfsData),
}

/// Reader over the tables of a GTFS feed.
///
/// Tables are streamed row by row so the whole feed never has to be held
/// as raw records, except for [`StorageType::Memory`] where the rows are
/// handed over as they are.
#[derive(Default, Debug)]
pub struct Gtfs {
    config: Config,
    storage: StorageType,
}

impl Gtfs {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn from_directory<P: AsRef<Path>>(mut self, path: P) -> Result<Self, self::Error> {
        let path = path.as_ref();
        if !path.is_dir() {
            return Err(self::Error::NotAFeed(path.to_path_buf()));
        }
        self.storage = StorageType::Directory(path.to_path_buf());
        Ok(self)
    }

    pub fn from_zip<P: AsRef<Path>>(mut self, path: P) -> Result<Self, self::Error> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(self::Error::NotAFeed(path.to_path_buf()));
        }
        self.storage = StorageType::Zip(path.to_path_buf());
        Ok(self)
    }

    /// Picks directory or zip storage based on what `path` points at.
    pub fn from_path<P: AsRef<Path>>(self, path: P) -> Result<Self, self::Error> {
        let path = path.as_ref();
        if path.is_dir() {
            self.from_directory(path)
        } else if path.is_file() {
            self.from_zip(path)
        } else {
            Err(self::Error::NotAFeed(path.to_path_buf()))
        }
    }

    pub fn from_data(mut self, data: GtfsData) -> Self {
        self.storage = StorageType::Memory(data);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn stream_agencies<F>(&mut self, f: F) -> Result<(), self::Error>
    where
        F: FnMut((usize, GtfsAgency)),
    {
        let name = self.config.agency_file_name.clone();
        self.stream_required(&name, |data| mem::take(&mut data.agencies), f)
    }

    pub fn stream_routes<F>(&mut self, f: F) -> Result<(), self::Error>
    where
        F: FnMut((usize, GtfsRoute)),
    {
        let name = self.config.routes_file_name.clone();
        self.stream_required(&name, |data| mem::take(&mut data.routes), f)
    }

    /// Returns `false` when the feed has no calendar table.
    pub fn stream_calendars<F>(&mut self, f: F) -> Result<bool, self::Error>
    where
        F: FnMut((usize, GtfsCalendar)),
    {
        let name = self.config.calendar_file_name.clone();
        self.stream(&name, |data| data.calendars.take(), f)
    }

    /// Returns `false` when the feed has no calendar dates table.
    pub fn stream_calendar_dates<F>(&mut self, f: F) -> Result<bool, self::Error>
    where
        F: FnMut((usize, GtfsCalendarDate)),
    {
        let name = self.config.calendar_dates_file_name.clone();
        self.stream(&name, |data| data.calendar_dates.take(), f)
    }

    pub fn stream_stops<F>(&mut self, f: F) -> Result<(), self::Error>
    where
        F: FnMut((usize, GtfsStop)),
    {
        let name = self.config.stops_file_name.clone();
        self.stream_required(&name, |data| mem::take(&mut data.stops), f)
    }

    pub fn stream_trips<F>(&mut self, f: F) -> Result<(), self::Error>
    where
        F: FnMut((usize, GtfsTrip)),
    {
        let name = self.config.trips_file_name.clone();
        self.stream_required(&name, |data| mem::take(&mut data.trips), f)
    }

    pub fn stream_stop_times<F>(&mut self, f: F) -> Result<(), self::Error>
    where
        F: FnMut((usize, GtfsStopTime)),
    {
        let name = self.config.stop_times_file_name.clone();
        self.stream_required(&name, |data| mem::take(&mut data.stop_times), f)
    }

    /// Returns `false` when the feed has no transfers table.
    pub fn stream_transfers<F>(&mut self, f: F) -> Result<bool, self::Error>
    where
        F: FnMut((usize, GtfsTransfer)),
    {
        let name = self.config.transfers_file_name.clone();
        self.stream(&name, |data| data.transfers.take(), f)
    }

    fn stream_required<T, F>(
        &mut self,
        file_name: &str,
        take: impl FnOnce(&mut GtfsData) -> Vec<T>,
        f: F,
    ) -> Result<(), self::Error>
    where
        T: DeserializeOwned,
        F: FnMut((usize, T)),
    {
        if self.stream(file_name, |data| Some(take(data)), f)? {
            Ok(())
        } else {
            Err(self::Error::FileNotFound(file_name.to_string()))
        }
    }

    fn stream<T, F>(
        &mut self,
        file_name: &str,
        take: impl FnOnce(&mut GtfsData) -> Option<Vec<T>>,
        f: F,
    ) -> Result<bool, self::Error>
    where
        T: DeserializeOwned,
        F: FnMut((usize, T)),
    {
        debug!("Streaming {file_name}");
        match &mut self.storage {
            StorageType::None => Ok(false),
            StorageType::Memory(data) => match take(data) {
                Some(rows) => {
                    rows.into_iter().enumerate().for_each(f);
                    Ok(true)
                }
                None => Ok(false),
            },
            StorageType::Directory(path) => {
                let path = path.join(file_name);
                if !path.is_file() {
                    debug!("{file_name} is not present in feed directory");
                    return Ok(false);
                }
                let file = File::open(path)?;
                stream_csv(file, file_name, f)?;
                Ok(true)
            }
            StorageType::Zip(path) => {
                let zip_file = File::open(path)?;
                let mut archive = ZipArchive::new(zip_file)?;
                let Some(index) = archive.index_for_name(file_name) else {
                    debug!("{file_name} is not present in feed archive");
                    return Ok(false);
                };
                let file = archive.by_index(index)?;
                stream_csv(file, file_name, f)?;
                Ok(true)
            }
        }
    }
}

fn stream_csv<R, T, F>(reader: R, file_name: &str, mut f: F) -> Result<(), self::Error>
where
    R: Read,
    T: DeserializeOwned,
    F: FnMut((usize, T)),
{
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    for (i, record) in reader.deserialize().enumerate() {
        let record: T = record.map_err(|source| self::Error::Csv {
            file: file_name.to_string(),
            source,
        })?;
        f((i, record));
    }
    Ok(())
}
