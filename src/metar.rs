use csv::{ReaderBuilder, Trim, Writer};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::Path;

use crate::error::Error;
use crate::request::Request;

const METAR_ENDPOINT: &str = "https://tgftp.nws.noaa.gov/data/observations/metar/stations/";

type WeatherResult = (String, Result<String, Error>);

/// One row of the METAR snapshot.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
struct MetarRow {
    #[serde(rename = "ICAO", alias = "icao")]
    icao: String,
    #[serde(rename = "METAR", alias = "metar")]
    metar: String,
}

pub fn load_metars(filename: impl AsRef<Path>) -> Result<HashMap<String, String>, Error> {
    let filename = filename.as_ref();
    let file = std::fs::File::open(filename)
        .map_err(|e| Error::DataLoad(format!("{}: {}", filename.display(), e)))?;
    read_metars(file)
}

/// Reads a METAR snapshot keyed by ICAO. An empty METAR cell is kept as an empty report.
pub fn read_metars<R: Read>(reader: R) -> Result<HashMap<String, String>, Error> {
    let mut reader = ReaderBuilder::new().trim(Trim::All).from_reader(reader);
    let mut metars = HashMap::new();

    for (row, record) in reader.deserialize().enumerate() {
        let record: MetarRow =
            record.map_err(|e| Error::DataLoad(format!("METAR row {}: {}", row + 1, e)))?;

        if let Some(previous) = metars.insert(record.icao.clone(), record.metar) {
            warn!(
                "Duplicate METAR for {}, replacing \"{}\"",
                record.icao, previous
            );
        }
    }

    Ok(metars)
}

/// Writes the snapshot in the order of `icaos`. Stations without a report are left out.
pub fn write_metars<W: Write>(
    writer: W,
    icaos: &[String],
    metars: &HashMap<String, String>,
) -> Result<usize, Error> {
    let mut writer = Writer::from_writer(writer);
    let mut written = 0;

    // Header row even for an empty snapshot
    writer.write_record(&["ICAO", "METAR"])?;

    for icao in icaos {
        if let Some(metar) = metars.get(icao) {
            writer.write_record(&[icao.as_str(), metar.as_str()])?;
            written += 1;
        }
    }

    writer.flush()?;
    Ok(written)
}

/// Pulls the raw report out of a NOAA station file. The first line is the observation time.
pub fn parse_station_report(text: &str) -> Result<String, Error> {
    text.lines()
        .nth(1)
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .map(|line| line.to_string())
        .ok_or(Error::NotFound)
}

pub fn download_metar(icao: &str) -> Result<String, Error> {
    let text = attohttpc::get(format!("{}{}.TXT", METAR_ENDPOINT, icao))
        .send()?
        .error_for_status()?
        .text()?;

    parse_station_report(&text)
}

pub struct NoaaWeather {
    weather_request: Request<WeatherResult, String>,
}

impl NoaaWeather {
    pub fn new(num_threads: u32) -> Self {
        Self {
            weather_request: Request::new(num_threads),
        }
    }

    pub fn run(&self) {
        self.weather_request.run(move |icao| {
            let result = download_metar(&icao);
            (icao, result)
        });
    }

    pub fn request_weather(&self, icao: &str) {
        self.weather_request.give_job(icao.to_string());
    }

    pub fn wait_next_weather(&self) -> Option<WeatherResult> {
        self.weather_request.wait_next()
    }

    pub fn stop(&self) {
        self.weather_request.stop();
    }

    /// Downloads the current METAR for every station. Failed stations are logged and skipped.
    pub fn fetch_all(&self, icaos: &[String]) -> HashMap<String, String> {
        for icao in icaos {
            self.request_weather(icao);
        }

        let mut metars = HashMap::new();
        for done in 1..=icaos.len() {
            let (icao, result) = match self.wait_next_weather() {
                Some(r) => r,
                None => break,
            };

            match result {
                Ok(metar) => {
                    debug!("[{}/{}] {}", done, icaos.len(), metar);
                    metars.insert(icao, metar);
                }
                Err(e) => warn!("[{}/{}] No METAR for {}: {}", done, icaos.len(), icao, e),
            }
        }

        info!("Got {} of {} METARs", metars.len(), icaos.len());
        metars
    }
}
