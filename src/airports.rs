use crate::error::Error;
use crate::util::LatLon;
use csv::{ReaderBuilder, Trim};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AirportType {
    #[serde(rename = "C")]
    Commercial,
    #[serde(rename = "P")]
    Private,
    #[serde(rename = "M")]
    Military,
}

/// One row of the airport master list.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct AirportData {
    #[serde(rename = "ICAO", alias = "icao")]
    pub icao: String,
    #[serde(rename = "Latitude", alias = "latitude")]
    pub latitude: f64,
    #[serde(rename = "Longitude", alias = "longitude")]
    pub longitude: f64,
    #[serde(rename = "AptType", alias = "airport_type")]
    pub airport_type: AirportType,
    #[serde(rename = "MaxRunwayLength", alias = "max_runway_length_ft")]
    pub max_runway_length_ft: f64,
}

impl AirportData {
    pub fn position(&self) -> LatLon {
        LatLon::new(self.latitude, self.longitude)
    }
}

pub fn load_airports(filename: impl AsRef<Path>) -> Result<Vec<AirportData>, Error> {
    let filename = filename.as_ref();
    let file = std::fs::File::open(filename)
        .map_err(|e| Error::DataLoad(format!("{}: {}", filename.display(), e)))?;
    read_airports(file)
}

/// Reads the airport master list. Columns other than the required ones are ignored.
pub fn read_airports<R: Read>(reader: R) -> Result<Vec<AirportData>, Error> {
    let mut reader = ReaderBuilder::new().trim(Trim::All).from_reader(reader);
    let mut airports = Vec::new();

    for (row, record) in reader.deserialize().enumerate() {
        let record: AirportData =
            record.map_err(|e| Error::DataLoad(format!("airport row {}: {}", row + 1, e)))?;
        airports.push(record);
    }

    Ok(airports)
}
