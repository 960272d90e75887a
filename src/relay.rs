use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::index::{AirportCandidate, AirportIndex};
use crate::util::{convert_km_to_nm, convert_meters_to_feet};

pub const NO_METAR_MSG: &str = "No METAR available";

const ARM_TRIGGER: &str = "arm";

/// Flight-deck state sent by the simulator plugin. Only the position datarefs are read.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct AlternatesRequest {
    #[serde(default)]
    pub trigger_source: Option<String>,
    #[serde(rename = "sim/flightmodel/position/latitude", default)]
    pub latitude: Option<f64>,
    #[serde(rename = "sim/flightmodel/position/longitude", default)]
    pub longitude: Option<f64>,
    /// Meters above mean sea level
    #[serde(rename = "sim/flightmodel/position/elevation", default)]
    pub elevation: Option<f64>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Reply {
    Ok {
        airports: Vec<AirportCandidate>,
        text: String,
    },
    Error {
        message: String,
    },
}

impl Reply {
    fn from_error(e: Error) -> Self {
        Self::Error {
            message: e.to_string(),
        }
    }
}

pub fn build_alternate_string(candidate: &AirportCandidate) -> String {
    format!(
        "Airport: {icao}, Distance: {distance:.1} NM, Maximum Runway Length: {runway} ft, METAR: {metar}",
        icao = candidate.airport.icao,
        distance = convert_km_to_nm(candidate.distance_km),
        runway = candidate.airport.max_runway_length_ft as i64,
        metar = candidate.airport.metar.as_deref().unwrap_or(NO_METAR_MSG)
    )
}

/// The "Alternate Airports" block of the recommendation prompt, one airport per line.
pub fn format_alternates(candidates: &[AirportCandidate]) -> String {
    candidates
        .iter()
        .map(build_alternate_string)
        .collect::<Vec<String>>()
        .join("\n")
}

/// Answers one request line. Never fails; errors are carried in the reply.
pub fn handle_message(index: &AirportIndex, use_glide_range: bool, message: &str) -> Reply {
    let request: AlternatesRequest = match serde_json::from_str(message) {
        Ok(r) => r,
        Err(e) => return Reply::from_error(e.into()),
    };

    // Arming carries no position
    if request.trigger_source.as_deref() == Some(ARM_TRIGGER) {
        return Reply::Ok {
            airports: Vec::new(),
            text: "ok".to_string(),
        };
    }

    let (latitude, longitude) = match (request.latitude, request.longitude) {
        (Some(latitude), Some(longitude)) => (latitude, longitude),
        _ => {
            return Reply::Error {
                message: "Request has no position".to_string(),
            }
        }
    };

    let altitude_ft = if use_glide_range {
        request.elevation.map(convert_meters_to_feet)
    } else {
        None
    };

    match index.get_closest_airports(latitude, longitude, altitude_ft) {
        Ok(airports) => {
            let text = format_alternates(&airports);
            Reply::Ok { airports, text }
        }
        Err(e) => Reply::from_error(e),
    }
}
