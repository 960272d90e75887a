//! Diversion airport ranking.
//!
//! The index holds only eligible airports (commercial, long enough runway) and ranks
//! them by great-circle distance from the aircraft on every query.

use log::info;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::airports::{AirportData, AirportType};
use crate::error::Error;
use crate::util::LatLon;

pub const DEFAULT_MIN_RUNWAY_LENGTH_FT: f64 = 8000.0;
pub const DEFAULT_RESULT_COUNT: usize = 5;
/// Clean configuration glide ratio of an A320.
pub const GLIDE_RATIO: f64 = 17.0;

/// An eligible airport with its weather merged in. `metar` is `None` when no report exists.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AirportRecord {
    pub icao: String,
    pub latitude: f64,
    pub longitude: f64,
    pub airport_type: AirportType,
    pub max_runway_length_ft: f64,
    pub metar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AirportCandidate {
    #[serde(flatten)]
    pub airport: AirportRecord,
    pub distance_km: f64,
    pub in_glide_range: bool,
}

/// Which candidates an altitude query hands back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Every airport within glide range, even if that is more than N.
    AllInRange,
    /// The nearest N, reachable or not.
    Nearest,
}

/// `>=` on purpose: exactly N reachable airports already satisfies the caller.
pub fn select_policy(in_range_count: usize, result_count: usize) -> Selection {
    if in_range_count >= result_count {
        Selection::AllInRange
    } else {
        Selection::Nearest
    }
}

/// Glide range in km. Altitude in feet is multiplied without unit conversion.
pub fn max_glide_range_km(altitude_ft: f64) -> f64 {
    altitude_ft * GLIDE_RATIO
}

#[derive(Debug)]
pub struct AirportIndex {
    airports: Vec<AirportRecord>,
    // Aligned index-for-index with `airports`
    positions: Vec<LatLon>,
    min_runway_length_ft: f64,
    result_count: usize,
}

impl AirportIndex {
    /// Joins the weather onto the airports and keeps only the eligible ones.
    pub fn build<I>(
        airports: I,
        weather_by_icao: &HashMap<String, String>,
        min_runway_length_ft: f64,
        result_count: usize,
    ) -> Result<Self, Error>
    where
        I: IntoIterator<Item = AirportData>,
    {
        if min_runway_length_ft.is_nan() || min_runway_length_ft < 0.0 {
            return Err(Error::Config(format!(
                "minimum runway length must not be negative, got {}",
                min_runway_length_ft
            )));
        }
        if result_count == 0 {
            return Err(Error::Config(
                "result count must be at least 1".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        let mut eligible = Vec::new();
        let mut total = 0;

        for airport in airports {
            total += 1;
            validate(&airport)?;

            if !seen.insert(airport.icao.clone()) {
                return Err(Error::DataLoad(format!("duplicate ICAO {}", airport.icao)));
            }

            if airport.airport_type != AirportType::Commercial
                || airport.max_runway_length_ft < min_runway_length_ft
            {
                continue;
            }

            let metar = weather_by_icao.get(&airport.icao).cloned();
            eligible.push(AirportRecord {
                icao: airport.icao,
                latitude: airport.latitude,
                longitude: airport.longitude,
                airport_type: airport.airport_type,
                max_runway_length_ft: airport.max_runway_length_ft,
                metar,
            });
        }

        let positions = eligible
            .iter()
            .map(|a| LatLon::new(a.latitude, a.longitude))
            .collect();

        info!(
            "Indexed {} eligible airports out of {} ({} with METAR)",
            eligible.len(),
            total,
            eligible.iter().filter(|a| a.metar.is_some()).count()
        );

        Ok(Self {
            airports: eligible,
            positions,
            min_runway_length_ft,
            result_count,
        })
    }

    /// Ranks eligible airports by distance from the reference point.
    ///
    /// Without an altitude the nearest N are returned. With one, all airports within
    /// glide range are returned when there are at least N of them, otherwise the
    /// nearest N regardless of range.
    pub fn get_closest_airports(
        &self,
        latitude: f64,
        longitude: f64,
        altitude_ft: Option<f64>,
    ) -> Result<Vec<AirportCandidate>, Error> {
        let reference = LatLon::new(latitude, longitude);
        if !reference.is_valid() {
            return Err(Error::InvalidPosition {
                latitude,
                longitude,
            });
        }

        let mut ranked: Vec<(usize, f64)> = self
            .positions
            .iter()
            .map(|position| reference.distance_km(position))
            .enumerate()
            .collect();
        // Stable, so equal distances keep load order
        ranked.sort_by(|a, b| a.1.total_cmp(&b.1));

        let max_range = match altitude_ft {
            Some(altitude) => max_glide_range_km(altitude),
            None => return Ok(self.candidates(ranked.into_iter().take(self.result_count), None)),
        };

        let in_range_count = ranked.iter().filter(|(_, d)| *d <= max_range).count();
        let candidates = match select_policy(in_range_count, self.result_count) {
            Selection::AllInRange => self.candidates(
                ranked.into_iter().filter(|(_, d)| *d <= max_range),
                Some(max_range),
            ),
            Selection::Nearest => {
                self.candidates(ranked.into_iter().take(self.result_count), Some(max_range))
            }
        };

        Ok(candidates)
    }

    fn candidates<I>(&self, ranked: I, max_range: Option<f64>) -> Vec<AirportCandidate>
    where
        I: Iterator<Item = (usize, f64)>,
    {
        ranked
            .map(|(i, distance_km)| AirportCandidate {
                airport: self.airports[i].clone(),
                distance_km,
                in_glide_range: max_range.map_or(false, |max| distance_km <= max),
            })
            .collect()
    }

    #[cfg(test)]
    pub fn get(&self, icao: &str) -> Option<&AirportRecord> {
        self.airports.iter().find(|a| a.icao == icao)
    }

    pub fn icaos(&self) -> Vec<String> {
        self.airports.iter().map(|a| a.icao.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.airports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.airports.is_empty()
    }

    pub fn min_runway_length_ft(&self) -> f64 {
        self.min_runway_length_ft
    }

    pub fn result_count(&self) -> usize {
        self.result_count
    }
}

fn validate(airport: &AirportData) -> Result<(), Error> {
    if airport.icao.is_empty() {
        return Err(Error::DataLoad("airport without ICAO".to_string()));
    }
    if !airport.position().is_valid() {
        return Err(Error::DataLoad(format!(
            "{} has invalid position {}, {}",
            airport.icao, airport.latitude, airport.longitude
        )));
    }
    if !airport.max_runway_length_ft.is_finite() {
        return Err(Error::DataLoad(format!(
            "{} has invalid runway length {}",
            airport.icao, airport.max_runway_length_ft
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    const REF_LAT: f64 = 0.0;
    const REF_LON: f64 = 0.0;

    fn airport(icao: &str, lat: f64, lon: f64, kind: AirportType, runway: f64) -> AirportData {
        AirportData {
            icao: icao.to_string(),
            latitude: lat,
            longitude: lon,
            airport_type: kind,
            max_runway_length_ft: runway,
        }
    }

    /// A commercial airport due north of the reference point at roughly `km`.
    fn north(icao: &str, km: f64) -> AirportData {
        let lat = (km / crate::util::EARTH_RADIUS_KM).to_degrees();
        airport(icao, lat, REF_LON, AirportType::Commercial, 10000.0)
    }

    fn build(airports: Vec<AirportData>, n: usize) -> AirportIndex {
        AirportIndex::build(airports, &HashMap::new(), DEFAULT_MIN_RUNWAY_LENGTH_FT, n).unwrap()
    }

    fn icaos(candidates: &[AirportCandidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.airport.icao.as_str()).collect()
    }

    // Altitude in feet giving the requested glide range in km
    fn altitude_for_range(km: f64) -> f64 {
        km / GLIDE_RATIO
    }

    #[test]
    fn test_select_policy_boundary() {
        assert_eq!(select_policy(5, 5), Selection::AllInRange);
        assert_eq!(select_policy(6, 5), Selection::AllInRange);
        assert_eq!(select_policy(4, 5), Selection::Nearest);
        assert_eq!(select_policy(0, 1), Selection::Nearest);
    }

    #[test]
    fn test_glide_range_uses_altitude_unconverted() {
        assert_eq!(max_glide_range_km(10000.0), 170000.0);
        assert_eq!(max_glide_range_km(0.0), 0.0);
    }

    #[test]
    fn test_config_errors() {
        let result = AirportIndex::build(vec![], &HashMap::new(), -1.0, 5);
        assert!(matches!(result, Err(Error::Config(_))));

        let result = AirportIndex::build(vec![], &HashMap::new(), f64::NAN, 5);
        assert!(matches!(result, Err(Error::Config(_))));

        let result = AirportIndex::build(vec![], &HashMap::new(), 8000.0, 0);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_runway_threshold_is_valid() {
        let index = AirportIndex::build(vec![north("AAAA", 1.0)], &HashMap::new(), 0.0, 1);
        assert_eq!(index.unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_records_are_data_load_errors() {
        let bad = vec![
            vec![airport("", 1.0, 1.0, AirportType::Commercial, 9000.0)],
            vec![airport("AAAA", 91.0, 1.0, AirportType::Commercial, 9000.0)],
            vec![airport("AAAA", 1.0, f64::NAN, AirportType::Commercial, 9000.0)],
            vec![airport("AAAA", 1.0, 1.0, AirportType::Commercial, f64::INFINITY)],
            vec![north("AAAA", 10.0), north("AAAA", 20.0)],
        ];

        for airports in bad {
            let result = AirportIndex::build(airports, &HashMap::new(), 8000.0, 5);
            assert!(matches!(result, Err(Error::DataLoad(_))));
        }
    }

    #[test]
    fn test_eligibility_filter() {
        let airports = vec![
            airport("COMM", 0.1, 0.0, AirportType::Commercial, 8000.0),
            airport("PRIV", 0.1, 0.0, AirportType::Private, 12000.0),
            airport("MILI", 0.1, 0.0, AirportType::Military, 12000.0),
            airport("SHRT", 0.1, 0.0, AirportType::Commercial, 7999.0),
        ];

        let index = build(airports, 5);

        assert_eq!(index.len(), 1);
        assert!(index.get("COMM").is_some());
        assert!(index.get("SHRT").is_none());

        // No query can surface an ineligible airport
        for &(lat, lon, alt) in &[(0.0, 0.0, None), (45.0, 90.0, Some(35000.0)), (-89.0, -179.0, Some(0.0))] {
            let result = index.get_closest_airports(lat, lon, alt).unwrap();
            assert_eq!(icaos(&result), vec!["COMM"]);
            for candidate in &result {
                assert_eq!(candidate.airport.airport_type, AirportType::Commercial);
                assert!(candidate.airport.max_runway_length_ft >= index.min_runway_length_ft());
            }
        }
    }

    #[test]
    fn test_weather_is_left_joined() {
        let mut weather = HashMap::new();
        weather.insert("WXOK".to_string(), "WXOK 011250Z 27010KT CAVOK".to_string());
        weather.insert("WXMT".to_string(), String::new());
        weather.insert("GONE".to_string(), "GONE 011250Z".to_string());

        let airports = vec![north("WXOK", 10.0), north("WXMT", 20.0), north("NOWX", 30.0)];
        let index = AirportIndex::build(airports, &weather, 8000.0, 5).unwrap();

        assert_eq!(index.len(), 3);
        assert!(index.get("GONE").is_none());
        assert_eq!(
            index.get("WXOK").unwrap().metar.as_deref(),
            Some("WXOK 011250Z 27010KT CAVOK")
        );
        assert_eq!(index.get("WXMT").unwrap().metar.as_deref(), Some(""));
        assert_eq!(index.get("NOWX").unwrap().metar, None);
    }

    #[test]
    fn test_invalid_position() {
        let index = build(vec![north("AAAA", 10.0)], 5);

        for &(lat, lon) in &[(90.5, 0.0), (-91.0, 0.0), (0.0, 180.5), (0.0, -181.0), (f64::NAN, 0.0)] {
            let result = index.get_closest_airports(lat, lon, None);
            assert!(matches!(result, Err(Error::InvalidPosition { .. })));
        }

        assert!(index.get_closest_airports(90.0, -180.0, None).is_ok());
    }

    #[test]
    fn test_no_altitude_returns_nearest_n() {
        let airports = vec![
            north("D300", 300.0),
            north("D100", 100.0),
            north("D400", 400.0),
            north("D200", 200.0),
        ];
        let index = build(airports, 3);

        let result = index.get_closest_airports(REF_LAT, REF_LON, None).unwrap();

        assert_eq!(icaos(&result), vec!["D100", "D200", "D300"]);
        assert!(result.iter().all(|c| !c.in_glide_range));
    }

    #[test]
    fn test_no_altitude_with_fewer_than_n_eligible() {
        let index = build(vec![north("D200", 200.0), north("D100", 100.0)], 5);

        let result = index.get_closest_airports(REF_LAT, REF_LON, None).unwrap();

        assert_eq!(icaos(&result), vec!["D100", "D200"]);
    }

    #[test]
    fn test_empty_index_returns_nothing() {
        let index = build(vec![], 5);

        assert!(index.is_empty());
        assert!(index.get_closest_airports(10.0, 10.0, None).unwrap().is_empty());
        assert!(index.get_closest_airports(10.0, 10.0, Some(30000.0)).unwrap().is_empty());
    }

    #[test]
    fn test_ranking_is_non_decreasing() {
        let airports: Vec<AirportData> = (0..50)
            .map(|i| {
                let lat = ((i * 37) % 160) as f64 - 80.0;
                let lon = ((i * 71) % 340) as f64 - 170.0;
                airport(&format!("A{:03}", i), lat, lon, AirportType::Commercial, 9000.0)
            })
            .collect();
        let index = build(airports, 50);

        for &(lat, lon, alt) in &[(47.2, -122.1, None), (-33.9, 151.1, Some(100.0)), (0.0, 0.0, Some(1.0))] {
            let result = index.get_closest_airports(lat, lon, alt).unwrap();
            for pair in result.windows(2) {
                assert!(pair[0].distance_km <= pair[1].distance_km);
            }
        }
    }

    #[test]
    fn test_antipodal_airport_ranks_last() {
        let mut airports: Vec<AirportData> = (0..39)
            .map(|i| {
                let lat = ((i * 13) % 120) as f64 - 60.0;
                let lon = ((i * 29) % 300) as f64 - 150.0;
                airport(&format!("B{:03}", i), lat, lon, AirportType::Commercial, 9000.0)
            })
            .collect();
        airports.push(airport("ANTI", -2.5, 0.25, AirportType::Commercial, 9000.0));
        let index = build(airports, 40);

        let result = index.get_closest_airports(2.5, -179.75, None).unwrap();

        assert_eq!(result.len(), 40);
        assert_eq!(result[39].airport.icao, "ANTI");
        assert!(result.iter().all(|c| c.distance_km.is_finite()));
        for pair in result.windows(2) {
            assert!(pair[0].distance_km <= pair[1].distance_km);
        }
    }

    #[test]
    fn test_ties_keep_load_order() {
        let airports = vec![
            airport("EAST", 0.0, 1.0, AirportType::Commercial, 9000.0),
            airport("WEST", 0.0, -1.0, AirportType::Commercial, 9000.0),
            airport("NEAR", 0.0, 0.5, AirportType::Commercial, 9000.0),
        ];
        let index = build(airports, 3);

        let result = index.get_closest_airports(REF_LAT, REF_LON, None).unwrap();

        assert_eq!(icaos(&result), vec!["NEAR", "EAST", "WEST"]);
        assert_eq!(result[1].distance_km, result[2].distance_km);
    }

    #[test]
    fn test_exactly_n_in_range_returns_n() {
        let n = 3;
        let airports = vec![
            north("IN01", 10.0),
            north("IN02", 20.0),
            north("IN03", 30.0),
            north("OUT1", 100.0),
            north("OUT2", 200.0),
        ];
        let index = build(airports, n);

        let result = index
            .get_closest_airports(REF_LAT, REF_LON, Some(altitude_for_range(50.0)))
            .unwrap();

        assert_eq!(icaos(&result), vec!["IN01", "IN02", "IN03"]);
        assert!(result.iter().all(|c| c.in_glide_range));
    }

    #[test]
    fn test_more_than_n_in_range_returns_all_in_range() {
        let n = 3;
        let airports = vec![
            north("IN01", 10.0),
            north("IN02", 20.0),
            north("IN03", 30.0),
            north("IN04", 40.0),
            north("OUT1", 100.0),
        ];
        let index = build(airports, n);

        let result = index
            .get_closest_airports(REF_LAT, REF_LON, Some(altitude_for_range(50.0)))
            .unwrap();

        assert_eq!(icaos(&result), vec!["IN01", "IN02", "IN03", "IN04"]);
        assert!(result.iter().all(|c| c.in_glide_range));
    }

    #[test]
    fn test_fewer_than_n_in_range_falls_back_to_nearest() {
        let airports = vec![
            north("IN01", 10.0),
            north("OUT1", 100.0),
            north("OUT2", 200.0),
            north("OUT3", 300.0),
        ];
        let index = build(airports, 3);

        let result = index
            .get_closest_airports(REF_LAT, REF_LON, Some(altitude_for_range(50.0)))
            .unwrap();

        assert_eq!(icaos(&result), vec!["IN01", "OUT1", "OUT2"]);
        let flags: Vec<bool> = result.iter().map(|c| c.in_glide_range).collect();
        assert_eq!(flags, vec![true, false, false]);
    }

    #[test]
    fn test_nothing_in_range_still_returns_nearest_n() {
        let airports = vec![north("D100", 100.0), north("D200", 200.0), north("D300", 300.0)];
        let index = build(airports, 2);

        let result = index
            .get_closest_airports(REF_LAT, REF_LON, Some(0.0))
            .unwrap();

        assert_eq!(icaos(&result), vec!["D100", "D200"]);
        assert!(result.iter().all(|c| !c.in_glide_range));
    }

    #[test]
    fn test_three_airport_example() {
        let airports = vec![north("D500", 500.0), north("D010", 10.0), north("D050", 50.0)];
        let index = build(airports, 2);

        let result = index.get_closest_airports(REF_LAT, REF_LON, None).unwrap();
        assert_eq!(icaos(&result), vec!["D010", "D050"]);
        assert!((result[0].distance_km - 10.0).abs() < 1e-6);
        assert!((result[1].distance_km - 50.0).abs() < 1e-6);

        let result = index
            .get_closest_airports(REF_LAT, REF_LON, Some(altitude_for_range(60.0)))
            .unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(icaos(&result), vec!["D010", "D050"]);
        assert!(result.iter().all(|c| c.in_glide_range));
    }

    #[test]
    fn test_queries_do_not_change_index() {
        let index = build(vec![north("D100", 100.0), north("D010", 10.0)], 1);

        let first = index.get_closest_airports(REF_LAT, REF_LON, Some(1000.0)).unwrap();
        let _ = index.get_closest_airports(45.0, 45.0, None).unwrap();
        let second = index.get_closest_airports(REF_LAT, REF_LON, Some(1000.0)).unwrap();

        assert_eq!(first, second);
        assert_eq!(index.icaos(), vec!["D100", "D010"]);
    }

    #[test]
    fn test_concurrent_queries() {
        let airports: Vec<AirportData> = (1..=20).map(|i| north(&format!("N{:03}", i), i as f64 * 10.0)).collect();
        let index = Arc::new(build(airports, 5));
        let expected = index.get_closest_airports(REF_LAT, REF_LON, None).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let index = index.clone();
                thread::spawn(move || index.get_closest_airports(REF_LAT, REF_LON, None).unwrap())
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    }
}
