// Mean earth radius, spherical model
pub const EARTH_RADIUS_KM: f64 = 6371.0;

const KM_TO_NM: f64 = 0.539957;
const METERS_TO_FEET: f64 = 3.28084;

pub fn convert_km_to_nm(km: f64) -> f64 {
    km * KM_TO_NM
}

pub fn convert_meters_to_feet(meters: f64) -> f64 {
    meters * METERS_TO_FEET
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Latitude within [-90, 90] and longitude within [-180, 180]. NaN is never valid.
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lon)
    }

    /// Great-circle distance in kilometers using the haversine formula.
    pub fn distance_km(&self, other: &LatLon) -> f64 {
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();
        let delta_lat = lat2 - lat1;
        let delta_lon = other.lon.to_radians() - self.lon.to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
        // Rounding can push `a` just past 1 for antipodal points
        let a = a.clamp(0.0, 1.0);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        EARTH_RADIUS_KM * c
    }
}
