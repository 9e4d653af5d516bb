/// Mean Earth radius in meters (IUGG).
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

#[derive(Debug, thiserror::Error)]
pub enum CoordinateError {
	#[error("Latitude {0} is outside [-90, 90].")]
	Latitude(f64),
	#[error("Longitude {0} is outside [-180, 180].")]
	Longitude(f64),
}

/// Latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GeoPoint {
	pub lat: f64,
	pub lng: f64,
}
impl GeoPoint {
	/// Range-checks both coordinates. NaN and infinities fail the range
	/// comparisons, so they are rejected without a separate check.
	pub fn try_new(lat: f64, lng: f64) -> Result<Self, CoordinateError> {
		if !(-90.0..=90.0).contains(&lat) {
			return Err(CoordinateError::Latitude(lat));
		}
		if !(-180.0..=180.0).contains(&lng) {
			return Err(CoordinateError::Longitude(lng));
		}

		Ok(Self { lat, lng })
	}
}

/// Great-circle distance in meters between two points, using the haversine
/// formula on a mean-radius sphere.
pub fn haversine_m(a: GeoPoint, b: GeoPoint) -> f64 {
	let d_lat = (b.lat - a.lat).to_radians();
	let d_lng = (b.lng - a.lng).to_radians();
	let h = (d_lat / 2.0).sin().powi(2)
		+ a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);

	2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}
