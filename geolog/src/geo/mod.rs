pub mod distance;
pub mod geocenter;

pub use distance::{distance_km, switch_meridian, EARTH_RADIUS_KM};
pub use geocenter::estimate_geocenter;
