//! Geodesy helpers
//!
//! Pure distance and formatting functions used both while recording
//! (incremental distance accumulation) and when displaying a finished route.

mod distance;
mod format;

pub use distance::{distance, total_distance, LatLng, EARTH_RADIUS_M};
pub use format::{format_distance, format_duration};
