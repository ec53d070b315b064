//! API endpoint implementations.

mod bikes;
mod stations;

pub use bikes::{BIKES_MEDIA_TYPE, BikesApi};
pub use stations::StationsApi;
