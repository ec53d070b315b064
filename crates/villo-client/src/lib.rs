//! Authenticated client for a Cyclocity bike-share site.
//!
//! The client discovers the site's credentials (see `villo_auth`), keeps a
//! session fresh and exposes the two read endpoints the tracker needs:
//!
//! - **Stations**: every station of the operator's contract
//! - **Bikes**: the bikes currently docked at one station
//!
//! Records come back as untyped JSON; mapping them to domain records and
//! persisting snapshots happens downstream.

pub mod api;
pub mod client;
pub mod error;

pub use api::{BIKES_MEDIA_TYPE, BikesApi, StationsApi};
pub use client::{BikeShareClient, ClientBuilder};
pub use error::{Error, Result};
