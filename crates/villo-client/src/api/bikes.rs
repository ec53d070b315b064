//! Bikes API.

use std::fmt;

use serde_json::Value;
use url::Url;

use crate::client::BikeShareClient;
use crate::error::{Error, Result};

/// Media type selecting version 4 of the bikes API.
pub const BIKES_MEDIA_TYPE: &str = "application/vnd.bikes.v4+json";

/// Bikes API client.
pub struct BikesApi {
    client: BikeShareClient,
}

impl BikesApi {
    pub(crate) fn new(client: BikeShareClient) -> Self {
        Self { client }
    }

    /// List the bikes currently docked at a station.
    pub async fn at_station(&self, station_number: impl fmt::Display) -> Result<Vec<Value>> {
        let contract = self.client.inner().discovered.contract()?;
        let url = bikes_url(&self.client.auth_host().await, &contract.name)?;
        let station_number = station_number.to_string();

        let records = self
            .client
            .get_records(
                url,
                &[("stationNumber", station_number.as_str())],
                BikeShareClient::accept(BIKES_MEDIA_TYPE),
            )
            .await?;
        tracing::debug!(station = %station_number, count = records.len(), "Fetched bikes");
        Ok(records)
    }
}

/// `{auth_host}/contracts/{contract}/bikes`, with the contract name
/// percent-encoded as a single path segment.
fn bikes_url(auth_host: &str, contract: &str) -> Result<Url> {
    let mut url = Url::parse(auth_host).map_err(|e| Error::bad_endpoint(auth_host, e))?;
    url.path_segments_mut()
        .map_err(|_| Error::bad_endpoint(auth_host, "cannot be a base"))?
        .pop_if_empty()
        .extend(["contracts", contract, "bikes"]);
    Ok(url)
}
