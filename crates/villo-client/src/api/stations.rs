//! Stations API.

use serde_json::Value;
use url::Url;

use crate::client::BikeShareClient;
use crate::error::{Error, Result};

/// Stations API client.
pub struct StationsApi {
    client: BikeShareClient,
}

impl StationsApi {
    pub(crate) fn new(client: BikeShareClient) -> Self {
        Self { client }
    }

    /// List every station of the discovered contract.
    ///
    /// Records are returned as-is; mapping them onto typed station records
    /// is left to the caller.
    pub async fn list(&self) -> Result<Vec<Value>> {
        let discovered = &self.client.inner().discovered;
        let stations = discovered.stations()?;
        let contract = discovered.contract()?;

        let url = Url::parse(&stations.url).map_err(|e| Error::bad_endpoint(&stations.url, e))?;
        let query = [
            ("apiKey", stations.api_key.as_str()),
            ("contract", contract.name.as_str()),
        ];

        let records = self
            .client
            .get_records(url, &query, Default::default())
            .await?;
        tracing::info!(contract = %contract.name, count = records.len(), "Fetched stations");
        Ok(records)
    }
}
