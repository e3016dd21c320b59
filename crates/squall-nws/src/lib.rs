//! [`NwsClient`] — the National Weather Service implementation of the
//! remote weather capability.
//!
//! The NWS API serves GeoJSON and asks clients to identify themselves
//! with a `User-Agent`. Server faults (5xx) get a small retry budget;
//! client faults (4xx) surface immediately with the problem detail from
//! the response body.

mod feature;

use serde::{Deserialize, de::DeserializeOwned};
use squall_core::{
  alert::AlertBundle,
  remote::{RemoteError, WeatherClient},
  zone::Zone,
};
use thiserror::Error;

use crate::feature::{AlertProps, Feature, FeatureCollection, ZoneProps};

pub const DEFAULT_BASE_URL: &str = "https://api.weather.gov";

/// Attempts per request, counting the first.
const ATTEMPTS: u32 = 3;

#[derive(Debug, Error)]
#[error("failed to build HTTP client: {0}")]
pub struct BuildError(#[from] reqwest::Error);

/// Failure bodies are RFC 7807 problem documents.
#[derive(Debug, Deserialize)]
struct ProblemDetail {
  #[serde(default)]
  detail: String,
}

pub struct NwsClient {
  http: reqwest::Client,
  base: String,
}

impl NwsClient {
  pub fn new(user_agent: &str) -> Result<Self, BuildError> {
    Self::with_base_url(user_agent, DEFAULT_BASE_URL)
  }

  pub fn with_base_url(
    user_agent: &str,
    base: &str,
  ) -> Result<Self, BuildError> {
    let http = reqwest::Client::builder()
      .user_agent(user_agent)
      .timeout(std::time::Duration::from_secs(30))
      .pool_max_idle_per_host(100)
      .build()?;
    Ok(Self { http, base: base.trim_end_matches('/').to_owned() })
  }

  async fn get_json<T: DeserializeOwned>(
    &self,
    path_and_query: &str,
  ) -> Result<T, RemoteError> {
    let url = format!("{}{path_and_query}", self.base);

    let mut attempt = 0;
    loop {
      attempt += 1;
      match self.fetch(&url).await {
        Ok(value) => return Ok(value),
        Err(err) if err.is_retryable() && attempt < ATTEMPTS => {
          tracing::debug!(%url, attempt, error = %err, "retrying request");
        }
        Err(err) => return Err(err),
      }
    }
  }

  async fn fetch<T: DeserializeOwned>(
    &self,
    url: &str,
  ) -> Result<T, RemoteError> {
    let response = self
      .http
      .get(url)
      .send()
      .await
      .map_err(|e| RemoteError::Transport(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
      let detail = response
        .json::<ProblemDetail>()
        .await
        .map(|p| p.detail)
        .unwrap_or_default();
      return Err(RemoteError::Status { status: status.as_u16(), detail });
    }

    response
      .json::<T>()
      .await
      .map_err(|e| RemoteError::Decode(e.to_string()))
  }
}

impl WeatherClient for NwsClient {
  async fn zone_catalog(&self, region: &str) -> Result<Vec<Zone>, RemoteError> {
    let collection: FeatureCollection<ZoneProps> =
      self.get_json(&format!("/zones?area={region}")).await?;

    collection
      .features
      .into_iter()
      .map(|f| f.into_zone(region))
      .collect()
  }

  async fn zone_detail(
    &self,
    kind: &str,
    code: &str,
  ) -> Result<Zone, RemoteError> {
    let feature: Feature<ZoneProps> =
      self.get_json(&format!("/zones/{kind}/{code}")).await?;
    feature.into_zone("")
  }

  async fn active_alerts(
    &self,
    regions: &[String],
  ) -> Result<Vec<AlertBundle>, RemoteError> {
    if regions.is_empty() {
      return Ok(vec![]);
    }

    let collection: FeatureCollection<AlertProps> = self
      .get_json(&format!(
        "/alerts/active?status=actual&area={}",
        regions.join(","),
      ))
      .await?;

    collection.features.into_iter().map(Feature::into_bundle).collect()
  }
}
