//! Remote dataset sources: fetch with retry, normalize shape, refresh
//! the reference cache.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::{Client, Url};
use serde::{de::DeserializeOwned, Deserialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::{FareQuote, Location, RouteEntry, SurchargeRule};
use crate::infra::cache::{Dataset, ReferenceCache};

const USER_AGENT: &str = concat!("mobilidade/", env!("CARGO_PKG_VERSION"));

/// Attempts per required dataset before giving up.
const FETCH_ATTEMPTS: u32 = 3;

/// Base delay between attempts; attempt `n` waits `n × base`.
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Freshness window before a dataset refresh is triggered.
const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Remote endpoints for the three datasets. The defaults point at the
/// production sources; tests and alternative deployments override them.
#[derive(Clone, Debug)]
pub struct SourceConfig {
    pub locations_url: String,
    pub routes_url: String,
    pub surcharges_url: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            locations_url:
                "https://script.google.com/macros/s/AKfycbzXuUIkcbuM9ryesRTg5ofVtSQFFLAr31QTUjDW0JPYSFd15TVPhKhk0omwsGfcNpHo/exec"
                    .to_string(),
            routes_url: "https://cdn.jsdelivr.net/gh/jardelferreira/gfv@main/rotas_editadas_3.json"
                .to_string(),
            surcharges_url: "https://cdn.jsdelivr.net/gh/jardelferreira/gfv@main/adicionais.json"
                .to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("http request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("remote source unreachable after {attempts} attempts")]
    Exhausted {
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },
}

/// Client for the dataset endpoints. Holds no dataset state of its own;
/// everything it fetches lands in the [`ReferenceCache`] it is handed.
#[derive(Clone)]
pub struct DatasetClient {
    http: Client,
    locations_url: Url,
    routes_url: Url,
    surcharges_url: Url,
    retry_delay: Duration,
    ttl: Duration,
}

impl DatasetClient {
    pub fn new() -> Result<Self, FetchError> {
        Self::with_config(SourceConfig::default())
    }

    pub fn with_config(config: SourceConfig) -> Result<Self, FetchError> {
        let http = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            http,
            locations_url: Url::parse(&config.locations_url)?,
            routes_url: Url::parse(&config.routes_url)?,
            surcharges_url: Url::parse(&config.surcharges_url)?,
            retry_delay: DEFAULT_RETRY_DELAY,
            ttl: DEFAULT_TTL,
        })
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Serve `dataset` from the cache when fresh, otherwise refresh it
    /// from its remote source.
    ///
    /// Locations and routes are required: their fetches retry with
    /// backoff and exhaustion propagates, leaving the working set at its
    /// last-known records. The surcharge catalog is best-effort — a
    /// single attempt, an empty catalog on failure, never an error.
    pub async fn ensure_fresh(
        &self,
        cache: &mut ReferenceCache,
        dataset: Dataset,
    ) -> Result<(), FetchError> {
        if !cache.is_stale(dataset, self.ttl) {
            debug!(%dataset, "serving dataset from cache");
            return Ok(());
        }

        match dataset {
            Dataset::Locations => {
                info!(%dataset, "refreshing dataset");
                let payload: Vec<LocationDto> = self.fetch_with_retry(&self.locations_url).await?;
                let records: Vec<Location> = payload.into_iter().map(Location::from).collect();
                info!(%dataset, records = records.len(), "dataset refreshed");
                if let Err(err) = cache.replace_locations(records) {
                    warn!(%dataset, %err, "failed to persist dataset; serving from memory");
                }
            }
            Dataset::Routes => {
                info!(%dataset, "refreshing dataset");
                let payload: Vec<RouteDto> = self.fetch_with_retry(&self.routes_url).await?;
                let records: Vec<RouteEntry> = payload.into_iter().map(RouteEntry::from).collect();
                info!(%dataset, records = records.len(), "dataset refreshed");
                if let Err(err) = cache.replace_routes(records) {
                    warn!(%dataset, %err, "failed to persist dataset; serving from memory");
                }
            }
            Dataset::Surcharges => self.load_surcharges(cache).await,
        }
        Ok(())
    }

    /// Best-effort refresh of the optional surcharge catalog: one
    /// attempt, no retries, an empty working set on failure.
    async fn load_surcharges(&self, cache: &mut ReferenceCache) {
        match self.fetch::<Vec<SurchargeDto>>(&self.surcharges_url).await {
            Ok(payload) => {
                let records: Vec<SurchargeRule> =
                    payload.into_iter().map(SurchargeRule::from).collect();
                info!(records = records.len(), "surcharge catalog refreshed");
                if let Err(err) = cache.replace_surcharges(records) {
                    warn!(%err, "failed to persist surcharge catalog; serving from memory");
                }
            }
            Err(err) => {
                warn!(%err, "surcharge catalog unavailable; continuing with an empty catalog");
                cache.reset_surcharges();
            }
        }
    }

    async fn fetch_with_retry<T: DeserializeOwned>(&self, url: &Url) -> Result<T, FetchError> {
        let mut attempt = 1;
        loop {
            match self.fetch(url).await {
                Ok(payload) => return Ok(payload),
                Err(err) => {
                    debug!(%url, attempt, %err, "dataset fetch attempt failed");
                    if attempt >= FETCH_ATTEMPTS {
                        return Err(FetchError::Exhausted {
                            attempts: attempt,
                            source: err,
                        });
                    }
                    tokio::time::sleep(self.retry_delay * attempt).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, url: &Url) -> Result<T, reqwest::Error> {
        let response = self.http.get(url.clone()).send().await?.error_for_status()?;
        response.json().await
    }
}

#[derive(Debug, Deserialize)]
struct LocationDto {
    #[serde(default, deserialize_with = "json_string")]
    id: Option<String>,
    #[serde(rename = "ID", default, deserialize_with = "json_string")]
    id_upper: Option<String>,
    #[serde(default)]
    local: Option<String>,
    #[serde(rename = "LOCAL", default)]
    local_upper: Option<String>,
    #[serde(rename = "BAIRRO", default)]
    bairro: Option<String>,
    #[serde(rename = "CIDADE", default)]
    cidade: Option<String>,
    #[serde(rename = "UF", default)]
    uf: Option<String>,
}

impl From<LocationDto> for Location {
    fn from(dto: LocationDto) -> Self {
        let label = dto.local.unwrap_or_else(|| {
            format!(
                "{}, {}, {}-{}",
                dto.local_upper.unwrap_or_default(),
                dto.bairro.unwrap_or_default(),
                dto.cidade.unwrap_or_default(),
                dto.uf.unwrap_or_default(),
            )
        });
        Self {
            id: dto.id.or(dto.id_upper).unwrap_or_default(),
            label,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RouteDto {
    #[serde(default, deserialize_with = "json_string")]
    id: Option<String>,
    #[serde(default)]
    rotas: HashMap<String, FareQuoteDto>,
}

#[derive(Debug, Deserialize)]
struct FareQuoteDto {
    #[serde(default, deserialize_with = "json_string")]
    value: Option<String>,
}

impl From<RouteDto> for RouteEntry {
    fn from(dto: RouteDto) -> Self {
        Self {
            origin_id: dto.id.unwrap_or_default(),
            destinations: dto
                .rotas
                .into_iter()
                .map(|(destination, quote)| {
                    (
                        destination,
                        FareQuote {
                            base_value: quote.value.unwrap_or_default(),
                        },
                    )
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SurchargeDto {
    #[serde(default)]
    nome: Option<String>,
    #[serde(default)]
    operacao: Option<String>,
    #[serde(default, deserialize_with = "json_string")]
    valor: Option<String>,
}

impl From<SurchargeDto> for SurchargeRule {
    fn from(dto: SurchargeDto) -> Self {
        Self {
            name: dto.nome.unwrap_or_default(),
            operator: dto.operacao.unwrap_or_default(),
            magnitude: dto.valor.unwrap_or_default(),
        }
    }
}

/// Accept a JSON string or bare number as a string; anything else reads
/// as absent.
fn json_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(text) => Some(text),
        serde_json::Value::Number(number) => Some(number.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_client() -> DatasetClient {
        // Port 9 (discard) refuses connections on loopback, so every
        // attempt fails fast.
        DatasetClient::with_config(SourceConfig {
            locations_url: "http://127.0.0.1:9/localidades".to_string(),
            routes_url: "http://127.0.0.1:9/rotas".to_string(),
            surcharges_url: "http://127.0.0.1:9/adicionais".to_string(),
        })
        .unwrap()
        .with_retry_delay(Duration::from_millis(5))
    }

    #[test]
    fn location_label_composed_from_uppercase_fields() {
        let dto: LocationDto = serde_json::from_str(
            r#"{"ID": 7, "LOCAL": "Rodoviária", "BAIRRO": "Centro", "CIDADE": "Sobral", "UF": "CE"}"#,
        )
        .unwrap();
        let location = Location::from(dto);
        assert_eq!(location.id, "7");
        assert_eq!(location.label, "Rodoviária, Centro, Sobral-CE");
    }

    #[test]
    fn location_prefers_preformatted_label() {
        let dto: LocationDto =
            serde_json::from_str(r#"{"id": "3", "local": "Terminal Norte"}"#).unwrap();
        let location = Location::from(dto);
        assert_eq!(location.id, "3");
        assert_eq!(location.label, "Terminal Norte");
    }

    #[test]
    fn route_values_accept_strings_and_numbers() {
        let dto: RouteDto = serde_json::from_str(
            r#"{"id": 1, "rotas": {"2": {"value": "15.5"}, "3": {"value": 20}}}"#,
        )
        .unwrap();
        let entry = RouteEntry::from(dto);
        assert_eq!(entry.origin_id, "1");
        assert_eq!(entry.destinations["2"].base_value, "15.5");
        assert_eq!(entry.destinations["3"].base_value, "20");
    }

    #[test]
    fn surcharge_magnitude_accepts_numbers() {
        let dto: SurchargeDto =
            serde_json::from_str(r#"{"nome": "Bagagem extra", "operacao": "+", "valor": 5}"#)
                .unwrap();
        let rule = SurchargeRule::from(dto);
        assert_eq!(rule.operator, "+");
        assert_eq!(rule.magnitude, "5");
        assert_eq!(rule.display_value(), "5+");
    }

    #[tokio::test]
    async fn required_dataset_exhausts_retries_and_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = ReferenceCache::open(dir.path()).unwrap();
        let client = unreachable_client();

        let outcome = client.ensure_fresh(&mut cache, Dataset::Locations).await;
        match outcome {
            Err(FetchError::Exhausted { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("expected exhaustion, got {other:?}"),
        }
        // Working set untouched by the failed refresh.
        assert!(cache.locations().is_empty());
    }

    #[tokio::test]
    async fn optional_surcharges_fail_soft() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = ReferenceCache::open(dir.path()).unwrap();
        let client = unreachable_client();

        let outcome = client.ensure_fresh(&mut cache, Dataset::Surcharges).await;
        assert!(outcome.is_ok());
        assert!(cache.surcharges().is_empty());
    }

    #[tokio::test]
    async fn fresh_dataset_is_served_without_a_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = ReferenceCache::open(dir.path()).unwrap();
        cache
            .replace_locations(vec![Location {
                id: "1".to_string(),
                label: "Terminal Norte".to_string(),
            }])
            .unwrap();

        // The endpoints are unreachable, so only the cache can satisfy this.
        let client = unreachable_client();
        client
            .ensure_fresh(&mut cache, Dataset::Locations)
            .await
            .unwrap();
        assert_eq!(cache.locations().len(), 1);
    }
}
