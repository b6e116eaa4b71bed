//! IP geolocation with a shared TTL cache.

mod cache;
mod store;

use std::net::IpAddr;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use wayfarer_core::config::GeoConfig;

pub use cache::GeoCache;
pub use store::{CacheEntry, CacheStore, JsonFileStore, MemoryStore, SqliteStore};

use crate::error::CapabilityError;
use crate::http;

/// Cache key used when the caller has no routable address.
pub const LOCAL_KEY: &str = "local";

/// The parts of a geolocation payload capabilities care about.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct GeoInfo {
    pub city: Option<String>,
    pub region: Option<String>,
    pub country_name: Option<String>,
    pub country_code: Option<String>,
    pub currency: Option<String>,
}

impl GeoInfo {
    pub fn from_payload(payload: &Value) -> Self {
        serde_json::from_value(payload.clone()).unwrap_or_default()
    }

    /// "City, Country" with whichever parts are known.
    pub fn place(&self) -> String {
        [self.city.as_deref(), self.country_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Resolves a client address to a location, consulting the cache first.
pub struct GeoLocator {
    http: reqwest::Client,
    base_url: String,
    cache: Arc<GeoCache>,
}

impl GeoLocator {
    pub fn new(
        config: &GeoConfig,
        cache: Arc<GeoCache>,
    ) -> Result<Self, CapabilityError> {
        Ok(Self {
            http: http::client(config.timeout_secs)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            cache,
        })
    }

    pub fn cache(&self) -> &Arc<GeoCache> {
        &self.cache
    }

    /// Look up where `client_ip` is. Returns `None` on any failure.
    pub async fn lookup(&self, client_ip: Option<&str>) -> Option<GeoInfo> {
        let key = cache_key(client_ip);
        if let Some(payload) = self.cache.get(&key) {
            tracing::debug!(key = %key, "Geo cache hit");
            return Some(GeoInfo::from_payload(&payload));
        }

        match self.fetch(&key).await {
            Ok(payload) => {
                if is_error_payload(&payload) {
                    let reason = payload.get("reason").and_then(Value::as_str).unwrap_or("");
                    tracing::warn!(
                        key = %key,
                        reason = %reason,
                        "Geolocation provider returned an error"
                    );
                    return None;
                }
                let info = GeoInfo::from_payload(&payload);
                self.store_in_cache(key, payload).await;
                Some(info)
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Geolocation lookup failed");
                None
            }
        }
    }

    /// Cache writes hit the store, so they run off the async workers.
    async fn store_in_cache(&self, key: String, payload: Value) {
        let cache = Arc::clone(&self.cache);
        if let Err(e) = tokio::task::spawn_blocking(move || cache.insert(&key, payload)).await {
            tracing::warn!(error = %e, "Geo cache write task failed");
        }
    }

    fn lookup_url(&self, key: &str) -> String {
        if key == LOCAL_KEY {
            format!("{}/json/", self.base_url)
        } else {
            format!("{}/{}/json/", self.base_url, key)
        }
    }

    async fn fetch(&self, key: &str) -> Result<Value, CapabilityError> {
        let response = self
            .http
            .get(self.lookup_url(key))
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }
}

impl std::fmt::Debug for GeoLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoLocator")
            .field("base_url", &self.base_url)
            .field("cache", &self.cache)
            .finish()
    }
}

/// Cache key for a client address: the IP itself, or [`LOCAL_KEY`] when
/// absent, blank or loopback.
pub fn cache_key(client_ip: Option<&str>) -> String {
    match client_ip.map(str::trim).filter(|ip| !ip.is_empty()) {
        Some(ip) => match ip.parse::<IpAddr>() {
            Ok(addr) if addr.is_loopback() => LOCAL_KEY.to_string(),
            _ => ip.to_string(),
        },
        None => LOCAL_KEY.to_string(),
    }
}

fn is_error_payload(payload: &Value) -> bool {
    match payload.get("error") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(_) => true,
    }
}
