//! Flight offers from the Amadeus self-service API.
//!
//! When the message names a complete itinerary and credentials are
//! configured, live offers are searched and summarised. Otherwise the
//! completion service answers as a flight advisor, using the caller's
//! geolocated home as context.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use wayfarer_core::config::{secret, FlightConfig};
use wayfarer_core::{Message, RequestContext};
use wayfarer_form::parse_extraction;
use wayfarer_llm::CompletionService;

use crate::error::CapabilityError;
use crate::geo::{GeoInfo, GeoLocator};
use crate::http;
use crate::registry::Capability;

/// Parameters for an offer search.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightQuery {
    pub origin: String,
    pub destination: String,
    pub departure_date: String,
    pub return_date: Option<String>,
    pub adults: u32,
}

#[derive(Debug, Clone)]
struct Credentials {
    client_id: String,
    client_secret: String,
}

pub struct FlightCapability {
    llm: Arc<dyn CompletionService>,
    http: reqwest::Client,
    config: FlightConfig,
    geo: Option<Arc<GeoLocator>>,
}

impl FlightCapability {
    pub fn new(
        llm: Arc<dyn CompletionService>,
        config: FlightConfig,
        geo: Option<Arc<GeoLocator>>,
    ) -> Result<Self, CapabilityError> {
        Ok(Self {
            llm,
            http: http::client(config.timeout_secs)?,
            config,
            geo,
        })
    }

    fn credentials(&self) -> Option<Credentials> {
        Some(Credentials {
            client_id: secret(&self.config.api_key_env)?,
            client_secret: secret(&self.config.api_secret_env)?,
        })
    }

    async fn extract_query(
        &self,
        utterance: &str,
        home: &GeoInfo,
    ) -> Result<Option<FlightQuery>, CapabilityError> {
        let reply = self
            .llm
            .complete(&extraction_prompt(home), &[Message::human(utterance)])
            .await?;
        Ok(parse_extraction(&reply).and_then(|fields| query_from_fields(&fields)))
    }

    async fn advise(&self, utterance: &str, home: &GeoInfo) -> Result<String, CapabilityError> {
        Ok(self
            .llm
            .complete(&advisor_prompt(home), &[Message::human(utterance)])
            .await?)
    }

    async fn access_token(&self, credentials: &Credentials) -> Result<String, CapabilityError> {
        let response = self
            .http
            .post(format!("{}/v1/security/oauth2/token", self.base_url()))
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.client_secret.as_str()),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(CapabilityError::Upstream(
                "could not authenticate with flight service".into(),
            ));
        }
        let token: TokenResponse = response.json().await?;
        token
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| CapabilityError::Upstream("no access token from flight service".into()))
    }

    async fn search(
        &self,
        query: &FlightQuery,
        credentials: &Credentials,
    ) -> Result<String, CapabilityError> {
        let token = self.access_token(credentials).await?;

        let mut params = vec![
            ("originLocationCode", query.origin.clone()),
            ("destinationLocationCode", query.destination.clone()),
            ("departureDate", query.departure_date.clone()),
            ("adults", query.adults.to_string()),
            ("max", self.config.max_results.to_string()),
        ];
        if let Some(return_date) = &query.return_date {
            params.push(("returnDate", return_date.clone()));
        }

        let response = self
            .http
            .get(format!("{}/v2/shopping/flight-offers", self.base_url()))
            .bearer_auth(token)
            .query(&params)
            .send()
            .await?;
        if !response.status().is_success() {
            tracing::warn!(status = response.status().as_u16(), "Flight search rejected");
            return Ok(format!(
                "Could not search flights from {} to {}. Check airport codes and dates.",
                query.origin, query.destination
            ));
        }

        let offers: OffersResponse = response.json().await?;
        Ok(summarize_offers(query, &offers.data, self.config.max_results))
    }

    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }
}

#[async_trait]
impl Capability for FlightCapability {
    fn name(&self) -> &str {
        "flight"
    }

    fn description(&self) -> &str {
        "for flight searches, airfares and flight offers"
    }

    async fn respond(
        &self,
        utterance: &str,
        context: &RequestContext,
    ) -> Result<String, CapabilityError> {
        let home = match &self.geo {
            Some(geo) => geo
                .lookup(context.client_ip.as_deref())
                .await
                .unwrap_or_default(),
            None => GeoInfo::default(),
        };

        let query = self.extract_query(utterance, &home).await?;
        match (query, self.credentials()) {
            (Some(query), Some(credentials)) => {
                tracing::info!(
                    request_id = %context.request_id,
                    origin = %query.origin,
                    destination = %query.destination,
                    date = %query.departure_date,
                    "Searching flight offers"
                );
                self.search(&query, &credentials).await
            }
            (query, credentials) => {
                tracing::debug!(
                    request_id = %context.request_id,
                    has_query = query.is_some(),
                    has_credentials = credentials.is_some(),
                    "Answering flight request without a live search"
                );
                self.advise(utterance, &home).await
            }
        }
    }
}

fn home_hint(home: &GeoInfo) -> String {
    let place = home.place();
    if place.is_empty() {
        "unknown".to_string()
    } else {
        place
    }
}

fn extraction_prompt(home: &GeoInfo) -> String {
    format!(
        "You extract flight search parameters. Assume the user's home location is {}. \
         Assume 1 adult passenger and a one-way trip unless stated otherwise. Use 3-letter IATA \
         codes (e.g., NYC, LAX, LHR) and YYYY-MM-DD dates. Reply with JSON only, in the form \
         {{\"origin\": \"\", \"destination\": \"\", \"departureDate\": \"\", \"returnDate\": null, \
         \"adults\": 1}}. Leave a value empty when the user has not given enough to decide it.",
        home_hint(home)
    )
}

fn advisor_prompt(home: &GeoInfo) -> String {
    format!(
        "You are a flight assistant that helps users find flight offers. Understand the user's \
         request to extract origin, destination, and travel dates. Assume the user's home \
         location is based on their geolocation: {}. Assume 1 adult passenger and one-way trips \
         unless stated otherwise. Use 3-letter IATA airport codes (e.g., NYC, LAX, LHR). \
         Provide helpful responses about flight options.",
        home_hint(home)
    )
}

fn is_iata(code: &str) -> bool {
    code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase())
}

fn is_iso_date(date: &str) -> bool {
    chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").is_ok()
}

/// A complete query, or `None` when anything required is missing or
/// malformed.
fn query_from_fields(fields: &serde_json::Map<String, serde_json::Value>) -> Option<FlightQuery> {
    let text = |key: &str| {
        fields
            .get(key)
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };

    let origin = text("origin")?.to_uppercase();
    let destination = text("destination")?.to_uppercase();
    let departure_date = text("departureDate")?;
    if !is_iata(&origin) || !is_iata(&destination) || !is_iso_date(&departure_date) {
        return None;
    }

    Some(FlightQuery {
        origin,
        destination,
        departure_date,
        return_date: text("returnDate").filter(|d| is_iso_date(d)),
        adults: fields
            .get("adults")
            .and_then(|v| v.as_u64())
            .and_then(|n| u32::try_from(n).ok())
            .filter(|n| *n > 0)
            .unwrap_or(1),
    })
}

// =============================================================================
// Amadeus wire types
// =============================================================================

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OffersResponse {
    #[serde(default)]
    data: Vec<Offer>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Offer {
    price: Price,
    itineraries: Vec<Itinerary>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Price {
    total: Option<String>,
    currency: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Itinerary {
    duration: Option<String>,
    segments: Vec<Segment>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Segment {
    carrier_code: Option<String>,
    number: Option<String>,
    departure: Endpoint,
    arrival: Endpoint,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Endpoint {
    iata_code: Option<String>,
    at: Option<String>,
}

fn summarize_offers(query: &FlightQuery, offers: &[Offer], max_results: usize) -> String {
    if offers.is_empty() {
        return format!(
            "No flights found from {} to {} on {}.",
            query.origin, query.destination, query.departure_date
        );
    }

    let shown = &offers[..offers.len().min(max_results.max(1))];
    let field = |v: &Option<String>| v.clone().unwrap_or_else(|| "?".to_string());

    let mut lines = vec![format!(
        "Found {} offer(s) for {}->{} on {}:",
        shown.len(),
        query.origin,
        query.destination,
        query.departure_date
    )];
    for (idx, offer) in shown.iter().enumerate() {
        lines.push(format!(
            "\nOption {}: {} {}",
            idx + 1,
            field(&offer.price.currency),
            field(&offer.price.total)
        ));
        for (itin_idx, itinerary) in offer.itineraries.iter().enumerate() {
            lines.push(format!(
                "  Itinerary {} (Duration: {}):",
                itin_idx + 1,
                field(&itinerary.duration)
            ));
            for (seg_idx, seg) in itinerary.segments.iter().enumerate() {
                lines.push(format!(
                    "    Segment {}: {}{} {}->{} Depart: {} Arrive: {}",
                    seg_idx + 1,
                    field(&seg.carrier_code),
                    field(&seg.number),
                    field(&seg.departure.iata_code),
                    field(&seg.arrival.iata_code),
                    field(&seg.departure.at),
                    field(&seg.arrival.at)
                ));
            }
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wayfarer_llm::ScriptedCompletion;

    fn fields(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        value.as_object().cloned().unwrap()
    }

    fn query() -> FlightQuery {
        FlightQuery {
            origin: "LIS".into(),
            destination: "JFK".into(),
            departure_date: "2025-07-01".into(),
            return_date: None,
            adults: 1,
        }
    }

    fn offline_config() -> FlightConfig {
        FlightConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            api_key_env: "WAYFARER_TEST_AMADEUS_KEY_UNSET".to_string(),
            api_secret_env: "WAYFARER_TEST_AMADEUS_SECRET_UNSET".to_string(),
            timeout_secs: 1,
            ..FlightConfig::default()
        }
    }

    // ---- Query extraction ----

    #[test]
    fn test_query_from_complete_fields() {
        let q = query_from_fields(&fields(json!({
            "origin": "lis",
            "destination": "JFK",
            "departureDate": "2025-07-01",
            "returnDate": "2025-07-10",
            "adults": 2
        })))
        .unwrap();
        assert_eq!(q.origin, "LIS");
        assert_eq!(q.return_date.as_deref(), Some("2025-07-10"));
        assert_eq!(q.adults, 2);
    }

    #[test]
    fn test_query_defaults_and_rejections() {
        let q = query_from_fields(&fields(json!({
            "origin": "LIS", "destination": "JFK", "departureDate": "2025-07-01",
            "returnDate": "soon", "adults": 0
        })))
        .unwrap();
        assert_eq!(q.adults, 1);
        assert!(q.return_date.is_none());

        assert!(query_from_fields(&fields(json!({"origin": "LIS", "destination": "JFK"}))).is_none());
        assert!(query_from_fields(&fields(json!({
            "origin": "Lisbon", "destination": "JFK", "departureDate": "2025-07-01"
        })))
        .is_none());
        assert!(query_from_fields(&fields(json!({
            "origin": "LIS", "destination": "JFK", "departureDate": "next week"
        })))
        .is_none());
    }

    // ---- Summaries ----

    #[test]
    fn test_summarize_offers() {
        let raw = json!({
            "data": [{
                "price": {"total": "412.30", "currency": "EUR"},
                "itineraries": [{
                    "duration": "PT8H5M",
                    "segments": [{
                        "carrierCode": "TP",
                        "number": "201",
                        "departure": {"iataCode": "LIS", "at": "2025-07-01T10:00:00"},
                        "arrival": {"iataCode": "JFK", "at": "2025-07-01T13:05:00"}
                    }]
                }]
            }]
        });
        let parsed: OffersResponse = serde_json::from_value(raw).unwrap();
        let summary = summarize_offers(&query(), &parsed.data, 5);
        assert_eq!(
            summary,
            "Found 1 offer(s) for LIS->JFK on 2025-07-01:\n\
             \nOption 1: EUR 412.30\n\
             \x20 Itinerary 1 (Duration: PT8H5M):\n\
             \x20   Segment 1: TP201 LIS->JFK Depart: 2025-07-01T10:00:00 Arrive: 2025-07-01T13:05:00"
        );
    }

    #[test]
    fn test_summarize_respects_max_results() {
        let offers: Vec<Offer> = (0..4).map(|_| Offer::default()).collect();
        let summary = summarize_offers(&query(), &offers, 2);
        assert!(summary.starts_with("Found 2 offer(s)"));
        assert!(summary.contains("Option 2"));
        assert!(!summary.contains("Option 3"));
    }

    #[test]
    fn test_summarize_no_offers() {
        assert_eq!(
            summarize_offers(&query(), &[], 5),
            "No flights found from LIS to JFK on 2025-07-01."
        );
    }

    // ---- Capability ----

    #[tokio::test]
    async fn test_without_credentials_falls_back_to_advice() {
        let llm = Arc::new(ScriptedCompletion::new([
            r#"{"origin": "LIS", "destination": "JFK", "departureDate": "2025-07-01"}"#,
            "Direct flights from Lisbon to New York usually leave in the morning.",
        ]));
        let flight = FlightCapability::new(llm.clone(), offline_config(), None).unwrap();
        let reply = flight
            .respond("Flights Lisbon to NYC on July 1st", &RequestContext::default())
            .await
            .unwrap();
        assert_eq!(
            reply,
            "Direct flights from Lisbon to New York usually leave in the morning."
        );

        let calls = llm.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[1].system.starts_with("You are a flight assistant"));
        assert!(calls[1].system.contains("geolocation: unknown"));
    }

    #[test]
    fn test_advisor_prompt_includes_home() {
        let home = GeoInfo {
            city: Some("Porto".into()),
            country_name: Some("Portugal".into()),
            ..GeoInfo::default()
        };
        assert!(advisor_prompt(&home).contains("geolocation: Porto, Portugal."));
        assert!(extraction_prompt(&home).contains("home location is Porto, Portugal."));
    }
}
