//! Currency conversion rates from exchangerate.host.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use wayfarer_core::config::{secret, ExchangeConfig};
use wayfarer_core::{Message, RequestContext};
use wayfarer_form::parse_extraction;
use wayfarer_llm::CompletionService;

use crate::error::CapabilityError;
use crate::geo::GeoLocator;
use crate::http::{self, format_number};
use crate::registry::Capability;

const MISSING_TARGET_REPLY: &str = "Which currency would you like to convert to?";

/// What the traveller wants converted.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionRequest {
    pub from: String,
    pub to: String,
    pub amount: Option<f64>,
}

pub struct ExchangeCapability {
    llm: Arc<dyn CompletionService>,
    http: reqwest::Client,
    config: ExchangeConfig,
    geo: Option<Arc<GeoLocator>>,
}

impl ExchangeCapability {
    pub fn new(
        llm: Arc<dyn CompletionService>,
        config: ExchangeConfig,
        geo: Option<Arc<GeoLocator>>,
    ) -> Result<Self, CapabilityError> {
        Ok(Self {
            llm,
            http: http::client(config.timeout_secs)?,
            config,
            geo,
        })
    }

    /// Currency of the caller's location, or the configured default.
    async fn local_currency(&self, context: &RequestContext) -> String {
        let detected = match &self.geo {
            Some(geo) => geo
                .lookup(context.client_ip.as_deref())
                .await
                .and_then(|info| info.currency)
                .filter(|c| !c.trim().is_empty()),
            None => None,
        };
        detected.unwrap_or_else(|| self.config.default_currency.clone())
    }

    async fn extract_request(
        &self,
        utterance: &str,
        local: &str,
    ) -> Result<Option<ConversionRequest>, CapabilityError> {
        let reply = self
            .llm
            .complete(&extraction_prompt(local), &[Message::human(utterance)])
            .await?;
        Ok(parse_extraction(&reply).and_then(|fields| {
            let code = |key: &str| {
                fields
                    .get(key)
                    .and_then(|v| v.as_str())
                    .map(|s| s.trim().to_uppercase())
                    .filter(|s| !s.is_empty())
            };
            Some(ConversionRequest {
                to: code("to")?,
                from: code("from").unwrap_or_else(|| local.to_string()),
                amount: fields.get("amount").and_then(|v| v.as_f64()),
            })
        }))
    }

    async fn fetch_rate(&self, request: &ConversionRequest) -> Result<f64, CapabilityError> {
        let mut query = vec![
            ("from", request.from.clone()),
            ("to", request.to.clone()),
            ("amount", format_number(request.amount.unwrap_or(1.0))),
        ];
        if let Some(key) = secret(&self.config.api_key_env) {
            query.push(("access_key", key));
        }

        let response: ConvertResponse = self
            .http
            .get(&self.config.base_url)
            .query(&query)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        response.rate()
    }
}

#[async_trait]
impl Capability for ExchangeCapability {
    fn name(&self) -> &str {
        "exchange"
    }

    fn description(&self) -> &str {
        "for currency or travel money queries"
    }

    async fn respond(
        &self,
        utterance: &str,
        context: &RequestContext,
    ) -> Result<String, CapabilityError> {
        let local = self.local_currency(context).await;
        let Some(request) = self.extract_request(utterance, &local).await? else {
            return Ok(MISSING_TARGET_REPLY.to_string());
        };

        tracing::info!(
            request_id = %context.request_id,
            from = %request.from,
            to = %request.to,
            "Fetching exchange rate"
        );
        let rate = self.fetch_rate(&request).await?;
        Ok(format_conversion(&request, rate))
    }
}

fn extraction_prompt(local: &str) -> String {
    format!(
        "You are an exchange rate assistant. The user's local currency is {local}; do not ask \
         them for it. Extract the currency conversion they want. Reply with JSON only, in the \
         form {{\"from\": \"<ISO code>\", \"to\": \"<ISO code>\", \"amount\": <number or null>}}. \
         Use {local} as \"from\" when the user names only a target currency."
    )
}

#[derive(Debug, Deserialize)]
struct ConvertResponse {
    #[serde(default)]
    info: Option<ConvertInfo>,
    #[serde(default)]
    result: Option<f64>,
    #[serde(default)]
    query: Option<ConvertQuery>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ConvertInfo {
    #[serde(default)]
    rate: Option<f64>,
    #[serde(default)]
    quote: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ConvertQuery {
    #[serde(default)]
    amount: Option<f64>,
}

impl ConvertResponse {
    fn rate(&self) -> Result<f64, CapabilityError> {
        if let Some(error) = &self.error {
            return Err(CapabilityError::Upstream(format!(
                "exchange service rejected the request: {}",
                error
            )));
        }
        let from_info = self.info.as_ref().and_then(|i| i.rate.or(i.quote));
        let from_result = match (self.result, self.query.as_ref().and_then(|q| q.amount)) {
            (Some(result), Some(amount)) if amount != 0.0 => Some(result / amount),
            _ => None,
        };
        from_info
            .or(from_result)
            .ok_or_else(|| CapabilityError::Upstream("exchange rate missing from response".into()))
    }
}

fn format_conversion(request: &ConversionRequest, rate: f64) -> String {
    let mut message = format!(
        "Exchange rate: 1 {} = {} {}.",
        request.from,
        format_number((rate * 10_000.0).round() / 10_000.0),
        request.to
    );
    if let Some(amount) = request.amount.filter(|a| *a != 1.0) {
        message.push_str(&format!(
            " {} {} is about {:.2} {}.",
            format_number(amount),
            request.from,
            amount * rate,
            request.to
        ));
    }
    message
}
