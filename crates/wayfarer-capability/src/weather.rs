//! Weather forecasts from Open-Meteo.
//!
//! A completion call pulls `{city, date}` out of the message; the date
//! phrase is resolved locally, the city is geocoded, and the daily forecast
//! for that one day is formatted as a single sentence.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use chrono::{Datelike, Days, NaiveDate, Utc, Weekday};
use regex::Regex;
use serde::Deserialize;
use wayfarer_core::config::WeatherConfig;
use wayfarer_core::{Message, RequestContext};
use wayfarer_form::parse_extraction;
use wayfarer_llm::CompletionService;

use crate::error::CapabilityError;
use crate::http::{self, format_number};
use crate::registry::Capability;

static IN_DAYS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^in (\d+) days?$").expect("valid relative-date regex"));
static WEEKDAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?:next|this|on|coming)\s+)?([a-z]+)$").expect("valid weekday regex")
});

const EXTRACTION_PROMPT: &str = "You are a weather assistant that helps users with forecasts. \
Extract the city and the date the user is asking about. Reply with JSON only, in the form \
{\"city\": \"<city name>\", \"date\": \"<date>\"}. The date may be YYYY-MM-DD or a phrase such as \
'today', 'tomorrow', 'in 3 days' or 'next Friday'. Use \"today\" when no date is mentioned and an \
empty string when no city is mentioned.";

const INVALID_DATE_REPLY: &str =
    "Please provide a valid date or phrase like 'tomorrow' or 'next Monday'.";
const MISSING_CITY_REPLY: &str = "Which city would you like the weather forecast for?";

pub struct WeatherCapability {
    llm: Arc<dyn CompletionService>,
    http: reqwest::Client,
    config: WeatherConfig,
}

impl WeatherCapability {
    pub fn new(
        llm: Arc<dyn CompletionService>,
        config: WeatherConfig,
    ) -> Result<Self, CapabilityError> {
        Ok(Self {
            llm,
            http: http::client(config.timeout_secs)?,
            config,
        })
    }

    async fn extract_request(&self, utterance: &str) -> Result<(String, String), CapabilityError> {
        let reply = self
            .llm
            .complete(EXTRACTION_PROMPT, &[Message::human(utterance)])
            .await?;
        let fields = parse_extraction(&reply).unwrap_or_default();
        let text = |key: &str| {
            fields
                .get(key)
                .and_then(|v| v.as_str())
                .map(|s| s.trim().to_string())
                .unwrap_or_default()
        };
        Ok((text("city"), text("date")))
    }

    async fn forecast(&self, city: &str, date: NaiveDate) -> Result<String, CapabilityError> {
        let places: GeocodingResponse = self
            .http
            .get(&self.config.geocoding_url)
            .query(&[("name", city), ("count", "1")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let Some(place) = places.results.and_then(|r| r.into_iter().next()) else {
            return Ok(format!("Could not find location for city '{}'.", city));
        };

        let date_str = date.format("%Y-%m-%d").to_string();
        let forecast: ForecastResponse = self
            .http
            .get(&self.config.forecast_url)
            .query(&[
                ("latitude", place.latitude.to_string()),
                ("longitude", place.longitude.to_string()),
                (
                    "daily",
                    "temperature_2m_max,temperature_2m_min,precipitation_probability_mean"
                        .to_string(),
                ),
                ("timezone", "auto".to_string()),
                ("start_date", date_str.clone()),
                ("end_date", date_str.clone()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(format_forecast(city, &date_str, forecast.daily.as_ref()))
    }
}

#[async_trait]
impl Capability for WeatherCapability {
    fn name(&self) -> &str {
        "weather"
    }

    fn description(&self) -> &str {
        "for weather forecasts or destinations"
    }

    async fn respond(
        &self,
        utterance: &str,
        context: &RequestContext,
    ) -> Result<String, CapabilityError> {
        let (city, date_phrase) = self.extract_request(utterance).await?;
        if city.is_empty() {
            return Ok(MISSING_CITY_REPLY.to_string());
        }

        let today = Utc::now().date_naive();
        let Some(date) = resolve_date(&date_phrase, today) else {
            tracing::debug!(request_id = %context.request_id, phrase = %date_phrase, "Unrecognised date phrase");
            return Ok(INVALID_DATE_REPLY.to_string());
        };

        tracing::info!(request_id = %context.request_id, city = %city, date = %date, "Fetching forecast");
        self.forecast(&city, date).await
    }
}

// =============================================================================
// Date phrases
// =============================================================================

/// Resolve a date phrase relative to `today`.
///
/// Understands `today`, `tomorrow`, `in N days`, weekday names (optionally
/// prefixed by `next`, `this`, `on` or `coming`, always the next such day
/// after today), ISO dates, and a few written-out formats.
pub fn resolve_date(phrase: &str, today: NaiveDate) -> Option<NaiveDate> {
    let phrase = phrase.trim().to_lowercase();
    match phrase.as_str() {
        "" | "today" | "now" | "tonight" => return Some(today),
        "tomorrow" => return today.checked_add_days(Days::new(1)),
        _ => {}
    }

    if let Some(caps) = IN_DAYS_RE.captures(&phrase) {
        let days: u64 = caps[1].parse().ok()?;
        return today.checked_add_days(Days::new(days));
    }

    if let Some(caps) = WEEKDAY_RE.captures(&phrase) {
        if let Ok(weekday) = caps[1].parse::<Weekday>() {
            return Some(next_weekday(today, weekday));
        }
    }

    const FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d %B %Y", "%B %d %Y", "%B %d, %Y", "%d/%m/%Y"];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&phrase, fmt).ok())
}

fn next_weekday(today: NaiveDate, weekday: Weekday) -> NaiveDate {
    let current = today.weekday().num_days_from_monday();
    let target = weekday.num_days_from_monday();
    let ahead = (target + 7 - current) % 7;
    let ahead = if ahead == 0 { 7 } else { ahead };
    today + chrono::Duration::days(i64::from(ahead))
}

// =============================================================================
// Open-Meteo wire types
// =============================================================================

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    results: Option<Vec<GeocodedPlace>>,
}

#[derive(Debug, Deserialize)]
struct GeocodedPlace {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    daily: Option<DailyForecast>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DailyForecast {
    temperature_2m_max: Vec<Option<f64>>,
    temperature_2m_min: Vec<Option<f64>>,
    precipitation_probability_mean: Vec<Option<f64>>,
}

fn format_forecast(city: &str, date: &str, daily: Option<&DailyForecast>) -> String {
    let first = |values: &[Option<f64>]| values.first().copied().flatten();
    let temps = daily.and_then(|d| {
        Some((first(&d.temperature_2m_min)?, first(&d.temperature_2m_max)?, d))
    });
    let Some((min, max, daily)) = temps else {
        return format!("No forecast data available for {} on {}.", city, date);
    };

    let mut message = format!(
        "Weather forecast for {} on {}: {}°C to {}°C",
        title_case(city),
        date,
        format_number(min),
        format_number(max)
    );
    match first(&daily.precipitation_probability_mean) {
        Some(rain) => message.push_str(&format!(", with a {}% chance of rain.", format_number(rain))),
        None => message.push('.'),
    }
    message
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
