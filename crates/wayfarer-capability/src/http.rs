use std::time::Duration;

use crate::error::CapabilityError;

/// Outbound client with a per-request timeout.
pub(crate) fn client(timeout_secs: u64) -> Result<reqwest::Client, CapabilityError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| CapabilityError::Http(format!("failed to build HTTP client: {}", e)))
}

/// Render a float without a trailing `.0` when it is whole.
pub(crate) fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}
