//! Per-turn form state machine: extract, merge, then ask or thank.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use wayfarer_core::Message;
use wayfarer_llm::CompletionService;

use crate::error::FormError;
use crate::prompts::{self, EXTRACTION_TRIGGER, THANK_TRIGGER};
use crate::record::FormRecord;
use crate::schema::FormSchema;

static JSON_OBJECT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("valid JSON object regex"));

/// Outcome of one form turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormTurn {
    pub response: String,
    #[serde(rename = "form")]
    pub record: FormRecord,
    pub completed_fields: Vec<String>,
    pub complete: bool,
}

/// Collects booking details over several turns.
///
/// Holds no per-user state: the caller owns the [`FormRecord`] and passes
/// it back in with every message.
#[derive(Clone)]
pub struct FormCollector {
    llm: Arc<dyn CompletionService>,
    schema: Arc<FormSchema>,
}

impl FormCollector {
    pub fn new(llm: Arc<dyn CompletionService>, schema: Arc<FormSchema>) -> Self {
        Self { llm, schema }
    }

    pub fn schema(&self) -> &FormSchema {
        &self.schema
    }

    /// Pull new values out of `message` and merge them into `record`.
    ///
    /// Never fails: a completion error or an unparseable reply leaves the
    /// record as it was.
    pub async fn extract(&self, message: &str, record: &mut FormRecord) {
        let system = prompts::extraction_prompt(&self.schema, message, record);
        let reply = match self
            .llm
            .complete(&system, &[Message::human(EXTRACTION_TRIGGER)])
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, "Form extraction call failed, keeping record");
                return;
            }
        };

        match parse_extraction(&reply) {
            Some(extracted) => {
                tracing::debug!(keys = extracted.len(), "Merging extracted form values");
                record.merge(&extracted, &self.schema);
            }
            None => tracing::debug!("No usable JSON in extraction reply"),
        }
    }

    /// Run one full turn for the latest human message.
    pub async fn turn(&self, message: &str, mut record: FormRecord) -> Result<FormTurn, FormError> {
        self.extract(message, &mut record).await;

        let completed_fields = record.completed_field_names(&self.schema);
        let complete = record.is_complete(&self.schema);

        let response = if complete {
            tracing::info!("Form complete, sending acknowledgment");
            let system = prompts::thank_prompt(&self.schema, &record);
            self.llm
                .complete(&system, &[Message::human(THANK_TRIGGER)])
                .await?
        } else {
            tracing::debug!(known = completed_fields.len(), "Form incomplete, asking next question");
            let system = prompts::ask_prompt(&self.schema, &completed_fields);
            self.llm.complete(&system, &[Message::human(message)]).await?
        };

        Ok(FormTurn {
            response,
            record,
            completed_fields,
            complete,
        })
    }
}

/// First `{...}` span of `reply` (greedy across lines), parsed as an object.
pub fn parse_extraction(reply: &str) -> Option<Map<String, Value>> {
    let span = JSON_OBJECT_RE.find(reply)?;
    match serde_json::from_str::<Value>(span.as_str()) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}
