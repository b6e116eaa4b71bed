//! Prompt construction for the three form phases.

use serde_json::Value;

use crate::record::{humanize_field_name, is_truthy, FormRecord, END_DATE_KEY, START_DATE_KEY};
use crate::schema::{FieldKind, FormSchema};

const ADVISOR_PERSONA: &str = "You are a friendly travel advisor having a casual conversation.";

const ADVISOR_GUIDANCE: &str = "IMPORTANT: You are NOT filling out a form. You're having a natural, \
friendly chat. Ask casual questions like you're talking to a friend. When they mention something \
relevant to any of these topics, just acknowledge it naturally and move on to the next topic.

Be conversational, warm, and genuinely interested. Ask one topic at a time. Don't be rigid or formal.
The user may give vague answers and you should interpret and decide on a reasonable value.";

/// Fixed human turn sent with the extraction prompt.
pub const EXTRACTION_TRIGGER: &str = "Extract the information.";
/// Fixed human turn sent with the thank-you prompt.
pub const THANK_TRIGGER: &str = "Generate the thank you message.";

fn topic_description(field: &str) -> String {
    match field {
        "budget" => "their budget for the trip (how much they want to spend)".to_string(),
        "typeOfHoliday" => {
            "type of holiday (adventure, beach, cultural, relaxation, etc.)".to_string()
        }
        "travelGroup" => "travel group (solo, couple, family, friends)".to_string(),
        "destinationPreferences" => {
            "destination preferences (where they'd like to go)".to_string()
        }
        other => humanize_field_name(other),
    }
}

fn extraction_rule(schema: &FormSchema, field: &str) -> String {
    match (field, schema.kind(field)) {
        (_, FieldKind::DateRange) => format!(
            "only if they mention specific dates, as {{\"{}\": \"YYYY-MM-DD\", \"{}\": \"YYYY-MM-DD\"}}",
            START_DATE_KEY, END_DATE_KEY
        ),
        (_, FieldKind::List) => "list of place names".to_string(),
        ("budget", _) => {
            "extract as NUMBER only (e.g., 2500 not \"2500\" or \"2.5k\")".to_string()
        }
        ("typeOfHoliday", _) => "beach, adventure, cultural, relaxation, etc".to_string(),
        ("travelGroup", _) => "solo, couple, family, friends, group".to_string(),
        (other, _) => format!("free text describing their {}", humanize_field_name(other)),
    }
}

/// System prompt asking for a minimal JSON object of newly found values.
pub fn extraction_prompt(schema: &FormSchema, message: &str, record: &FormRecord) -> String {
    let rules = schema
        .fields()
        .iter()
        .map(|field| format!("- {}: {}", field, extraction_rule(schema, field)))
        .collect::<Vec<_>>()
        .join("\n");
    let known = serde_json::to_string_pretty(record).unwrap_or_else(|_| "{}".to_string());

    format!(
        r#"Extract travel information from this user message.

User said: "{message}"

Already have: {known}

Rules:
{rules}

Return ONLY valid JSON. If no info found, return {{}}.

Examples:
{{"budget": 2500}}
{{"typeOfHoliday": "beach", "travelGroup": "family"}}
{{"destinationPreferences": ["Bali", "Thailand"]}}

JSON only:"#
    )
}

/// Advisor prompt for the next conversational question.
pub fn ask_prompt(schema: &FormSchema, completed: &[String]) -> String {
    let topics = schema
        .fields()
        .iter()
        .filter(|field| schema.kind(field) != FieldKind::DateRange)
        .enumerate()
        .map(|(i, field)| format!("{}. {}", i + 1, topic_description(field)))
        .collect::<Vec<_>>()
        .join("\n");

    let mut prompt = format!(
        "{ADVISOR_PERSONA}\n\nYour hidden goal is to naturally learn about:\n{topics}\n"
    );
    if schema.has_date_range() {
        prompt.push_str(
            "You also want to find out when they want to travel: a start date and an end date.\n",
        );
    }
    prompt.push('\n');
    prompt.push_str(ADVISOR_GUIDANCE);
    prompt.push_str("\n\nCurrent collected info will be provided. Ask about missing topics naturally.");

    if !completed.is_empty() {
        prompt.push_str(&format!("\n\nSo far I know: {}", completed.join(", ")));
    }
    prompt
}

/// Closing prompt embedding every collected value.
pub fn thank_prompt(schema: &FormSchema, record: &FormRecord) -> String {
    let mut lines = Vec::new();
    for field in schema.fields() {
        let label = capitalize(&humanize_field_name(field));
        let rendered = match (schema.kind(field), record.get(field)) {
            (FieldKind::DateRange, Some(Value::Object(range))) => format!(
                "{} to {}",
                range.get(START_DATE_KEY).map(render_value).unwrap_or_default(),
                range.get(END_DATE_KEY).map(render_value).unwrap_or_default()
            ),
            (_, Some(value)) if is_truthy(value) => render_value(value),
            _ => continue,
        };
        lines.push(format!("- {}: {}", label, rendered));
    }

    format!(
        "The user has provided all the information needed for their trip:\n{}\n\n\
         Write a warm, brief thank you message. Let them know you have everything you need \
         and will help them find the perfect trip. Keep it to 2-3 sentences.",
        lines.join("\n")
    )
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(render_value)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
