//! The running set of collected booking values.
//!
//! Completeness and the list of completed field labels are always derived
//! from `fields`; nothing here caches a "done" state.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::schema::{FieldKind, FormSchema};

pub const START_DATE_KEY: &str = "startDate";
pub const END_DATE_KEY: &str = "endDate";

static CAMEL_WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(.)([A-Z][a-z]+)").expect("valid camel-case regex"));
static CAMEL_BOUNDARY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z0-9])([A-Z])").expect("valid camel-case regex"));

/// Structured booking values, keyed by schema field name.
///
/// Owned by the caller and threaded back in on every turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormRecord {
    fields: Map<String, Value>,
}

impl FormRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.fields
    }

    /// Merge freshly extracted values.
    ///
    /// - the date-range field is shallow-updated, so sub-keys missing from
    ///   the extraction survive;
    /// - the list field is replaced wholesale;
    /// - any other key is set only when the new value is truthy.
    ///
    /// A date-range or list value with the wrong JSON shape is ignored.
    pub fn merge(&mut self, extracted: &Map<String, Value>, schema: &FormSchema) {
        for (key, value) in extracted {
            match schema.kind(key) {
                FieldKind::DateRange => {
                    let Value::Object(update) = value else {
                        tracing::debug!(field = %key, "Ignoring non-object date range");
                        continue;
                    };
                    let slot = self
                        .fields
                        .entry(key.clone())
                        .or_insert_with(|| Value::Object(Map::new()));
                    if !slot.is_object() {
                        *slot = Value::Object(Map::new());
                    }
                    if let Value::Object(existing) = slot {
                        for (sub_key, sub_value) in update {
                            existing.insert(sub_key.clone(), sub_value.clone());
                        }
                    }
                }
                FieldKind::List => {
                    if value.is_array() {
                        self.fields.insert(key.clone(), value.clone());
                    } else {
                        tracing::debug!(field = %key, "Ignoring non-list value for list field");
                    }
                }
                FieldKind::Scalar => {
                    if is_truthy(value) {
                        self.fields.insert(key.clone(), value.clone());
                    }
                }
            }
        }
    }

    /// Whether every schema field holds a usable value.
    pub fn is_complete(&self, schema: &FormSchema) -> bool {
        schema.fields().iter().all(|field| match schema.kind(field) {
            FieldKind::Scalar => self.get(field).is_some_and(is_truthy),
            FieldKind::DateRange => self.date_range_part(field, START_DATE_KEY).is_some()
                && self.date_range_part(field, END_DATE_KEY).is_some(),
            FieldKind::List => matches!(self.get(field), Some(Value::Array(items)) if !items.is_empty()),
        })
    }

    /// Human-readable labels of the fields already collected.
    ///
    /// Scalar and list fields appear under their humanized names in schema
    /// order; the date range contributes "start date" and "end date"
    /// separately, after the others.
    pub fn completed_field_names(&self, schema: &FormSchema) -> Vec<String> {
        let mut names: Vec<String> = schema
            .fields()
            .iter()
            .filter(|field| schema.kind(field) != FieldKind::DateRange)
            .filter(|field| self.get(field).is_some_and(is_truthy))
            .map(|field| humanize_field_name(field))
            .collect();

        if schema.has_date_range() {
            let range = schema.date_range_field();
            for key in [START_DATE_KEY, END_DATE_KEY] {
                if self.date_range_part(range, key).is_some() {
                    names.push(humanize_field_name(key));
                }
            }
        }
        names
    }

    fn date_range_part(&self, field: &str, key: &str) -> Option<&Value> {
        self.get(field)
            .and_then(Value::as_object)
            .and_then(|range| range.get(key))
            .filter(|v| is_truthy(v))
    }
}

/// JSON truthiness: null, false, zero, empty strings and empty containers
/// are all falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// `typeOfHoliday` -> `type of holiday`.
pub fn humanize_field_name(field: &str) -> String {
    let spaced = CAMEL_WORD_RE.replace_all(field, "${1} ${2}");
    CAMEL_BOUNDARY_RE
        .replace_all(&spaced, "${1} ${2}")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> FormRecord {
        match value {
            Value::Object(map) => FormRecord::from_map(map),
            _ => panic!("test record must be an object"),
        }
    }

    fn extraction(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("extraction must be an object"),
        }
    }

    fn complete_record() -> FormRecord {
        record(json!({
            "budget": 3000,
            "typeOfHoliday": "beach",
            "travelGroup": "family",
            "availability": {"startDate": "2025-06-01", "endDate": "2025-06-15"},
            "destinationPreferences": ["Bali"]
        }))
    }

    // ---- Truthiness ----

    #[test]
    fn test_is_truthy() {
        assert!(!is_truthy(&Value::Null));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!(0.0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!([])));
        assert!(!is_truthy(&json!({})));
        assert!(is_truthy(&json!(true)));
        assert!(is_truthy(&json!(2500)));
        assert!(is_truthy(&json!("beach")));
        assert!(is_truthy(&json!(["Bali"])));
        assert!(is_truthy(&json!({"startDate": "2025-01-01"})));
    }

    // ---- Humanizing ----

    #[test]
    fn test_humanize_field_name() {
        assert_eq!(humanize_field_name("budget"), "budget");
        assert_eq!(humanize_field_name("typeOfHoliday"), "type of holiday");
        assert_eq!(humanize_field_name("travelGroup"), "travel group");
        assert_eq!(
            humanize_field_name("destinationPreferences"),
            "destination preferences"
        );
        assert_eq!(humanize_field_name("startDate"), "start date");
        assert_eq!(humanize_field_name("maxStops2Way"), "max stops2 way");
    }

    // ---- Merge ----

    #[test]
    fn test_merge_empty_extraction_is_noop() {
        let schema = FormSchema::builtin();
        let mut rec = record(json!({
            "budget": 1200,
            "availability": {"startDate": "2025-03-01"}
        }));
        let before = serde_json::to_string(&rec).unwrap();
        rec.merge(&Map::new(), &schema);
        assert_eq!(serde_json::to_string(&rec).unwrap(), before);
    }

    #[test]
    fn test_merge_date_range_preserves_existing_sub_keys() {
        let schema = FormSchema::builtin();
        let mut rec = record(json!({"availability": {"startDate": "2025-06-01"}}));
        rec.merge(
            &extraction(json!({"availability": {"endDate": "2025-06-15"}})),
            &schema,
        );
        assert_eq!(
            rec.get("availability").unwrap(),
            &json!({"startDate": "2025-06-01", "endDate": "2025-06-15"})
        );
    }

    #[test]
    fn test_merge_date_range_into_missing_field() {
        let schema = FormSchema::builtin();
        let mut rec = FormRecord::new();
        rec.merge(
            &extraction(json!({"availability": {"startDate": "2025-06-01"}})),
            &schema,
        );
        assert_eq!(
            rec.get("availability").unwrap(),
            &json!({"startDate": "2025-06-01"})
        );
    }

    #[test]
    fn test_merge_date_range_ignores_wrong_shape() {
        let schema = FormSchema::builtin();
        let mut rec = record(json!({"availability": {"startDate": "2025-06-01"}}));
        rec.merge(&extraction(json!({"availability": "next June"})), &schema);
        assert_eq!(
            rec.get("availability").unwrap(),
            &json!({"startDate": "2025-06-01"})
        );
    }

    #[test]
    fn test_merge_list_overwrites_entirely() {
        let schema = FormSchema::builtin();
        let mut rec = record(json!({"destinationPreferences": ["Bali", "Thailand"]}));
        rec.merge(
            &extraction(json!({"destinationPreferences": ["Japan"]})),
            &schema,
        );
        assert_eq!(rec.get("destinationPreferences").unwrap(), &json!(["Japan"]));

        rec.merge(&extraction(json!({"destinationPreferences": []})), &schema);
        assert_eq!(rec.get("destinationPreferences").unwrap(), &json!([]));
    }

    #[test]
    fn test_merge_scalar_never_overwritten_by_empty() {
        let schema = FormSchema::builtin();
        let mut rec = record(json!({"budget": 3000, "travelGroup": "couple"}));
        rec.merge(
            &extraction(json!({"budget": 0, "travelGroup": "", "typeOfHoliday": null})),
            &schema,
        );
        assert_eq!(rec.get("budget").unwrap(), &json!(3000));
        assert_eq!(rec.get("travelGroup").unwrap(), &json!("couple"));
        assert!(rec.get("typeOfHoliday").is_none());
    }

    #[test]
    fn test_merge_scalar_overwrites_with_truthy() {
        let schema = FormSchema::builtin();
        let mut rec = record(json!({"budget": 3000}));
        rec.merge(&extraction(json!({"budget": 4500})), &schema);
        assert_eq!(rec.get("budget").unwrap(), &json!(4500));
    }

    // ---- Completeness ----

    #[test]
    fn test_complete_record_is_complete() {
        assert!(complete_record().is_complete(&FormSchema::builtin()));
    }

    #[test]
    fn test_empty_destinations_is_incomplete() {
        let schema = FormSchema::builtin();
        let mut rec = complete_record();
        rec.merge(&extraction(json!({"destinationPreferences": []})), &schema);
        assert!(!rec.is_complete(&schema));
    }

    #[test]
    fn test_half_date_range_is_incomplete() {
        let schema = FormSchema::builtin();
        let mut map = complete_record().into_inner();
        map.insert("availability".into(), json!({"startDate": "2025-06-01"}));
        assert!(!FormRecord::from_map(map).is_complete(&schema));
    }

    #[test]
    fn test_missing_scalar_is_incomplete() {
        let schema = FormSchema::builtin();
        let mut map = complete_record().into_inner();
        map.insert("travelGroup".into(), json!(""));
        assert!(!FormRecord::from_map(map).is_complete(&schema));
    }

    #[test]
    fn test_unknown_schema_field_treated_as_scalar() {
        let schema = FormSchema::new([
            "budget",
            "typeOfHoliday",
            "travelGroup",
            "availability",
            "destinationPreferences",
            "dietaryNeeds",
        ])
        .unwrap();
        let mut rec = complete_record();
        assert!(!rec.is_complete(&schema));
        rec.merge(&extraction(json!({"dietaryNeeds": "vegetarian"})), &schema);
        assert!(rec.is_complete(&schema));
    }

    #[test]
    fn test_completeness_reevaluated_after_regression() {
        let schema = FormSchema::builtin();
        let mut rec = complete_record();
        assert!(rec.is_complete(&schema));
        rec.merge(&extraction(json!({"destinationPreferences": []})), &schema);
        assert!(!rec.is_complete(&schema));
        rec.merge(
            &extraction(json!({"destinationPreferences": ["Lisbon"]})),
            &schema,
        );
        assert!(rec.is_complete(&schema));
    }

    // ---- Completed field names ----

    #[test]
    fn test_completed_field_names_partial() {
        let schema = FormSchema::builtin();
        let rec = record(json!({
            "budget": 3000,
            "typeOfHoliday": "beach",
            "travelGroup": "",
            "availability": {},
            "destinationPreferences": []
        }));
        assert_eq!(
            rec.completed_field_names(&schema),
            vec!["budget", "type of holiday"]
        );
    }

    #[test]
    fn test_completed_field_names_full() {
        let names = complete_record().completed_field_names(&FormSchema::builtin());
        assert_eq!(
            names,
            vec![
                "budget",
                "type of holiday",
                "travel group",
                "destination preferences",
                "start date",
                "end date"
            ]
        );
    }

    #[test]
    fn test_completed_field_names_match_recomputation() {
        let schema = FormSchema::builtin();
        let mut rec = FormRecord::new();
        rec.merge(&extraction(json!({"budget": 900})), &schema);
        let first = rec.completed_field_names(&schema);
        assert_eq!(first, rec.completed_field_names(&schema));
        rec.merge(
            &extraction(json!({"availability": {"endDate": "2025-09-09"}})),
            &schema,
        );
        assert_eq!(rec.completed_field_names(&schema), vec!["budget", "end date"]);
    }

    #[test]
    fn test_record_serializes_as_plain_object() {
        let rec = record(json!({"budget": 10}));
        assert_eq!(serde_json::to_value(&rec).unwrap(), json!({"budget": 10}));
        let back: FormRecord = serde_json::from_value(json!({"travelGroup": "solo"})).unwrap();
        assert_eq!(back.get("travelGroup").unwrap(), &json!("solo"));
    }
}
