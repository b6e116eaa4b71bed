//! Form schema: the ordered set of fields a booking collects.

use std::path::Path;

use serde_json::Value;

use crate::error::FormError;

/// Fields of the built-in booking form, in asking order.
const BUILTIN_FIELDS: &[&str] = &[
    "budget",
    "typeOfHoliday",
    "travelGroup",
    "availability",
    "destinationPreferences",
];

const DEFAULT_DATE_RANGE_FIELD: &str = "availability";
const DEFAULT_LIST_FIELD: &str = "destinationPreferences";

/// How a field's value is shaped and judged complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Any truthy value.
    Scalar,
    /// An object with `startDate` and `endDate`.
    DateRange,
    /// A non-empty list of strings.
    List,
}

/// Ordered enumeration of form fields, loaded once and read-only after.
///
/// The schema file is a JSON object whose keys are the field names; the
/// values are opaque. Which field is the date range and which is the list
/// is decided by name, everything else is a scalar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormSchema {
    fields: Vec<String>,
    date_range_field: String,
    list_field: String,
}

impl FormSchema {
    /// Create a schema from field names, using the default special fields.
    pub fn new<I, S>(fields: I) -> Result<Self, FormError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: Vec<String> = Vec::new();
        for field in fields {
            let field = field.into();
            if field.trim().is_empty() {
                return Err(FormError::Schema("field names must not be empty".into()));
            }
            if !names.contains(&field) {
                names.push(field);
            }
        }
        if names.is_empty() {
            return Err(FormError::Schema("schema defines no fields".into()));
        }
        Ok(Self {
            fields: names,
            date_range_field: DEFAULT_DATE_RANGE_FIELD.to_string(),
            list_field: DEFAULT_LIST_FIELD.to_string(),
        })
    }

    /// The booking form used when no schema file is configured.
    pub fn builtin() -> Self {
        Self {
            fields: BUILTIN_FIELDS.iter().map(|f| f.to_string()).collect(),
            date_range_field: DEFAULT_DATE_RANGE_FIELD.to_string(),
            list_field: DEFAULT_LIST_FIELD.to_string(),
        }
    }

    /// Override which fields carry the date-range and list shapes.
    pub fn with_special_fields(
        mut self,
        date_range_field: impl Into<String>,
        list_field: impl Into<String>,
    ) -> Self {
        self.date_range_field = date_range_field.into();
        self.list_field = list_field.into();
        self
    }

    /// Parse a schema from a JSON object, keeping key order.
    pub fn from_json_str(content: &str) -> Result<Self, FormError> {
        let value: Value = serde_json::from_str(content)
            .map_err(|e| FormError::Schema(format!("not valid JSON: {}", e)))?;
        match value {
            Value::Object(map) => Self::new(map.keys().cloned()),
            _ => Err(FormError::Schema("schema must be a JSON object".into())),
        }
    }

    /// Load a schema file from disk.
    pub fn load(path: &Path) -> Result<Self, FormError> {
        let content = std::fs::read_to_string(path)?;
        let schema = Self::from_json_str(&content)?;
        tracing::info!(
            path = %path.display(),
            fields = schema.fields.len(),
            "Form schema loaded"
        );
        Ok(schema)
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }

    pub fn date_range_field(&self) -> &str {
        &self.date_range_field
    }

    pub fn list_field(&self) -> &str {
        &self.list_field
    }

    /// Shape of a field. Names outside the schema are scalars.
    pub fn kind(&self, field: &str) -> FieldKind {
        if field == self.date_range_field {
            FieldKind::DateRange
        } else if field == self.list_field {
            FieldKind::List
        } else {
            FieldKind::Scalar
        }
    }

    /// Whether the schema includes its date-range field.
    pub fn has_date_range(&self) -> bool {
        self.contains(&self.date_range_field)
    }
}

impl Default for FormSchema {
    fn default() -> Self {
        Self::builtin()
    }
}
