//! Record schema definition for web-log payloads.
//!
//! A [`RecordSchema`] is a named, versioned list of fields. Each field is a
//! string, optionally constrained by the `datetime` logical type, and is
//! either required or nullable. Nullable fields may be absent or `null`.
//! Keys not named by the schema are ignored.

use crate::timefmt;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use wa_common::SCHEMA_VERSION;

/// Declared type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    /// String holding a `YYYY-MM-DDTHH:MM:SSZ` datetime.
    DatetimeString,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::String => write!(f, "string"),
            FieldType::DatetimeString => write!(f, "string(datetime)"),
        }
    }
}

/// One field of the schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    pub name: String,
    pub field_type: FieldType,
    pub nullable: bool,
}

impl FieldSpec {
    pub fn required(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            nullable: false,
        }
    }

    pub fn optional(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            nullable: true,
        }
    }
}

/// Why a record does not conform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    NotAnObject { found: &'static str },
    Missing { field: String },
    Null { field: String },
    WrongType {
        field: String,
        expected: FieldType,
        found: &'static str,
    },
    BadDatetime { field: String, value: String },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::NotAnObject { found } => write!(f, "payload is {found}, not an object"),
            Violation::Missing { field } => write!(f, "{field}: required field missing"),
            Violation::Null { field } => write!(f, "{field}: required field is null"),
            Violation::WrongType {
                field,
                expected,
                found,
            } => write!(f, "{field}: expected {expected}, found {found}"),
            Violation::BadDatetime { field, value } => {
                write!(f, "{field}: {value:?} is not YYYY-MM-DDTHH:MM:SSZ")
            }
        }
    }
}

/// A versioned record schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordSchema {
    pub name: String,
    pub version: String,
    pub fields: Vec<FieldSpec>,
}

impl RecordSchema {
    /// The `WebLogs` schema accepted by the delivery pipeline.
    pub fn web_logs() -> Self {
        use FieldType as T;
        Self {
            name: "WebLogs".to_string(),
            version: SCHEMA_VERSION.to_string(),
            fields: vec![
                FieldSpec::required("userId", T::String),
                FieldSpec::required("sessionId", T::String),
                FieldSpec::optional("referrer", T::String),
                FieldSpec::optional("userAgent", T::String),
                FieldSpec::required("ip", T::String),
                FieldSpec::required("hostname", T::String),
                FieldSpec::optional("os", T::String),
                FieldSpec::required("timestamp", T::DatetimeString),
                FieldSpec::required("uri", T::String),
            ],
        }
    }

    /// Check `value` against every field. An empty result means valid.
    pub fn check(&self, value: &Value) -> Vec<Violation> {
        let Some(object) = value.as_object() else {
            return vec![Violation::NotAnObject {
                found: json_type(value),
            }];
        };

        let mut violations = Vec::new();
        for spec in &self.fields {
            match object.get(&spec.name) {
                None if spec.nullable => {}
                None => violations.push(Violation::Missing {
                    field: spec.name.clone(),
                }),
                Some(Value::Null) if spec.nullable => {}
                Some(Value::Null) => violations.push(Violation::Null {
                    field: spec.name.clone(),
                }),
                Some(Value::String(s)) => {
                    if spec.field_type == FieldType::DatetimeString
                        && timefmt::parse_fixed(s).is_none()
                    {
                        violations.push(Violation::BadDatetime {
                            field: spec.name.clone(),
                            value: s.clone(),
                        });
                    }
                }
                Some(other) => violations.push(Violation::WrongType {
                    field: spec.name.clone(),
                    expected: spec.field_type,
                    found: json_type(other),
                }),
            }
        }
        violations
    }

    pub fn is_valid(&self, value: &Value) -> bool {
        self.check(value).is_empty()
    }
}

impl Default for RecordSchema {
    fn default() -> Self {
        Self::web_logs()
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
