use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{MetadataError, Result, Violation, ViolationKind};
use crate::models::value::{MetadataValue, ValueType};
use crate::utils::coordinates::{coordinate_bounds, parse_coordinate};

/// Presentation style of a string attribute, as listed in the standards tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Style {
    Name,
    Url,
    Email,
    Number,
    Date,
    Time,
    DateTime,
    NetCode,
    NameList,
    ControlledVocabulary,
}

impl Style {
    pub fn as_str(&self) -> &'static str {
        match self {
            Style::Name => "name",
            Style::Url => "url",
            Style::Email => "email",
            Style::Number => "number",
            Style::Date => "date",
            Style::Time => "time",
            Style::DateTime => "date_time",
            Style::NetCode => "net_code",
            Style::NameList => "name_list",
            Style::ControlledVocabulary => "controlled_vocabulary",
        }
    }

    /// An empty style means `name`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "name" => Some(Style::Name),
            "url" => Some(Style::Url),
            "email" => Some(Style::Email),
            "number" => Some(Style::Number),
            "date" => Some(Style::Date),
            "time" => Some(Style::Time),
            "date_time" => Some(Style::DateTime),
            "net_code" => Some(Style::NetCode),
            "name_list" => Some(Style::NameList),
            "controlled_vocabulary" => Some(Style::ControlledVocabulary),
            _ => None,
        }
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Definition of one metadata field.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDescriptor {
    pub name: String,
    pub value_type: ValueType,
    pub units: Option<String>,
    pub required: bool,
    pub style: Style,
    pub allowed_values: Option<Vec<String>>,
    pub default: Option<MetadataValue>,
}

impl AttributeDescriptor {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            units: None,
            required: false,
            style: Style::Name,
            allowed_values: None,
            default: None,
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }

    pub fn with_style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }

    pub fn with_allowed_values(mut self, values: Vec<String>) -> Self {
        self.allowed_values = Some(values);
        self
    }

    pub fn with_default(mut self, default: MetadataValue) -> Self {
        self.default = Some(default);
        self
    }

    /// Same descriptor under `prefix.` (used when composing fragments).
    pub fn prefixed(&self, prefix: &str) -> Self {
        let mut descriptor = self.clone();
        if !prefix.is_empty() {
            descriptor.name = format!("{}.{}", prefix, self.name);
        }
        descriptor
    }

    pub fn is_closed(&self) -> bool {
        self.allowed_values.is_some()
    }

    /// Checks that a default, when present, has the declared type and vocabulary.
    pub fn check_consistency(&self) -> Result<()> {
        if let Some(default) = &self.default {
            if default.value_type() != Some(self.value_type) {
                return Err(MetadataError::InvalidFormat(format!(
                    "Default for '{}' is {}, expected {}",
                    self.name,
                    default.type_name(),
                    self.value_type
                )));
            }
            if let Some(violation) = self.check_value(default) {
                return Err(MetadataError::InvalidFormat(format!(
                    "Default for '{}' is invalid: {}",
                    self.name, violation
                )));
            }
        }
        Ok(())
    }

    /// Coerce a raw input value, producing a violation when it does not fit.
    pub fn coerce(&self, raw: &serde_json::Value) -> std::result::Result<MetadataValue, Violation> {
        match self.coerce_coordinate(raw).or_else(|| self.value_type.coerce(raw)) {
            Some(value) => match self.check_value(&value) {
                Some(violation) => Err(violation),
                None => Ok(value),
            },
            None => Err(Violation::new(
                self.name.clone(),
                ViolationKind::TypeMismatch {
                    expected: self.value_type.to_string(),
                    found: describe_raw(raw),
                },
            )),
        }
    }

    /// `DD:MM:SS` strings on latitude and longitude fields.
    fn coerce_coordinate(&self, raw: &serde_json::Value) -> Option<MetadataValue> {
        let text = raw.as_str().filter(|s| s.contains(':'))?;
        if self.value_type != ValueType::Float || coordinate_bounds(&self.name).is_none() {
            return None;
        }
        parse_coordinate(text)
            .ok()
            .filter(|f| f.is_finite())
            .map(MetadataValue::Float)
    }

    /// Vocabulary and range checks for an already typed value.
    pub fn check_value(&self, value: &MetadataValue) -> Option<Violation> {
        if let Some(allowed) = &self.allowed_values {
            let candidates: Vec<String> = match value {
                MetadataValue::StringList(items) => items.clone(),
                other => vec![other.to_string()],
            };
            if let Some(bad) = candidates.into_iter().find(|c| !allowed.contains(c)) {
                return Some(Violation::new(
                    self.name.clone(),
                    ViolationKind::DisallowedValue {
                        value: bad,
                        allowed: allowed.clone(),
                    },
                ));
            }
        }

        if let (Some((min, max)), Some(v)) = (coordinate_bounds(&self.name), value.as_f64()) {
            if v < min || v > max {
                return Some(Violation::new(
                    self.name.clone(),
                    ViolationKind::OutOfRange { value: v, min, max },
                ));
            }
        }

        None
    }
}

fn describe_raw(raw: &serde_json::Value) -> String {
    match raw {
        serde_json::Value::String(s) => format!("string '{}'", s),
        serde_json::Value::Number(n) => format!("number {}", n),
        serde_json::Value::Bool(b) => format!("boolean {}", b),
        other => crate::utils::flatten::json_kind(other).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn release_status() -> AttributeDescriptor {
        AttributeDescriptor::new("release_status", ValueType::String)
            .with_style(Style::ControlledVocabulary)
            .with_allowed_values(vec![
                "Unrestricted Release".to_string(),
                "Restricted Release".to_string(),
            ])
            .with_default(MetadataValue::from("Unrestricted Release"))
    }

    #[test]
    fn test_style_parse() {
        assert_eq!(Style::parse(""), Some(Style::Name));
        assert_eq!(Style::parse("Email"), Some(Style::Email));
        assert_eq!(Style::parse("fancy"), None);
    }

    #[test]
    fn test_controlled_vocabulary() {
        let descriptor = release_status();
        assert!(descriptor.coerce(&json!("Restricted Release")).is_ok());

        let violation = descriptor.coerce(&json!("Open")).unwrap_err();
        assert!(matches!(
            violation.kind,
            ViolationKind::DisallowedValue { ref value, .. } if value == "Open"
        ));
        assert!(descriptor.check_consistency().is_ok());
    }

    #[test]
    fn test_type_mismatch_violation() {
        let descriptor = AttributeDescriptor::new("sample_rate", ValueType::Float);
        let violation = descriptor.coerce(&json!("fast")).unwrap_err();
        assert_eq!(
            violation.kind,
            ViolationKind::TypeMismatch {
                expected: "float".to_string(),
                found: "string 'fast'".to_string()
            }
        );
    }

    #[test]
    fn test_coordinate_range() {
        let descriptor = AttributeDescriptor::new("location.latitude", ValueType::Float);
        assert!(descriptor.coerce(&json!(45.0)).is_ok());
        assert!(matches!(
            descriptor.coerce(&json!(91.0)).unwrap_err().kind,
            ViolationKind::OutOfRange { .. }
        ));
    }

    #[test]
    fn test_dms_only_on_coordinate_fields() {
        let latitude = AttributeDescriptor::new("location.latitude", ValueType::Float);
        match latitude.coerce(&json!("40:30:00")) {
            Ok(MetadataValue::Float(v)) => assert!((v - 40.5).abs() < 1e-9),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            latitude.coerce(&json!("95:00:00")).unwrap_err().kind,
            ViolationKind::OutOfRange { .. }
        ));

        let sample_rate = AttributeDescriptor::new("sample_rate", ValueType::Float);
        assert!(matches!(
            sample_rate.coerce(&json!("1:30:00")).unwrap_err().kind,
            ViolationKind::TypeMismatch { .. }
        ));
    }

    #[test]
    fn test_string_field_rejects_typed_json() {
        let descriptor = AttributeDescriptor::new("archive_id", ValueType::String);
        assert_eq!(
            descriptor.coerce(&json!(42)).unwrap_err().kind,
            ViolationKind::TypeMismatch {
                expected: "string".to_string(),
                found: "number 42".to_string()
            }
        );
    }

    #[test]
    fn test_inconsistent_default() {
        let descriptor = AttributeDescriptor::new("n_channels", ValueType::Integer)
            .with_default(MetadataValue::from("five"));
        assert!(descriptor.check_consistency().is_err());
    }

    #[test]
    fn test_prefixed() {
        let descriptor = AttributeDescriptor::new("latitude", ValueType::Float).prefixed("location");
        assert_eq!(descriptor.name, "location.latitude");
    }
}
