//! Payload schemas.
//!
//! Some pulse types have a declared payload shape. Checking it is opt-in:
//! the ledger admits any payload, and the gateway only validates when asked.

use serde_json::Value;

use crate::error::ValidationError;
use crate::pulse::PulseType;

/// JSON kind of a payload field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Number,
    Bool,
    Object,
    Array,
}

impl FieldKind {
    pub fn name(self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Number => "number",
            FieldKind::Bool => "boolean",
            FieldKind::Object => "object",
            FieldKind::Array => "array",
        }
    }

    pub fn matches(self, value: &Value) -> bool {
        match self {
            FieldKind::String => value.is_string(),
            FieldKind::Number => value.is_number(),
            FieldKind::Bool => value.is_boolean(),
            FieldKind::Object => value.is_object(),
            FieldKind::Array => value.is_array(),
        }
    }
}

/// One declared field.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

const fn field(name: &'static str, kind: FieldKind, required: bool) -> FieldSpec {
    FieldSpec { name, kind, required }
}

/// Declared payload shape for a pulse type.
#[derive(Debug, Clone, Copy)]
pub struct PayloadSchema {
    pub pulse_type: &'static str,
    pub fields: &'static [FieldSpec],
}

impl PayloadSchema {
    /// Check `payload` against this schema.
    ///
    /// A missing optional field is fine; `null` counts as missing.
    pub fn validate(&self, payload: &Value) -> Result<(), ValidationError> {
        let map = payload.as_object().ok_or(ValidationError::NotAnObject)?;

        for spec in self.fields {
            match map.get(spec.name).filter(|v| !v.is_null()) {
                None if spec.required => {
                    return Err(ValidationError::MissingField(spec.name.to_owned()));
                }
                None => {}
                Some(v) if !spec.kind.matches(v) => {
                    return Err(ValidationError::WrongKind {
                        field: spec.name.to_owned(),
                        expected: spec.kind.name(),
                    });
                }
                Some(_) => {}
            }
        }

        Ok(())
    }
}

static SCHEMAS: &[PayloadSchema] = &[
    PayloadSchema {
        pulse_type: "APP_REGISTER",
        fields: &[
            field("appDid", FieldKind::String, true),
            field("name", FieldKind::String, true),
            field("owner", FieldKind::String, true),
            field("capabilities", FieldKind::Array, true),
        ],
    },
    PayloadSchema {
        pulse_type: "CONTENT_STORE",
        fields: &[
            field("cid", FieldKind::String, true),
            field("type", FieldKind::String, false),
            field("size", FieldKind::Number, false),
        ],
    },
    PayloadSchema {
        pulse_type: "API_CALL",
        fields: &[
            field("api", FieldKind::String, true),
            field("app", FieldKind::String, false),
        ],
    },
];

/// The declared schema for a pulse type, if any.
pub fn schema_for(kind: &PulseType) -> Option<&'static PayloadSchema> {
    SCHEMAS.iter().find(|s| kind == s.pulse_type)
}

/// Validate a payload against the schema of its type. Types without a
/// declared schema always pass.
pub fn validate_payload(kind: &PulseType, payload: &Value) -> Result<(), ValidationError> {
    match schema_for(kind) {
        Some(schema) => schema.validate(payload),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_api_call() {
        let payload = json!({"api": "submitPulse", "app": "did:xhe:app:1", "operationsCount": 2});
        assert!(validate_payload(&PulseType::API_CALL, &payload).is_ok());
    }

    #[test]
    fn test_missing_required() {
        let err = validate_payload(&PulseType::CONTENT_STORE, &json!({"size": 3})).unwrap_err();
        assert_eq!(err, ValidationError::MissingField("cid".into()));
    }

    #[test]
    fn test_wrong_kind() {
        let err = validate_payload(&PulseType::CONTENT_STORE, &json!({"cid": "Qm", "size": "3"}))
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::WrongKind {
                field: "size".into(),
                expected: "number"
            }
        );
    }

    #[test]
    fn test_not_an_object() {
        let err = validate_payload(&PulseType::API_CALL, &json!([1, 2])).unwrap_err();
        assert_eq!(err, ValidationError::NotAnObject);
    }

    #[test]
    fn test_undeclared_type_passes() {
        assert!(validate_payload(&PulseType::new("CUSTOM"), &json!("anything")).is_ok());
    }
}
