//! Record contracts: the declared shape of flow inputs and outputs.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::error::{Error, Result};
use crate::record::Record;

const MAX_FIELD_NAME_LEN: usize = 64;

/// Runtime kind a field value must have.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Free text; required text must be non-blank.
    String,
    /// A finite number. Numeric strings are accepted and normalised.
    Number,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::String => "string",
            Self::Number => "number",
        })
    }
}

/// Describes one named field of a record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    name: String,
    kind: FieldKind,
    description: String,
    #[serde(default = "default_required")]
    required: bool,
}

const fn default_required() -> bool {
    true
}

impl FieldSpec {
    /// Declares a required text field.
    #[must_use]
    pub fn string(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, FieldKind::String, description)
    }

    /// Declares a required numeric field.
    #[must_use]
    pub fn number(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Number, description)
    }

    /// Declares a required field of the supplied kind.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: FieldKind, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            description: description.into(),
            required: true,
        }
    }

    /// Marks the field as optional.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Field name, unique within a contract.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared value kind.
    #[must_use]
    pub const fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Intended meaning of the field, embedded into prompts.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Whether the field must be present.
    #[must_use]
    pub const fn is_required(&self) -> bool {
        self.required
    }

    /// Checks a single value against this spec.
    ///
    /// Returns `Ok(None)` when an optional field is absent or blank.
    fn check(&self, value: Option<&Value>) -> Result<Option<Value>> {
        let value = match value {
            None | Some(Value::Null) => return self.absent(),
            Some(value) => value,
        };

        match (self.kind, value) {
            (FieldKind::String, Value::String(text)) => {
                if text.trim().is_empty() {
                    return self.absent();
                }
                Ok(Some(value.clone()))
            }
            (FieldKind::Number, Value::Number(number)) => match number.as_f64() {
                Some(n) if n.is_finite() => Ok(Some(value.clone())),
                _ => Err(self.wrong_type("non-finite number")),
            },
            (FieldKind::Number, Value::String(text)) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    return self.absent();
                }
                trimmed
                    .parse::<f64>()
                    .ok()
                    .filter(|n| n.is_finite())
                    .and_then(Number::from_f64)
                    .map(|n| Some(Value::Number(n)))
                    .ok_or_else(|| self.wrong_type("non-numeric string"))
            }
            (_, other) => Err(self.wrong_type(value_kind(other))),
        }
    }

    fn absent(&self) -> Result<Option<Value>> {
        if self.required {
            Err(Error::MissingField {
                field: self.name.clone(),
            })
        } else {
            Ok(None)
        }
    }

    fn wrong_type(&self, found: &'static str) -> Error {
        Error::WrongType {
            field: self.name.clone(),
            expected: self.kind,
            found,
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Ordered set of uniquely named [`FieldSpec`]s.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    fields: Vec<FieldSpec>,
}

impl Contract {
    /// Starts building a contract.
    #[must_use]
    pub fn builder() -> ContractBuilder {
        ContractBuilder {
            fields: Vec::new(),
            names: BTreeSet::new(),
        }
    }

    /// Builds a contract from a list of specs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidContract`] on duplicate or malformed names, or
    /// when the list is empty.
    pub fn from_fields<I>(fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = FieldSpec>,
    {
        fields
            .into_iter()
            .try_fold(Self::builder(), ContractBuilder::field)?
            .build()
    }

    /// Field specs in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Looks up a field spec by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|spec| spec.name == name)
    }

    /// Returns `true` if the contract declares the named field.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Names of the fields that must be present, in declaration order.
    pub fn required_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|spec| spec.required)
            .map(FieldSpec::name)
    }

    /// Validates a record against this contract.
    ///
    /// Fields are checked in declaration order and the first violation is
    /// reported. Unknown fields are ignored and do not appear in the returned
    /// record, which therefore holds exactly the declared fields that were
    /// supplied. Values are returned unmodified, except that numeric strings
    /// in number fields are converted to JSON numbers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingField`] when a required field is absent or
    /// blank and [`Error::WrongType`] when a value has the wrong kind.
    pub fn validate(&self, record: &Record) -> Result<Record> {
        let mut validated = Record::new();
        for spec in &self.fields {
            if let Some(value) = spec.check(record.get(&spec.name))? {
                validated.insert(spec.name.clone(), value);
            }
        }
        Ok(validated)
    }
}

/// Builder for [`Contract`].
#[derive(Debug)]
pub struct ContractBuilder {
    fields: Vec<FieldSpec>,
    names: BTreeSet<String>,
}

impl ContractBuilder {
    /// Appends a field spec.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidContract`] if the name is empty, too long,
    /// contains whitespace, or was already declared.
    pub fn field(mut self, spec: FieldSpec) -> Result<Self> {
        let name = spec.name.as_str();
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(Error::InvalidContract {
                reason: format!("field name `{name}` must be non-empty without whitespace"),
            });
        }
        if name.len() > MAX_FIELD_NAME_LEN {
            return Err(Error::InvalidContract {
                reason: format!("field name length must be <= {MAX_FIELD_NAME_LEN}"),
            });
        }
        if !self.names.insert(name.to_owned()) {
            return Err(Error::InvalidContract {
                reason: format!("duplicate field `{name}`"),
            });
        }
        self.fields.push(spec);
        Ok(self)
    }

    /// Finalises the contract.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidContract`] if no fields were declared.
    pub fn build(self) -> Result<Contract> {
        if self.fields.is_empty() {
            return Err(Error::InvalidContract {
                reason: "contract must declare at least one field".into(),
            });
        }
        Ok(Contract {
            fields: self.fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn blend_output() -> Contract {
        Contract::from_fields([
            FieldSpec::string("optimizedBlend", "Recommended blend"),
            FieldSpec::number("predictedEnergySavings", "Savings in kWh"),
            FieldSpec::string("reasoning", "Why").optional(),
        ])
        .expect("contract")
    }

    #[test]
    fn valid_record_passes_unmodified() {
        let record = Record::new()
            .with("optimizedBlend", r#"{"limestone":70}"#)
            .with("predictedEnergySavings", 1200)
            .with("reasoning", "lower LSF");

        let validated = blend_output().validate(&record).expect("valid");
        assert_eq!(validated, record);
    }

    #[test]
    fn unknown_fields_are_dropped_not_rejected() {
        let record = Record::new()
            .with("optimizedBlend", "x")
            .with("predictedEnergySavings", 3)
            .with("confidence", "high");

        let validated = blend_output().validate(&record).expect("valid");
        assert!(!validated.contains("confidence"));
        assert_eq!(validated.len(), 2);
    }

    #[test]
    fn missing_required_field_is_named() {
        let record = Record::new().with("optimizedBlend", "x");
        let err = blend_output().validate(&record).expect_err("missing");
        assert!(matches!(err, Error::MissingField { ref field } if field == "predictedEnergySavings"));
        assert_eq!(err.field(), Some("predictedEnergySavings"));
    }

    #[test]
    fn blank_string_counts_as_missing() {
        let record = Record::new()
            .with("optimizedBlend", "   ")
            .with("predictedEnergySavings", 1);
        let err = blend_output().validate(&record).expect_err("blank");
        assert!(matches!(err, Error::MissingField { .. }));
    }

    #[test]
    fn numeric_strings_are_normalised() {
        let record = Record::new()
            .with("optimizedBlend", "x")
            .with("predictedEnergySavings", " 42.5 ");
        let validated = blend_output().validate(&record).expect("valid");
        assert_eq!(validated.get("predictedEnergySavings"), Some(&json!(42.5)));
    }

    #[test]
    fn wrong_kinds_are_rejected() {
        let record = Record::new()
            .with("optimizedBlend", json!({"limestone": 70}))
            .with("predictedEnergySavings", 1);
        let err = blend_output().validate(&record).expect_err("object");
        assert!(matches!(
            err,
            Error::WrongType { expected: FieldKind::String, found: "object", .. }
        ));

        let record = Record::new()
            .with("optimizedBlend", "x")
            .with("predictedEnergySavings", "lots");
        let err = blend_output().validate(&record).expect_err("text");
        assert!(matches!(err, Error::WrongType { expected: FieldKind::Number, .. }));
    }

    #[test]
    fn builder_rejects_duplicates_and_empty() {
        let err = Contract::from_fields([
            FieldSpec::string("summary", "a"),
            FieldSpec::string("summary", "b"),
        ])
        .expect_err("duplicate");
        assert!(matches!(err, Error::InvalidContract { .. }));

        assert!(Contract::builder().build().is_err());
        assert!(Contract::from_fields([FieldSpec::string("has space", "x")]).is_err());
    }

    #[test]
    fn required_fields_skip_optional() {
        let contract = blend_output();
        let names: Vec<_> = contract.required_fields().collect();
        assert_eq!(names, ["optimizedBlend", "predictedEnergySavings"]);
    }
}
