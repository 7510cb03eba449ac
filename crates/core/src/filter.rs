//! Typed payload filters and per-collection schemas.
//!
//! A [`Filter`] is a conjunction of [`Condition`]s over payload fields.
//! Filters are checked against a [`CollectionSchema`] before they reach a
//! store, so a misspelled field or a wrongly typed operand is a validation
//! error instead of an empty result.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::ValidationError;
use crate::vector_store::Payload;

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    Gte,
    Lte,
    In,
}

/// One `field op value` test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

/// All conditions must hold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition {
            field: field.into(),
            op: FilterOp::Eq,
            value: value.into(),
        });
        self
    }

    pub fn gte(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition {
            field: field.into(),
            op: FilterOp::Gte,
            value: value.into(),
        });
        self
    }

    pub fn lte(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition {
            field: field.into(),
            op: FilterOp::Lte,
            value: value.into(),
        });
        self
    }

    pub fn any_of(mut self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.conditions.push(Condition {
            field: field.into(),
            op: FilterOp::In,
            value: Value::Array(values),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Evaluate against a payload. Missing fields never match.
    pub fn matches(&self, payload: &Payload) -> bool {
        self.conditions.iter().all(|c| c.matches(payload))
    }
}

impl Condition {
    fn matches(&self, payload: &Payload) -> bool {
        let Some(actual) = payload.get(&self.field) else {
            return false;
        };
        match self.op {
            FilterOp::Eq => actual == &self.value,
            FilterOp::Gte => compare(actual, &self.value).is_some_and(|o| o.is_ge()),
            FilterOp::Lte => compare(actual, &self.value).is_some_and(|o| o.is_le()),
            FilterOp::In => match &self.value {
                Value::Array(options) => options.contains(actual),
                _ => false,
            },
        }
    }
}

fn compare(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        // RFC 3339 timestamps compare correctly as strings
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Declared type of a payload field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Keyword,
    Integer,
    Float,
    Timestamp,
}

impl FieldType {
    fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::Keyword | Self::Timestamp => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Float => value.is_number(),
        }
    }

    fn ordered(&self) -> bool {
        !matches!(self, Self::Keyword)
    }
}

/// The filterable fields of a collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionSchema {
    pub fields: BTreeMap<String, FieldType>,
}

impl CollectionSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        self.fields.insert(name.into(), ty);
        self
    }

    /// Schema of the `values` collection.
    pub fn values() -> Self {
        Self::new()
            .field("axis", FieldType::Keyword)
            .field("cluster_id", FieldType::Keyword)
            .field("cluster_label", FieldType::Integer)
            .field("cluster_size", FieldType::Integer)
            .field("created_at", FieldType::Timestamp)
    }

    /// Schema of the `experiences_{axis}` collections.
    pub fn experiences() -> Self {
        Self::new()
            .field("domain", FieldType::Keyword)
            .field("strategy", FieldType::Keyword)
            .field("outcome_status", FieldType::Keyword)
            .field("confidence_tier", FieldType::Keyword)
            .field("confidence_weight", FieldType::Float)
            .field("created_at", FieldType::Timestamp)
    }

    /// Reject unknown fields and operands of the wrong type.
    pub fn validate(&self, filter: &Filter) -> std::result::Result<(), ValidationError> {
        for cond in &filter.conditions {
            let ty = self.fields.get(&cond.field).ok_or_else(|| {
                ValidationError::InvalidFilter(format!("unknown field '{}'", cond.field))
            })?;

            match cond.op {
                FilterOp::Eq => {
                    if !ty.accepts(&cond.value) {
                        return Err(type_error(cond, ty));
                    }
                }
                FilterOp::Gte | FilterOp::Lte => {
                    if !ty.ordered() {
                        return Err(ValidationError::InvalidFilter(format!(
                            "field '{}' does not support range comparison",
                            cond.field
                        )));
                    }
                    if !ty.accepts(&cond.value) {
                        return Err(type_error(cond, ty));
                    }
                }
                FilterOp::In => {
                    let Value::Array(options) = &cond.value else {
                        return Err(ValidationError::InvalidFilter(format!(
                            "'in' on field '{}' needs an array",
                            cond.field
                        )));
                    };
                    if let Some(bad) = options.iter().find(|v| !ty.accepts(v)) {
                        return Err(ValidationError::InvalidFilter(format!(
                            "field '{}' expects {:?}, got {}",
                            cond.field, ty, bad
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

fn type_error(cond: &Condition, ty: &FieldType) -> ValidationError {
    ValidationError::InvalidFilter(format!(
        "field '{}' expects {:?}, got {}",
        cond.field, ty, cond.value
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(v: Value) -> Payload {
        match v {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn eq_and_missing_field() {
        let p = payload(json!({"axis": "full", "cluster_size": 7}));
        assert!(Filter::new().eq("axis", "full").matches(&p));
        assert!(!Filter::new().eq("axis", "strategy").matches(&p));
        assert!(!Filter::new().eq("domain", "web").matches(&p));
    }

    #[test]
    fn range_and_in() {
        let p = payload(json!({"cluster_size": 7, "axis": "surprise"}));
        assert!(Filter::new().gte("cluster_size", 7).lte("cluster_size", 10).matches(&p));
        assert!(!Filter::new().gte("cluster_size", 8).matches(&p));
        assert!(
            Filter::new()
                .any_of("axis", vec![json!("full"), json!("surprise")])
                .matches(&p)
        );
    }

    #[test]
    fn empty_filter_matches_everything() {
        let p = payload(json!({}));
        assert!(Filter::new().matches(&p));
    }

    #[test]
    fn schema_rejects_unknown_field() {
        let err = CollectionSchema::values()
            .validate(&Filter::new().eq("axsi", "full"))
            .unwrap_err();
        assert!(err.to_string().contains("axsi"));
    }

    #[test]
    fn schema_rejects_wrong_type() {
        let schema = CollectionSchema::values();
        assert!(schema.validate(&Filter::new().eq("axis", 3)).is_err());
        assert!(schema.validate(&Filter::new().gte("axis", "a")).is_err());
        assert!(schema.validate(&Filter::new().gte("cluster_size", 5)).is_ok());
        assert!(schema.validate(&Filter::new().eq("axis", "full")).is_ok());
    }
}
