//! Generic criteria evaluator shared by job and scheme offerings.
//!
//! Criteria map an attribute name to a literal (structural equality), an array (the
//! credential must equal one element), or an operator object such as
//! `{"$gte": 18, "$lt": 60}` whose operators must all hold.

mod value;


use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use value::{as_number, structurally_equal};

/// Flat attribute map supplied by an applicant.
pub type Credentials = Map<String, Value>;

/// Requirements attached to an offering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EligibilityCriteria(pub Map<String, Value>);

impl EligibilityCriteria {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl From<Map<String, Value>> for EligibilityCriteria {
    fn from(value: Map<String, Value>) -> Self {
        Self(value)
    }
}

/// Why an attribute passed or failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchReason {
    Match,
    CredentialMissing,
    /// A literal criterion did not equal the credential.
    DirectComparison,
    NotEqual,
    NotInOptions,
    ShouldNotEqual,
    NotGreaterThan,
    NotGreaterThanOrEqual,
    NotLessThan,
    NotLessThanOrEqual,
    NotInArray,
    ShouldNotBeInArray,
    InvalidOperand,
    UnknownOperator,
}

impl MatchReason {
    pub fn label(self) -> &'static str {
        match self {
            MatchReason::Match => "match",
            MatchReason::CredentialMissing => "credential_missing",
            MatchReason::DirectComparison => "direct_comparison",
            MatchReason::NotEqual => "not_equal",
            MatchReason::NotInOptions => "not_in_options",
            MatchReason::ShouldNotEqual => "should_not_equal",
            MatchReason::NotGreaterThan => "not_greater_than",
            MatchReason::NotGreaterThanOrEqual => "not_greater_than_or_equal",
            MatchReason::NotLessThan => "not_less_than",
            MatchReason::NotLessThanOrEqual => "not_less_than_or_equal",
            MatchReason::NotInArray => "not_in_array",
            MatchReason::ShouldNotBeInArray => "should_not_be_in_array",
            MatchReason::InvalidOperand => "invalid_operand",
            MatchReason::UnknownOperator => "unknown_operator",
        }
    }
}

/// Audit entry recorded for every criteria key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDetail {
    pub reason: MatchReason,
    pub expected: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provided: Option<Value>,
}

impl AttributeDetail {
    pub fn matched(&self) -> bool {
        self.reason == MatchReason::Match
    }
}

/// Outcome of [`evaluate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityReport {
    pub eligible: bool,
    pub details: BTreeMap<String, AttributeDetail>,
}

impl EligibilityReport {
    pub fn failures(&self) -> impl Iterator<Item = (&String, &AttributeDetail)> {
        self.details.iter().filter(|(_, detail)| !detail.matched())
    }
}

/// Operators recognised inside an operator object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Nin,
}

impl Operator {
    fn parse(key: &str) -> Option<Self> {
        Some(match key {
            "$eq" => Self::Eq,
            "$ne" => Self::Ne,
            "$gt" => Self::Gt,
            "$gte" => Self::Gte,
            "$lt" => Self::Lt,
            "$lte" => Self::Lte,
            "$in" => Self::In,
            "$nin" => Self::Nin,
            _ => return None,
        })
    }

    fn takes_list(self) -> bool {
        matches!(self, Self::In | Self::Nin)
    }

    fn check(self, provided: &Value, operand: &Value) -> Result<(), MatchReason> {
        match self {
            Self::Eq => ensure(structurally_equal(provided, operand), MatchReason::NotEqual),
            Self::Ne => ensure(
                !structurally_equal(provided, operand),
                MatchReason::ShouldNotEqual,
            ),
            Self::Gt => compare(provided, operand, |a, b| a > b, MatchReason::NotGreaterThan),
            Self::Gte => compare(
                provided,
                operand,
                |a, b| a >= b,
                MatchReason::NotGreaterThanOrEqual,
            ),
            Self::Lt => compare(provided, operand, |a, b| a < b, MatchReason::NotLessThan),
            Self::Lte => compare(
                provided,
                operand,
                |a, b| a <= b,
                MatchReason::NotLessThanOrEqual,
            ),
            Self::In => {
                let options = operand.as_array().ok_or(MatchReason::InvalidOperand)?;
                ensure(contains(options, provided), MatchReason::NotInArray)
            }
            Self::Nin => {
                let options = operand.as_array().ok_or(MatchReason::InvalidOperand)?;
                ensure(
                    !contains(options, provided),
                    MatchReason::ShouldNotBeInArray,
                )
            }
        }
    }
}

fn ensure(condition: bool, reason: MatchReason) -> Result<(), MatchReason> {
    if condition {
        Ok(())
    } else {
        Err(reason)
    }
}

fn compare(
    provided: &Value,
    operand: &Value,
    holds: impl Fn(f64, f64) -> bool,
    reason: MatchReason,
) -> Result<(), MatchReason> {
    match (as_number(provided), as_number(operand)) {
        (Some(a), Some(b)) if holds(a, b) => Ok(()),
        _ => Err(reason),
    }
}

fn contains(options: &[Value], provided: &Value) -> bool {
    options
        .iter()
        .any(|option| structurally_equal(option, provided))
}

enum Shape<'a> {
    Literal(&'a Value),
    OneOf(&'a [Value]),
    Operators(&'a Map<String, Value>),
}

fn shape(expected: &Value) -> Shape<'_> {
    match expected {
        Value::Array(options) => Shape::OneOf(options),
        Value::Object(map) if map.keys().any(|key| key.starts_with('$')) => {
            Shape::Operators(map)
        }
        other => Shape::Literal(other),
    }
}

fn check_attribute(expected: &Value, provided: &Value) -> MatchReason {
    let outcome = match shape(expected) {
        Shape::Literal(literal) => ensure(
            structurally_equal(literal, provided),
            MatchReason::DirectComparison,
        ),
        Shape::OneOf(options) => ensure(contains(options, provided), MatchReason::NotInOptions),
        Shape::Operators(operators) => operators.iter().try_for_each(|(key, operand)| {
            Operator::parse(key)
                .ok_or(MatchReason::UnknownOperator)?
                .check(provided, operand)
        }),
    };

    match outcome {
        Ok(()) => MatchReason::Match,
        Err(reason) => reason,
    }
}

/// Decide whether `credentials` satisfy every attribute in `criteria`.
///
/// Empty criteria are always satisfied. Unknown operators fail closed.
pub fn evaluate(criteria: &EligibilityCriteria, credentials: &Credentials) -> EligibilityReport {
    let mut details = BTreeMap::new();
    let mut eligible = true;

    for (attribute, expected) in criteria.iter() {
        let provided = credentials.get(attribute);
        let reason = match provided {
            None => MatchReason::CredentialMissing,
            Some(provided) => check_attribute(expected, provided),
        };

        eligible &= reason == MatchReason::Match;
        details.insert(
            attribute.clone(),
            AttributeDetail {
                reason,
                expected: expected.clone(),
                provided: provided.cloned(),
            },
        );
    }

    EligibilityReport { eligible, details }
}

/// Problems found while validating a criteria definition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CriteriaError {
    #[error("criterion '{attribute}' uses unknown operator '{operator}'")]
    UnknownOperator { attribute: String, operator: String },
    #[error("criterion '{attribute}' needs an array operand for '{operator}'")]
    ListOperandRequired { attribute: String, operator: String },
}

/// Reject criteria that [`evaluate`] could never satisfy because of a malformed operator.
pub fn validate_criteria(criteria: &EligibilityCriteria) -> Result<(), CriteriaError> {
    for (attribute, expected) in criteria.iter() {
        let Shape::Operators(operators) = shape(expected) else {
            continue;
        };

        for (key, operand) in operators {
            let operator = Operator::parse(key).ok_or_else(|| CriteriaError::UnknownOperator {
                attribute: attribute.clone(),
                operator: key.clone(),
            })?;
            if operator.takes_list() && !operand.is_array() {
                return Err(CriteriaError::ListOperandRequired {
                    attribute: attribute.clone(),
                    operator: key.clone(),
                });
            }
        }
    }
    Ok(())
}
