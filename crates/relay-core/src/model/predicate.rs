//! Node predicates.

use crate::value::{Feature, Features};

use super::ModelError;

/// Comparison performed by a simple predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimpleOperator {
    Equal,
    NotEqual,
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
    IsMissing,
    IsNotMissing,
}

impl SimpleOperator {
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "equal" => Self::Equal,
            "notEqual" => Self::NotEqual,
            "lessThan" => Self::LessThan,
            "lessOrEqual" => Self::LessOrEqual,
            "greaterThan" => Self::GreaterThan,
            "greaterOrEqual" => Self::GreaterOrEqual,
            "isMissing" => Self::IsMissing,
            "isNotMissing" => Self::IsNotMissing,
            _ => return None,
        })
    }

    /// Whether the operator compares against a `value` attribute.
    pub fn takes_value(self) -> bool {
        !matches!(self, Self::IsMissing | Self::IsNotMissing)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOperator {
    IsIn,
    IsNotIn,
}

impl SetOperator {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "isIn" => Some(Self::IsIn),
            "isNotIn" => Some(Self::IsNotIn),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanOperator {
    And,
    Or,
    Xor,
    /// First sub-predicate that can be evaluated decides.
    Surrogate,
}

impl BooleanOperator {
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "and" => Self::And,
            "or" => Self::Or,
            "xor" => Self::Xor,
            "surrogate" => Self::Surrogate,
            _ => return None,
        })
    }
}

/// Condition guarding a tree node.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    True,
    False,
    Simple {
        field: String,
        operator: SimpleOperator,
        value: Option<String>,
    },
    Set {
        field: String,
        operator: SetOperator,
        values: Vec<String>,
    },
    Compound {
        operator: BooleanOperator,
        predicates: Vec<Predicate>,
    },
}

impl Predicate {
    pub fn evaluate(&self, features: &Features) -> Result<bool, ModelError> {
        match self {
            Predicate::True => Ok(true),
            Predicate::False => Ok(false),
            Predicate::Simple {
                field,
                operator,
                value,
            } => simple(features, field, *operator, value.as_deref()),
            Predicate::Set {
                field,
                operator,
                values,
            } => {
                let feature = features
                    .get(field)
                    .ok_or_else(|| ModelError::MissingFeature(field.clone()))?;
                let found = values.iter().any(|v| equals(feature, v));
                Ok(match operator {
                    SetOperator::IsIn => found,
                    SetOperator::IsNotIn => !found,
                })
            }
            Predicate::Compound {
                operator,
                predicates,
            } => compound(features, *operator, predicates),
        }
    }
}

fn simple(
    features: &Features,
    field: &str,
    operator: SimpleOperator,
    value: Option<&str>,
) -> Result<bool, ModelError> {
    let feature = features.get(field);
    let value = value.unwrap_or_default();

    match operator {
        SimpleOperator::IsMissing => Ok(feature.is_none()),
        SimpleOperator::IsNotMissing => Ok(feature.is_some()),
        SimpleOperator::Equal => Ok(equals(present(field, feature)?, value)),
        SimpleOperator::NotEqual => Ok(!equals(present(field, feature)?, value)),
        SimpleOperator::LessThan => compare(field, feature, value, |lhs, rhs| lhs < rhs),
        SimpleOperator::LessOrEqual => compare(field, feature, value, |lhs, rhs| lhs <= rhs),
        SimpleOperator::GreaterThan => compare(field, feature, value, |lhs, rhs| lhs > rhs),
        SimpleOperator::GreaterOrEqual => compare(field, feature, value, |lhs, rhs| lhs >= rhs),
    }
}

fn present<'a>(field: &str, feature: Option<&'a Feature>) -> Result<&'a Feature, ModelError> {
    feature.ok_or_else(|| ModelError::MissingFeature(field.to_string()))
}

/// Numeric comparison of a feature against a predicate's literal value.
fn compare(
    field: &str,
    feature: Option<&Feature>,
    value: &str,
    test: fn(f64, f64) -> bool,
) -> Result<bool, ModelError> {
    let lhs = numeric(field, present(field, feature)?)?;
    let rhs = value
        .trim()
        .parse::<f64>()
        .map_err(|_| ModelError::NotNumeric {
            field: field.to_string(),
            value: value.to_string(),
        })?;
    Ok(test(lhs, rhs))
}

fn compound(
    features: &Features,
    operator: BooleanOperator,
    predicates: &[Predicate],
) -> Result<bool, ModelError> {
    match operator {
        BooleanOperator::And => {
            for p in predicates {
                if !p.evaluate(features)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        BooleanOperator::Or => {
            for p in predicates {
                if p.evaluate(features)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        BooleanOperator::Xor => {
            let mut result = false;
            for p in predicates {
                result ^= p.evaluate(features)?;
            }
            Ok(result)
        }
        BooleanOperator::Surrogate => {
            let mut last = Ok(false);
            for p in predicates {
                last = p.evaluate(features);
                if !matches!(last, Err(ModelError::MissingFeature(_))) {
                    return last;
                }
            }
            last
        }
    }
}

fn equals(feature: &Feature, value: &str) -> bool {
    match feature {
        Feature::Number(n) => value.trim().parse::<f64>().is_ok_and(|v| v == *n),
        Feature::Text(s) => s == value,
    }
}

fn numeric(field: &str, feature: &Feature) -> Result<f64, ModelError> {
    match feature {
        Feature::Number(n) => Ok(*n),
        Feature::Text(s) => s.trim().parse::<f64>().map_err(|_| ModelError::NotNumeric {
            field: field.to_string(),
            value: s.clone(),
        }),
    }
}
