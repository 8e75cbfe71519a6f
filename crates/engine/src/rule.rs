// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Alert rule validation and threshold comparison.

use thiserror::Error;

use pgvigil_core::{is_valid_rule_name, RuleConfig};

use crate::expr::{Expr, ExprError};

/// Comparison operator for a rule's thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
}

impl Operator {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            ">" => Some(Operator::Gt),
            "<" => Some(Operator::Lt),
            ">=" => Some(Operator::Ge),
            "<=" => Some(Operator::Le),
            "==" => Some(Operator::Eq),
            "!=" => Some(Operator::Ne),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Ge => ">=",
            Operator::Le => "<=",
            Operator::Eq => "==",
            Operator::Ne => "!=",
        }
    }

    /// Is `value <op> threshold` satisfied?
    pub fn compare(&self, value: f64, threshold: f64) -> bool {
        match self {
            Operator::Gt => value > threshold,
            Operator::Lt => value < threshold,
            Operator::Ge => value >= threshold,
            Operator::Le => value <= threshold,
            Operator::Eq => value == threshold,
            Operator::Ne => value != threshold,
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rule validation errors. A failing rule is skipped at load; it never
/// blocks the rest of the set.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("invalid rule name {0:?} (expected [a-z][a-z0-9_]*)")]
    InvalidName(String),

    #[error("unknown operator {0:?}")]
    UnknownOperator(String),

    #[error("operator {op} requires warning < critical (got warning={warning}, critical={critical})")]
    WarningNotBelowCritical { op: Operator, warning: f64, critical: f64 },

    #[error("operator {op} requires warning > critical (got warning={warning}, critical={critical})")]
    WarningNotAboveCritical { op: Operator, warning: f64, critical: f64 },

    // Warning/critical ordering for equality operators is undefined; reject
    // rather than infer.
    #[error("operator {0} has no defined warning/critical ordering")]
    UnsupportedOrdering(Operator),

    #[error("metric expression: {0}")]
    Expr(#[from] ExprError),
}

/// A validated rule with its parsed expression.
#[derive(Debug, Clone)]
pub struct AlertRule {
    pub name: String,
    pub metric: String,
    pub expr: Expr,
    pub operator: Operator,
    pub warning: f64,
    pub critical: f64,
    pub enabled: bool,
    pub message: Option<String>,
}

impl AlertRule {
    /// Validate a configured rule and parse its expression.
    pub fn from_config(config: &RuleConfig) -> Result<Self, RuleError> {
        if !is_valid_rule_name(&config.name) {
            return Err(RuleError::InvalidName(config.name.clone()));
        }

        let operator = Operator::parse(&config.operator)
            .ok_or_else(|| RuleError::UnknownOperator(config.operator.clone()))?;

        match operator {
            Operator::Gt | Operator::Ge => {
                if config.warning >= config.critical {
                    return Err(RuleError::WarningNotBelowCritical {
                        op: operator,
                        warning: config.warning,
                        critical: config.critical,
                    });
                }
            }
            Operator::Lt | Operator::Le => {
                if config.warning <= config.critical {
                    return Err(RuleError::WarningNotAboveCritical {
                        op: operator,
                        warning: config.warning,
                        critical: config.critical,
                    });
                }
            }
            Operator::Eq | Operator::Ne => {
                return Err(RuleError::UnsupportedOrdering(operator));
            }
        }

        let expr = Expr::parse(&config.metric)?;

        Ok(Self {
            name: config.name.clone(),
            metric: config.metric.clone(),
            expr,
            operator,
            warning: config.warning,
            critical: config.critical,
            enabled: config.enabled,
            message: config.message.clone(),
        })
    }
}

#[cfg(test)]
#[path = "rule_tests.rs"]
mod tests;
