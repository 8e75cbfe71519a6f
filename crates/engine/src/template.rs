// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message template rendering for externally-surfaced alerts.
//!
//! Placeholders: `{Name}`, `{Metric}`, `{Warning}`, `{Critical}`, `{State}`,
//! `{PrevState}`, `{Value}`, `{Threshold}`, `{ValueFmt}`, `{ThreshFmt}`.
//! `ValueFmt`/`ThreshFmt` are two-decimal-place forms. Placeholders that
//! don't match any field are left in place, so a malformed template degrades
//! to its raw text instead of failing.

use crate::state::StateChange;

pub fn render(template: &str, change: &StateChange) -> String {
    let substitutions: [(&str, String); 10] = [
        ("{Name}", change.rule_name.clone()),
        ("{Metric}", change.metric.clone()),
        ("{Warning}", change.warning.to_string()),
        ("{Critical}", change.critical.to_string()),
        ("{State}", change.new_state.as_str().to_string()),
        ("{PrevState}", change.prev_state.as_str().to_string()),
        ("{Value}", change.metric_value.to_string()),
        ("{Threshold}", change.threshold.to_string()),
        ("{ValueFmt}", format!("{:.2}", change.metric_value)),
        ("{ThreshFmt}", format!("{:.2}", change.threshold)),
    ];

    let mut rendered = template.to_string();
    for (placeholder, value) in substitutions {
        if rendered.contains(placeholder) {
            rendered = rendered.replace(placeholder, &value);
        }
    }
    rendered
}

#[cfg(test)]
#[path = "template_tests.rs"]
mod tests;
