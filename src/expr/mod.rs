//! Channel expressions
//!
//! Expressions reference channel values with EPICS macro syntax, `$(NAME)`.
//! Numeric values are bound as `f64` variables (see [`bind`]), so `/` is
//! always floating-point division; anything else is pasted in as text. The
//! result is evaluated by [`ExpressionEngine`].
//!
//! Two things use expressions:
//!
//! - [`Filter`] - a per-timestamp rule over global channels deciding
//!   whether a snapshot is written, e.g. `$(IBC0L02Current) > 0.1`
//! - [`Modifiers`] - per-channel formulas applied to a node attribute
//!   before it is written, e.g. `$(MQB0L09.BDL) * 1000`
//!
//! ```
//! use cebaf_graph::expr::substitute;
//!
//! let expr = substitute("VIP2R", "10", "8/2 * $(VIP2R)");
//! assert_eq!(expr, "8/2 * 10");
//! ```

mod engine;

pub use engine::{ExpressionEngine, PLACEHOLDER_OPEN};

use crate::error::Result;
use crate::types::{SampleRow, UNDEFINED};
use rhai::Scope;
use std::collections::BTreeMap;

/// Prefix of the variables numeric channel values are bound to
const BINDING_PREFIX: &str = "chan_value_";

/// Replace every `$(channel)` in `template` with `value`.
///
/// Placeholders for other channels are left as they are.
pub fn substitute(channel: &str, value: &str, template: &str) -> String {
    template.replace(&format!("{}{})", PLACEHOLDER_OPEN, channel), value)
}

/// `template` with every `$(channel)` of `values` resolved.
///
/// Numeric values are bound in the returned scope as `f64` variables and
/// their placeholders replaced by the variable name. Other values are
/// substituted as text.
pub fn bind<'a>(
    template: &str,
    values: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> (String, Scope<'static>) {
    let mut scope = Scope::new();
    let mut expression = template.to_string();
    for (channel, value) in values {
        if !expression.contains(&format!("{}{})", PLACEHOLDER_OPEN, channel)) {
            continue;
        }
        match value.trim().parse::<f64>() {
            Ok(number) => {
                let name = format!("{}{}", BINDING_PREFIX, scope.len());
                expression = substitute(channel, &name, &expression);
                scope.push(name, number);
            }
            Err(_) => expression = substitute(channel, value, &expression),
        }
    }
    (expression, scope)
}

/// Snapshot gating rule
#[derive(Debug)]
pub struct Filter {
    rule: String,
    engine: ExpressionEngine,
}

impl Filter {
    pub fn new(rule: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            engine: ExpressionEngine::new(),
        }
    }

    pub fn rule(&self) -> &str {
        &self.rule
    }

    /// The rule with every channel of `row` substituted
    pub fn expression(&self, row: &SampleRow) -> String {
        row.values
            .iter()
            .fold(self.rule.clone(), |expr, (channel, value)| {
                substitute(channel, value, &expr)
            })
    }

    /// Whether `row` passes the rule.
    ///
    /// Fails with an expression error if the rule references a channel the
    /// row lacks or does not evaluate.
    pub fn passes(&self, row: &SampleRow) -> Result<bool> {
        let values = row.values.iter().map(|(k, v)| (k.as_str(), v.as_str()));
        let (expression, mut scope) = bind(&self.rule, values);
        self.engine.evaluate_bool_with(&expression, &mut scope)
    }
}

/// Per-channel value formulas
#[derive(Debug, Default)]
pub struct Modifiers {
    formulas: BTreeMap<String, String>,
    engine: ExpressionEngine,
}

impl Modifiers {
    pub fn new(formulas: BTreeMap<String, String>) -> Self {
        Self {
            formulas,
            engine: ExpressionEngine::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.formulas.is_empty()
    }

    /// `raw` transformed by the channel's formula.
    ///
    /// Undefined values and channels without a formula pass through. A
    /// formula that fails to evaluate is logged and the raw value kept.
    pub fn apply(&self, channel: &str, raw: &str) -> String {
        let Some(formula) = self.formulas.get(channel) else {
            return raw.to_string();
        };
        if raw == UNDEFINED {
            return raw.to_string();
        }
        let (expression, mut scope) = bind(formula, [(channel, raw)]);
        match self.engine.evaluate_to_string_with(&expression, &mut scope) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Modifier for {} failed: {}", channel, e);
                raw.to_string()
            }
        }
    }
}
