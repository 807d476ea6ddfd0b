//! Channel naming
//!
//! A node samples one channel per configured field. The channel name is
//! built from the element's base name (its `EPICSName`, else its name):
//!
//! | field      | channel                                   |
//! |------------|-------------------------------------------|
//! | `XPSET8`   | base name minus its last character + field |
//! | `""`       | base name, or base name + exception suffix |
//! | other      | base name + field                         |

use crate::config::NodesConfig;
use crate::types::Element;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Zone-level field shared by every cavity of a zone
pub const XPSET8_FIELD: &str = "XPSET8";

/// How an exception rule matches an element name
#[derive(Debug, Clone)]
pub enum NameMatcher {
    Exact(String),
    Pattern(Regex),
}

impl NameMatcher {
    pub fn matches(&self, name: &str) -> bool {
        match self {
            NameMatcher::Exact(exact) => exact == name,
            NameMatcher::Pattern(re) => re.is_match(name),
        }
    }
}

/// Elements whose bare-name channel needs a fixed suffix
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawExceptionRule", into = "RawExceptionRule")]
pub struct ExceptionRule {
    pub matcher: NameMatcher,
    pub suffix: String,
}

impl ExceptionRule {
    pub fn exact(name: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            matcher: NameMatcher::Exact(name.into()),
            suffix: suffix.into(),
        }
    }

    pub fn pattern(pattern: &str, suffix: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(Self {
            matcher: NameMatcher::Pattern(Regex::new(pattern)?),
            suffix: suffix.into(),
        })
    }
}

/// Config form: exactly one of `name` or `pattern`, plus `suffix`
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawExceptionRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pattern: Option<String>,
    suffix: String,
}

impl TryFrom<RawExceptionRule> for ExceptionRule {
    type Error = String;

    fn try_from(raw: RawExceptionRule) -> Result<Self, Self::Error> {
        match (raw.name, raw.pattern) {
            (Some(name), None) => Ok(ExceptionRule::exact(name, raw.suffix)),
            (None, Some(pattern)) => ExceptionRule::pattern(&pattern, raw.suffix)
                .map_err(|e| format!("invalid exception pattern '{}': {}", pattern, e)),
            _ => Err("an exception rule needs exactly one of 'name' or 'pattern'".to_string()),
        }
    }
}

impl From<ExceptionRule> for RawExceptionRule {
    fn from(rule: ExceptionRule) -> Self {
        let (name, pattern) = match rule.matcher {
            NameMatcher::Exact(name) => (Some(name), None),
            NameMatcher::Pattern(re) => (None, Some(re.as_str().to_string())),
        };
        Self {
            name,
            pattern,
            suffix: rule.suffix,
        }
    }
}

/// Ordered exception rules; the first match wins
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExceptionTable(Vec<ExceptionRule>);

impl ExceptionTable {
    pub fn new(rules: Vec<ExceptionRule>) -> Self {
        Self(rules)
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Suffix for an element's bare-name channel, if any rule matches
    pub fn suffix_for(&self, element_name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|rule| rule.matcher.matches(element_name))
            .map(|rule| rule.suffix.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for ExceptionTable {
    /// Injector beam current monitor and ion pumps
    fn default() -> Self {
        let mut rules = vec![ExceptionRule::exact("IBC0L02", "Current")];
        if let Ok(pumps) = ExceptionRule::pattern(r"^VIP\d?[A-Z0-9]+$", "PRES") {
            rules.push(pumps);
        }
        Self(rules)
    }
}

/// Everything needed to turn fields into channel names and labels
#[derive(Debug, Clone)]
pub struct ChannelNaming {
    pub exceptions: ExceptionTable,
    /// Label used for the `""` field
    pub default_label: String,
}

impl ChannelNaming {
    pub fn from_config(config: &NodesConfig) -> Self {
        Self {
            exceptions: config.exceptions.clone(),
            default_label: config.default_label.clone(),
        }
    }

    /// Channel sampled for `field` of `element`
    pub fn channel_name(&self, element: &Element, field: &str) -> String {
        let base = element.epics_name();
        match field {
            XPSET8_FIELD => {
                let mut zone = base.to_string();
                zone.pop();
                format!("{}{}", zone, field)
            }
            "" => match self.exceptions.suffix_for(&element.name) {
                Some(suffix) => format!("{}{}", base, suffix),
                None => base.to_string(),
            },
            _ => format!("{}{}", base, field),
        }
    }

    /// Attribute label for `field`
    pub fn label<'a>(&'a self, field: &'a str) -> &'a str {
        if field.is_empty() {
            &self.default_label
        } else {
            field
        }
    }
}

impl Default for ChannelNaming {
    fn default() -> Self {
        Self {
            exceptions: ExceptionTable::default(),
            default_label: "value".to_string(),
        }
    }
}
