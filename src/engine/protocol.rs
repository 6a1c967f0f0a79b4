//! File and stdout contract with the external anonymization engine.
//!
//! Input file: one `attribute::value` tag per line, UTF-8.
//! Output file: one line per input line, `value` or `value::strategy`.
//! Stdout: free-form, plus optional `KEY: value` metric lines.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::source::AttributeValue;

/// Bumped whenever any part of the file or stdout contract changes
pub const PROTOCOL_VERSION: u32 = 1;

pub const TAG_SEPARATOR: &str = "::";

/// Rendered in place of an output the engine never produced
pub const MISSING_PLACEHOLDER: &str = "?";

const SCORE_KEYS: &[&str] = &["ANONYMIZATION_SCORE", "SCORE"];
const UTILITY_KEYS: &[&str] = &["UTILITY_RETAINED", "UTILITY_RETENTION", "UTILITY"];

static METRIC_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([A-Za-z][A-Za-z _-]*?)\s*[:=]\s*(\S.*?)\s*$").unwrap());

/// An attribute value as it travels to the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaggedValue {
    pub attribute: String,
    pub value: String,
}

impl TaggedValue {
    pub fn new(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// `attribute::value`. Line breaks inside the value are flattened to
    /// spaces so the line count always matches the value count.
    pub fn encode(&self) -> String {
        format!(
            "{}{}{}",
            flatten(&self.attribute),
            TAG_SEPARATOR,
            flatten(&self.value)
        )
    }
}

impl From<&AttributeValue> for TaggedValue {
    fn from(value: &AttributeValue) -> Self {
        Self::new(value.attribute_name.clone(), value.raw_value.clone())
    }
}

fn flatten(s: &str) -> String {
    s.replace(['\r', '\n'], " ")
}

/// Contents of the engine's input file
pub fn serialize_input(values: &[TaggedValue]) -> String {
    values
        .iter()
        .map(TaggedValue::encode)
        .collect::<Vec<_>>()
        .join("\n")
}

/// One line of the engine's output file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputLine {
    pub value: String,
    pub strategy: Option<String>,
}

impl OutputLine {
    /// Splits on the last separator so values may themselves contain `::`.
    pub fn parse(line: &str) -> Self {
        let line = line.trim_end_matches('\r');
        match line.rsplit_once(TAG_SEPARATOR) {
            Some((value, strategy)) if !strategy.trim().is_empty() => Self {
                value: value.to_string(),
                strategy: Some(strategy.trim().to_string()),
            },
            Some((value, _)) => Self {
                value: value.to_string(),
                strategy: None,
            },
            None => Self {
                value: line.to_string(),
                strategy: None,
            },
        }
    }
}

/// Parses the output file. Trailing blank lines are not results.
pub fn parse_output(contents: &str) -> Vec<OutputLine> {
    let mut lines: Vec<&str> = contents.lines().collect();
    while lines.last().map_or(false, |l| l.trim().is_empty()) {
        lines.pop();
    }
    lines.into_iter().map(OutputLine::parse).collect()
}

/// Metrics the engine may report on stdout
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EngineMetrics {
    /// Anonymization score in `[0.0, 1.0]`
    pub score: Option<f64>,
    /// Utility-retained indicator, verbatim
    pub utility_retained: Option<String>,
}

/// Picks recognized `KEY: value` lines out of stdout; everything else is
/// ignored. A later occurrence of a key replaces an earlier one.
pub fn parse_metrics(stdout: &str) -> EngineMetrics {
    let mut metrics = EngineMetrics::default();
    for line in stdout.lines() {
        let Some(caps) = METRIC_LINE.captures(line) else {
            continue;
        };
        let key = caps[1].trim().to_ascii_uppercase().replace([' ', '-'], "_");
        let value = caps[2].trim();

        if SCORE_KEYS.contains(&key.as_str()) {
            match value.parse::<f64>() {
                Ok(score) if (0.0..=1.0).contains(&score) => metrics.score = Some(score),
                _ => debug!("Ignoring out-of-range or non-numeric score '{}'", value),
            }
        } else if UTILITY_KEYS.contains(&key.as_str()) {
            metrics.utility_retained = Some(value.to_string());
        }
    }
    metrics
}

/// What the engine produced for one input position
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnonymizedCell {
    Value {
        value: String,
        strategy: Option<String>,
    },
    /// The output file ended before this position
    Missing,
}

impl AnonymizedCell {
    pub fn display_value(&self) -> &str {
        match self {
            AnonymizedCell::Value { value, .. } => value,
            AnonymizedCell::Missing => MISSING_PLACEHOLDER,
        }
    }

    pub fn strategy(&self) -> Option<&str> {
        match self {
            AnonymizedCell::Value { strategy, .. } => strategy.as_deref(),
            AnonymizedCell::Missing => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, AnonymizedCell::Missing)
    }
}

/// Pairs input `i` with output `i`.
///
/// Short output pads with `Missing`; surplus output is dropped. Either
/// mismatch is logged.
pub fn pair_outputs(inputs: &[TaggedValue], outputs: &[OutputLine]) -> Vec<AnonymizedCell> {
    if outputs.len() != inputs.len() {
        warn!(
            "Engine returned {} lines for {} inputs",
            outputs.len(),
            inputs.len()
        );
    }
    (0..inputs.len())
        .map(|i| match outputs.get(i) {
            Some(line) => AnonymizedCell::Value {
                value: line.value.clone(),
                strategy: line.strategy.clone(),
            },
            None => AnonymizedCell::Missing,
        })
        .collect()
}
