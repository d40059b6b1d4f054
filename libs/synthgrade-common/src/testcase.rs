use serde::{Deserialize, Serialize};

use crate::pyliteral::{self, LiteralError};

/// Marker left in fixtures whose data was cut short
pub const TRUNCATION_SENTINEL: &str = "...";

/// A single fixture: input lines fed in order, and every accepted output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    #[serde(deserialize_with = "one_or_many")]
    pub input: Vec<String>,
    #[serde(rename = "output", deserialize_with = "one_or_many")]
    pub expected_outputs: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error(transparent)]
    Literal(#[from] LiteralError),

    #[error("unexpected testcase shape: {0}")]
    Shape(#[from] serde_json::Error),
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Lines {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Lines::deserialize(deserializer)? {
        Lines::One(line) => vec![line],
        Lines::Many(lines) => lines,
    })
}

/// Decode the `testcases` field of an input record
pub fn decode_testcases(text: &str) -> Result<Vec<TestCase>, DecodeError> {
    let value = pyliteral::parse(text)?;
    Ok(serde_json::from_value(value)?)
}

impl TestCase {
    pub fn new<I, O>(input: I, expected_outputs: O) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
        O: IntoIterator,
        O::Item: Into<String>,
    {
        Self {
            input: input.into_iter().map(Into::into).collect(),
            expected_outputs: expected_outputs.into_iter().map(Into::into).collect(),
        }
    }

    /// True when any input line or accepted output carries the sentinel
    pub fn is_truncated(&self) -> bool {
        self.input
            .iter()
            .chain(&self.expected_outputs)
            .any(|s| s.contains(TRUNCATION_SENTINEL))
    }

    /// Text handed to the program's stdin.
    ///
    /// Lines are joined, line endings unified, every line stripped, and a
    /// single trailing newline appended.
    pub fn stdin_text(&self) -> String {
        let joined = self.input.join("\n").replace("\r\n", "\n").replace('\r', "\n");
        let mut text = joined
            .trim()
            .split('\n')
            .map(str::trim)
            .collect::<Vec<_>>()
            .join("\n");
        text.push('\n');
        text
    }
}

/// Drop fixtures that were truncated; order of the rest is preserved
pub fn filter_gradable(cases: &[TestCase]) -> Vec<TestCase> {
    cases.iter().filter(|c| !c.is_truncated()).cloned().collect()
}
