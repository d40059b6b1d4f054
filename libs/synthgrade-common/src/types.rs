use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::testcase::{self, TestCase};

/// Runtime variants of the supported language family.
///
/// Declared labels coming from generated candidates are unreliable, so the
/// grader probes both members of the family (see `Variant::candidates`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Python2,
    Python3,
}

impl Variant {
    pub const ALL: [Variant; 2] = [Variant::Python2, Variant::Python3];

    /// The other member of the family
    pub fn other(self) -> Self {
        match self {
            Variant::Python2 => Variant::Python3,
            Variant::Python3 => Variant::Python2,
        }
    }

    /// Probe order: declared variant first, then the alternative
    pub fn candidates(self) -> [Variant; 2] {
        [self, self.other()]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Variant::Python2 => "python2",
            Variant::Python3 => "python3",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variant {
    type Err = LoadError;

    /// Accepts labels such as `python3`, `Python 3.8`, `py2`, `PyPy 3` or a
    /// bare `python` (which runs under the 3.x interpreter).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label: String = s
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();

        let rest = ["python", "pypy", "py"]
            .iter()
            .find_map(|prefix| label.strip_prefix(prefix));

        match rest {
            Some("") if label == "python" => Ok(Variant::Python3),
            Some(r) if r.starts_with('2') => Ok(Variant::Python2),
            Some(r) if r.starts_with('3') => Ok(Variant::Python3),
            _ => Err(LoadError::UnknownVariant(s.to_string())),
        }
    }
}

/// Errors raised while turning a raw input record into a gradable submission
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("unknown runtime variant '{0}'")]
    UnknownVariant(String),

    #[error("malformed testcases literal: {0}")]
    MalformedTestcases(#[from] testcase::DecodeError),
}

/// One line of the input stream, as produced by the extraction layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputRecord {
    pub lang_cluster: String,
    pub src_uid: String,
    #[serde(default)]
    pub difficulty: u32,
    pub source_code: String,
    pub lang: String,
    pub testcases: String,
}

/// A candidate solution ready for grading
#[derive(Debug, Clone)]
pub struct Submission {
    pub lang_cluster: String,
    pub problem_id: String,
    pub difficulty: u32,
    pub source_code: String,
    pub declared_variant: Variant,
    pub test_cases: Vec<TestCase>,
}

impl TryFrom<InputRecord> for Submission {
    type Error = LoadError;

    fn try_from(record: InputRecord) -> Result<Self, Self::Error> {
        let declared_variant = record.lang.parse()?;
        let test_cases = testcase::decode_testcases(&record.testcases)?;

        Ok(Self {
            lang_cluster: record.lang_cluster,
            problem_id: record.src_uid,
            difficulty: record.difficulty,
            source_code: record.source_code,
            declared_variant,
            test_cases,
        })
    }
}

/// Verdict of a single test case.
///
/// Serialized as the label used in result files: `PASSED`, `FAILED` or
/// `ERROR: <reason>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Outcome {
    Passed,
    Failed,
    Error(String),
}

impl Outcome {
    const ERROR_PREFIX: &'static str = "ERROR: ";

    pub fn is_passed(&self) -> bool {
        matches!(self, Outcome::Passed)
    }

    pub fn from_label(label: &str) -> Result<Self, String> {
        match label {
            "PASSED" => Ok(Outcome::Passed),
            "FAILED" => Ok(Outcome::Failed),
            _ => label
                .strip_prefix(Self::ERROR_PREFIX)
                .or_else(|| label.strip_prefix("ERROR:"))
                .map(|reason| Outcome::Error(reason.to_string()))
                .ok_or_else(|| format!("unrecognised exec_outcome label: {}", label)),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Passed => f.write_str("PASSED"),
            Outcome::Failed => f.write_str("FAILED"),
            Outcome::Error(reason) => write!(f, "{}{}", Self::ERROR_PREFIX, reason),
        }
    }
}

impl From<Outcome> for String {
    fn from(outcome: Outcome) -> Self {
        outcome.to_string()
    }
}

impl TryFrom<String> for Outcome {
    type Error = String;

    fn try_from(label: String) -> Result<Self, String> {
        Outcome::from_label(&label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestVerdict {
    pub input: String,
    pub expected: Vec<String>,
    pub actual: String,
    pub error: String,
    pub exec_outcome: Outcome,
}

/// Per-submission verdict record, one line of the results stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemRecord {
    pub lang_cluster: String,
    pub src_uid: String,
    pub difficulty: u32,
    /// Variant the submission actually ran under; absent when neither
    /// candidate could run the first case.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<Variant>,
    pub exec_outcome: Vec<TestVerdict>,
}

impl ProblemRecord {
    /// Solved iff at least one case was graded and every graded case passed
    pub fn is_solved(&self) -> bool {
        !self.exec_outcome.is_empty() && self.exec_outcome.iter().all(|v| v.exec_outcome.is_passed())
    }
}
