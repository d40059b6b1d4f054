/// Output Evaluator - Normalization and Per-Case Verdicts
///
/// **Core Responsibility:**
/// Compare a program's captured output against the accepted outputs of a
/// test case and produce a `TestVerdict`.
///
/// **Critical Properties:**
/// - Knows nothing about processes or interpreters
/// - Knows nothing about which variant ran the code
/// - Pure functions: (outcome, accepted outputs) → verdict
///
/// **Normalization Rules (applied to both sides):**
/// - Line endings unified (`\r\n` and `\r` become `\n`)
/// - Leading/trailing whitespace of the whole text removed
/// - Each line's tokens re-joined by single spaces
/// - Numeric tokens rewritten with 6 decimals; magnitudes below 1e-9 become
///   exactly `0.000000`
/// - Case sensitivity: YES (exact match required)
///
/// A case passes when its normalized output equals the normalization of ANY
/// accepted output.

use crate::engine::ExecutionOutcome;
use synthgrade_common::testcase::TestCase;
use synthgrade_common::types::{Outcome, TestVerdict};

const ZERO: &str = "0.000000";
const EPSILON: f64 = 1e-9;

/// Parse a token the way Python's `float()` does, which also accepts single
/// underscores between digits (`1_000`)
fn parse_float(token: &str) -> Option<f64> {
    if !token.contains('_') {
        return token.parse().ok();
    }

    let chars: Vec<char> = token.chars().collect();
    let separators_valid = chars.iter().enumerate().all(|(i, c)| {
        *c != '_'
            || (i > 0
                && chars[i - 1].is_ascii_digit()
                && chars.get(i + 1).is_some_and(|next| next.is_ascii_digit()))
    });
    if !separators_valid {
        return None;
    }

    chars
        .into_iter()
        .filter(|c| *c != '_')
        .collect::<String>()
        .parse()
        .ok()
}

/// Canonical form of one whitespace-delimited token
fn normalize_token(token: &str) -> String {
    let Some(value) = parse_float(token) else {
        return token.to_string();
    };

    if value.is_nan() {
        return "nan".to_string();
    }
    if value.abs() < EPSILON {
        return ZERO.to_string();
    }

    let formatted = format!("{:.6}", value);
    // Small negatives round to "-0.000000"; keep one spelling of zero
    if formatted == "-0.000000" {
        ZERO.to_string()
    } else {
        formatted
    }
}

/// Normalize output text for comparison
pub fn normalize_output(output: &str) -> String {
    output
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .trim()
        .split('\n')
        .map(|line| {
            line.split_whitespace()
                .map(normalize_token)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// True when `actual` matches any of the accepted outputs
pub fn outputs_match(actual: &str, expected_outputs: &[String]) -> bool {
    let actual = normalize_output(actual);
    expected_outputs
        .iter()
        .any(|expected| normalize_output(expected) == actual)
}

/// Build the verdict of one graded test case
pub fn evaluate_case(case: &TestCase, outcome: ExecutionOutcome) -> TestVerdict {
    let (actual, error, exec_outcome) = match outcome.into_result() {
        Err(reason) => (String::new(), reason.clone(), Outcome::Error(reason)),
        Ok(stdout) => {
            let verdict = if outputs_match(&stdout, &case.expected_outputs) {
                Outcome::Passed
            } else {
                Outcome::Failed
            };
            (stdout, String::new(), verdict)
        }
    };

    TestVerdict {
        input: case.stdin_text(),
        expected: case.expected_outputs.clone(),
        actual,
        error,
        exec_outcome,
    }
}

/// Verdict for a case that was never run because no variant could execute
/// the submission
pub fn unresolved_case(case: &TestCase, reason: &str) -> TestVerdict {
    TestVerdict {
        input: case.stdin_text(),
        expected: case.expected_outputs.clone(),
        actual: String::new(),
        error: reason.to_string(),
        exec_outcome: Outcome::Error(reason.to_string()),
    }
}
