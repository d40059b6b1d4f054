// Runtime variant resolution.
//
// Declared variants are often wrong for the code that was generated, so the
// submission is probed once per candidate with the first gradable case. The
// first candidate that runs without error text is used for every case.

use crate::engine::ExecutionEngine;
use std::path::Path;
use synthgrade_common::testcase::TestCase;
use synthgrade_common::types::Variant;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(Variant),
    /// Every candidate failed; `reason` is the last error observed
    Unresolved { reason: String },
}

pub async fn resolve_variant(
    engine: &dyn ExecutionEngine,
    program: &Path,
    declared: Variant,
    first_case: &TestCase,
) -> Resolution {
    let stdin = first_case.stdin_text();
    let mut last_error = String::new();

    for candidate in declared.candidates() {
        debug!(variant = %candidate, "Probing variant");

        match engine.run(candidate, program, &stdin).await.into_result() {
            Ok(_) => {
                if candidate != declared {
                    info!(declared = %declared, resolved = %candidate, "Declared variant corrected");
                }
                return Resolution::Resolved(candidate);
            }
            Err(reason) => {
                debug!(variant = %candidate, error = %reason, "Probe failed, trying alternative");
                last_error = reason;
            }
        }
    }

    Resolution::Unresolved { reason: last_error }
}
