/// Submission Grader - High-Level Orchestration
///
/// **Responsibility:**
/// Turn one submission into its verdict record.
///
/// **Flow:**
/// 1. Drop truncated fixtures (nothing left → `NoGradableCases`)
/// 2. Write the source to a temporary program file
/// 3. Resolve the runtime variant with the first case (runner.rs)
/// 4. Run the cases in order with the resolved variant (engine.rs), judging
///    each one (evaluator.rs) and stopping at the first that does not pass
///
/// The program file lives exactly as long as the grading of its submission
/// and is removed on every exit path, including early stops and panics.

use crate::engine::ExecutionEngine;
use crate::evaluator::{evaluate_case, unresolved_case};
use crate::runner::{resolve_variant, Resolution};
use anyhow::{Context, Result};
use futures_util::stream::{self, StreamExt};
use std::io::Write;
use std::path::Path;
use synthgrade_common::testcase::{filter_gradable, TestCase};
use synthgrade_common::types::{ProblemRecord, Submission, TestVerdict, Variant};
use tempfile::NamedTempFile;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum GradeOutcome {
    /// Every fixture was truncated; nothing was run
    NoGradableCases,
    Graded(ProblemRecord),
}

/// Grade a single submission.
///
/// Per-case failures are part of the returned record. Only host faults, such
/// as failing to create the program file, are returned as errors.
pub async fn grade_submission(
    engine: &dyn ExecutionEngine,
    submission: &Submission,
) -> Result<GradeOutcome> {
    let cases = filter_gradable(&submission.test_cases);

    info!(
        src_uid = %submission.problem_id,
        declared = %submission.declared_variant,
        test_cases = submission.test_cases.len(),
        gradable = cases.len(),
        source_size = submission.source_code.len(),
        "Grading submission"
    );

    let Some(first_case) = cases.first() else {
        info!(src_uid = %submission.problem_id, "All testcases skipped, no execution needed");
        return Ok(GradeOutcome::NoGradableCases);
    };

    let extension = engine.file_extension(submission.declared_variant);
    let program = write_program(&submission.source_code, &extension)?;

    let resolution = resolve_variant(
        engine,
        program.path(),
        submission.declared_variant,
        first_case,
    )
    .await;

    let (lang, verdicts) = match resolution {
        Resolution::Resolved(variant) => {
            let verdicts = run_cases(engine, variant, program.path(), &cases).await;
            (Some(variant), verdicts)
        }
        Resolution::Unresolved { reason } => {
            warn!(
                src_uid = %submission.problem_id,
                error = %reason,
                "No variant could run the submission"
            );
            let verdicts = cases.iter().map(|case| unresolved_case(case, &reason)).collect();
            (None, verdicts)
        }
    };

    Ok(GradeOutcome::Graded(ProblemRecord {
        lang_cluster: submission.lang_cluster.clone(),
        src_uid: submission.problem_id.clone(),
        difficulty: submission.difficulty,
        lang,
        exec_outcome: verdicts,
    }))
}

fn write_program(source_code: &str, extension: &str) -> Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("synthgrade-")
        .suffix(extension)
        .tempfile()
        .context("Failed to create temporary program file")?;

    file.write_all(source_code.as_bytes())
        .and_then(|_| file.flush())
        .context("Failed to write temporary program file")?;

    Ok(file)
}

/// Run cases in order, yielding verdicts up to and including the first one
/// that does not pass. Cases after it are never started.
async fn run_cases(
    engine: &dyn ExecutionEngine,
    variant: Variant,
    program: &Path,
    cases: &[TestCase],
) -> Vec<TestVerdict> {
    let total = cases.len();

    stream::unfold(
        (cases.iter().enumerate(), false),
        move |(mut pending, halted)| async move {
            if halted {
                return None;
            }
            let (idx, case) = pending.next()?;

            let outcome = engine.run(variant, program, &case.stdin_text()).await;
            let verdict = evaluate_case(case, outcome);

            let halted = !verdict.exec_outcome.is_passed();
            if halted {
                info!(
                    case = idx + 1,
                    total,
                    outcome = %verdict.exec_outcome,
                    "Stopped at first non-passing case"
                );
            }
            Some((verdict, (pending, halted)))
        },
    )
    .collect()
    .await
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::engine::ExecutionOutcome;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::time::Duration;
    use synthgrade_common::types::Outcome;

    type Handler = Box<dyn Fn(&str) -> ExecutionOutcome + Send + Sync>;

    /// In-memory engine: answers each run from a per-variant script
    #[derive(Default)]
    pub(crate) struct ScriptedEngine {
        handlers: HashMap<Variant, Handler>,
        calls: Mutex<Vec<(Variant, String)>>,
        programs: Mutex<Vec<(PathBuf, Option<String>)>>,
    }

    impl ScriptedEngine {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn on<F>(mut self, variant: Variant, handler: F) -> Self
        where
            F: Fn(&str) -> ExecutionOutcome + Send + Sync + 'static,
        {
            self.handlers.insert(variant, Box::new(handler));
            self
        }

        pub(crate) fn calls(&self) -> Vec<(Variant, String)> {
            self.calls.lock().unwrap().clone()
        }

        /// Program paths seen by `run`, with the file contents at that time
        pub(crate) fn programs(&self) -> Vec<(PathBuf, Option<String>)> {
            self.programs.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ExecutionEngine for ScriptedEngine {
        async fn run(&self, variant: Variant, program: &Path, stdin: &str) -> ExecutionOutcome {
            self.calls.lock().unwrap().push((variant, stdin.to_string()));
            self.programs
                .lock()
                .unwrap()
                .push((program.to_path_buf(), std::fs::read_to_string(program).ok()));

            match self.handlers.get(&variant) {
                Some(handler) => handler(stdin),
                None => ExecutionOutcome::Error(format!("Error: no such interpreter {}", variant)),
            }
        }
    }

    /// Echoes the first input line back
    fn echo(stdin: &str) -> ExecutionOutcome {
        ExecutionOutcome::Completed(stdin.trim_end().to_string())
    }

    fn submission(declared: Variant, cases: Vec<TestCase>) -> Submission {
        Submission {
            lang_cluster: "Python".into(),
            problem_id: "1234A".into(),
            difficulty: 1200,
            source_code: "print(input())\n".into(),
            declared_variant: declared,
            test_cases: cases,
        }
    }

    fn graded(outcome: GradeOutcome) -> ProblemRecord {
        match outcome {
            GradeOutcome::Graded(record) => record,
            other => panic!("expected graded record, got {:?}", other),
        }
    }

    fn echo_cases(n: usize) -> Vec<TestCase> {
        (1..=n)
            .map(|i| TestCase::new([i.to_string()], [i.to_string()]))
            .collect()
    }

    #[tokio::test]
    async fn test_all_cases_pass() {
        let engine = ScriptedEngine::new().on(Variant::Python3, echo);
        let sub = submission(Variant::Python3, echo_cases(3));

        let record = graded(grade_submission(&engine, &sub).await.unwrap());

        assert!(record.is_solved());
        assert_eq!(record.exec_outcome.len(), 3);
        assert_eq!(record.lang, Some(Variant::Python3));
        assert_eq!(record.src_uid, "1234A");
        assert_eq!(record.difficulty, 1200);
        // probe + three graded runs
        assert_eq!(engine.calls().len(), 4);
    }

    #[tokio::test]
    async fn test_mismatch_stops_grading() {
        let mut cases = echo_cases(5);
        cases[2] = TestCase::new(["3"], ["not three"]);
        let engine = ScriptedEngine::new().on(Variant::Python3, echo);

        let record = graded(
            grade_submission(&engine, &submission(Variant::Python3, cases))
                .await
                .unwrap(),
        );

        let outcomes: Vec<_> = record.exec_outcome.iter().map(|v| v.exec_outcome.clone()).collect();
        assert_eq!(outcomes, vec![Outcome::Passed, Outcome::Passed, Outcome::Failed]);
        assert_eq!(record.exec_outcome[2].actual, "3");
        assert!(!record.is_solved());
        // cases 4 and 5 never ran
        let inputs: Vec<_> = engine.calls().into_iter().map(|(_, stdin)| stdin).collect();
        assert_eq!(inputs, vec!["1\n", "1\n", "2\n", "3\n"]);
    }

    #[tokio::test]
    async fn test_runtime_error_stops_grading() {
        let engine = ScriptedEngine::new().on(Variant::Python3, |stdin: &str| {
            if stdin == "2\n" {
                ExecutionOutcome::Error("IndexError: list index out of range".into())
            } else {
                echo(stdin)
            }
        });

        let record = graded(
            grade_submission(&engine, &submission(Variant::Python3, echo_cases(4)))
                .await
                .unwrap(),
        );

        assert_eq!(record.exec_outcome.len(), 2);
        let last = &record.exec_outcome[1];
        assert_eq!(
            last.exec_outcome.to_string(),
            "ERROR: IndexError: list index out of range"
        );
        assert_eq!(last.error, "IndexError: list index out of range");
    }

    #[tokio::test]
    async fn test_timeout_stops_grading() {
        let engine = ScriptedEngine::new().on(Variant::Python3, |stdin: &str| {
            if stdin == "1\n" {
                echo(stdin)
            } else {
                ExecutionOutcome::TimedOut {
                    limit: Duration::from_secs(10),
                }
            }
        });

        let record = graded(
            grade_submission(&engine, &submission(Variant::Python3, echo_cases(3)))
                .await
                .unwrap(),
        );

        assert_eq!(record.exec_outcome.len(), 2);
        let label = record.exec_outcome[1].exec_outcome.to_string();
        assert!(label.starts_with("ERROR:"));
        assert!(label.contains("timed out"));
    }

    #[tokio::test]
    async fn test_unresolved_marks_every_case_with_same_error() {
        let engine = ScriptedEngine::new()
            .on(Variant::Python2, |_: &str| ExecutionOutcome::Error("py2: SyntaxError".into()))
            .on(Variant::Python3, |_: &str| ExecutionOutcome::Error("py3: SyntaxError".into()));

        let record = graded(
            grade_submission(&engine, &submission(Variant::Python2, echo_cases(4)))
                .await
                .unwrap(),
        );

        assert_eq!(record.lang, None);
        assert_eq!(record.exec_outcome.len(), 4);
        for verdict in &record.exec_outcome {
            assert_eq!(verdict.exec_outcome, Outcome::Error("py3: SyntaxError".into()));
            assert_eq!(verdict.error, "py3: SyntaxError");
            assert_eq!(verdict.actual, "");
        }
        // only the two probes ran
        assert_eq!(
            engine.calls(),
            vec![(Variant::Python2, "1\n".to_string()), (Variant::Python3, "1\n".to_string())]
        );
    }

    #[tokio::test]
    async fn test_resolved_variant_used_for_all_cases() {
        let engine = ScriptedEngine::new()
            .on(Variant::Python3, |_: &str| ExecutionOutcome::Error("SyntaxError".into()))
            .on(Variant::Python2, echo);

        let record = graded(
            grade_submission(&engine, &submission(Variant::Python3, echo_cases(2)))
                .await
                .unwrap(),
        );

        assert!(record.is_solved());
        assert_eq!(record.lang, Some(Variant::Python2));
        let variants: Vec<_> = engine.calls().into_iter().map(|(v, _)| v).collect();
        assert_eq!(
            variants,
            vec![Variant::Python3, Variant::Python2, Variant::Python2, Variant::Python2]
        );
    }

    #[tokio::test]
    async fn test_no_gradable_cases() {
        let engine = ScriptedEngine::new().on(Variant::Python3, echo);
        let cases = vec![
            TestCase::new(["1 2 3 ..."], ["6"]),
            TestCase::new(["1"], ["..."]),
        ];

        let outcome = grade_submission(&engine, &submission(Variant::Python3, cases))
            .await
            .unwrap();

        assert_eq!(outcome, GradeOutcome::NoGradableCases);
        assert!(engine.calls().is_empty());
    }

    #[tokio::test]
    async fn test_truncated_cases_are_skipped() {
        let engine = ScriptedEngine::new().on(Variant::Python3, echo);
        let cases = vec![
            TestCase::new(["100 ..."], ["100"]),
            TestCase::new(["7"], ["7"]),
            TestCase::new(["8"], ["8 ..."]),
            TestCase::new(["9"], ["9"]),
        ];

        let record = graded(
            grade_submission(&engine, &submission(Variant::Python3, cases))
                .await
                .unwrap(),
        );

        let inputs: Vec<_> = record.exec_outcome.iter().map(|v| v.input.as_str()).collect();
        assert_eq!(inputs, vec!["7\n", "9\n"]);
        assert!(record.is_solved());
    }

    #[tokio::test]
    async fn test_multiple_accepted_outputs() {
        let engine = ScriptedEngine::new().on(Variant::Python3, |_: &str| {
            ExecutionOutcome::Completed("9".into())
        });
        let cases = vec![TestCase::new(["3\n"], ["9\n", "09\n"])];

        let record = graded(
            grade_submission(&engine, &submission(Variant::Python3, cases))
                .await
                .unwrap(),
        );

        assert_eq!(record.exec_outcome[0].exec_outcome, Outcome::Passed);
        assert_eq!(record.exec_outcome[0].input, "3\n");
    }

    #[tokio::test]
    async fn test_program_file_lifecycle() {
        let engine = ScriptedEngine::new().on(Variant::Python3, echo);
        let mut sub = submission(Variant::Python3, echo_cases(1));
        sub.source_code = "print('hello')\n".into();

        grade_submission(&engine, &sub).await.unwrap();

        let programs = engine.programs();
        assert_eq!(programs.len(), 2);
        let (path, contents) = &programs[0];
        assert_eq!(contents.as_deref(), Some("print('hello')\n"));
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("py"));
        assert!(programs.iter().all(|(p, _)| p == path));
        assert!(!path.exists(), "program file should be removed after grading");
    }

    #[tokio::test]
    async fn test_program_file_removed_after_early_stop() {
        let engine = ScriptedEngine::new().on(Variant::Python3, |_: &str| {
            ExecutionOutcome::Completed("wrong".into())
        });

        let record = graded(
            grade_submission(&engine, &submission(Variant::Python3, echo_cases(3)))
                .await
                .unwrap(),
        );

        assert_eq!(record.exec_outcome.len(), 1);
        let (path, _) = &engine.programs()[0];
        assert!(!path.exists());
    }
}
