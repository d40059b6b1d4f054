mod config;
mod engine;
mod evaluator;
mod executor;
mod runner;


use anyhow::Context;
use config::VariantConfigManager;
use engine::{ExecutionEngine, LocalEngine};
use executor::GradeOutcome;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use synthgrade_common::config::GraderConfig;
use synthgrade_common::store::{self, JsonLines, RecordWriter, StoreError};
use synthgrade_common::tally::{SolveTally, Tier};
use synthgrade_common::types::{InputRecord, Submission};
use tokio::signal;
use tracing::{debug, error, info, instrument, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("Synthgrade worker booting...");

    let config = GraderConfig::from_env();

    let config_manager = VariantConfigManager::load_or_default(&config.variants_config)
        .map_err(|e| {
            error!("Failed to load variant configurations: {:#}", e);
            error!("Fix or remove {}", config.variants_config.display());
            e
        })?;

    info!("Loaded variant configurations for: {:?}", config_manager.list_variants());

    let engine = LocalEngine::new(config_manager).with_timeout(config.exec_timeout);

    info!(
        model = %config.model_name,
        input = %config.input_path().display(),
        results = %config.results_path().display(),
        timeout_ms = engine.timeout().as_millis() as u64,
        passed_only = config.passed_only,
        skip_solved = config.skip_solved,
        "Worker configured"
    );

    // Setup graceful shutdown, checked between submissions
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = Arc::clone(&shutdown);
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                warn!("Received shutdown signal, stopping after current submission...");
                shutdown_flag.store(true, Ordering::SeqCst);
            }
            Err(e) => error!(error = %e, "Failed to install CTRL+C handler"),
        }
    });

    grade_all(&config, &engine, &shutdown).await?;

    report(&config)?;

    info!("Worker shutdown complete");
    Ok(())
}

/// Install the tracing subscriber; `LOG_FORMAT=json` selects JSON lines
fn init_tracing() {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true);

    match std::env::var("LOG_FORMAT") {
        Ok(format) if format.eq_ignore_ascii_case("json") => subscriber.json().init(),
        _ => subscriber.init(),
    }
}

#[instrument(skip_all, fields(model = %config.model_name))]
async fn grade_all(
    config: &GraderConfig,
    engine: &dyn ExecutionEngine,
    shutdown: &AtomicBool,
) -> anyhow::Result<()> {
    let input_path = config.input_path();
    let records = JsonLines::<InputRecord>::open(&input_path)?;
    let mut writer = RecordWriter::create(config.results_path())?;
    let mut tally = SolveTally::new();
    let mut graded = 0usize;

    for item in records {
        if shutdown.load(Ordering::SeqCst) {
            warn!(graded, "Shutdown requested, leaving remaining submissions ungraded");
            break;
        }

        let record = match item {
            Ok(record) => record,
            Err(e @ StoreError::Parse { .. }) => {
                warn!(error = %e, "Skipping malformed submission record");
                continue;
            }
            Err(e) => return Err(e).context("Failed to read submissions"),
        };

        if config.skip_solved && tally.is_counted(&record.src_uid) {
            debug!(src_uid = %record.src_uid, "Problem already solved, skipping candidate");
            continue;
        }

        let src_uid = record.src_uid.clone();
        let submission = match Submission::try_from(record) {
            Ok(submission) => submission,
            Err(e) => {
                warn!(src_uid = %src_uid, error = %e, "Skipping submission that cannot be loaded");
                continue;
            }
        };

        let start = std::time::Instant::now();
        let problem = match executor::grade_submission(engine, &submission).await {
            Ok(GradeOutcome::Graded(problem)) => problem,
            Ok(GradeOutcome::NoGradableCases) => continue,
            Err(e) => {
                error!(src_uid = %src_uid, error = %e, "Grading failed");
                continue;
            }
        };
        graded += 1;

        let solved = problem.is_solved();
        info!(
            src_uid = %src_uid,
            lang = ?problem.lang,
            solved,
            cases = problem.exec_outcome.len(),
            execution_ms = start.elapsed().as_millis() as u64,
            "Grading completed"
        );

        for (idx, verdict) in problem.exec_outcome.iter().enumerate() {
            debug!(
                src_uid = %src_uid,
                test_num = idx + 1,
                outcome = %verdict.exec_outcome,
                "Test result"
            );
        }

        tally.record(&problem);

        if config.passed_only && !solved {
            continue;
        }
        writer
            .append(&problem)
            .with_context(|| format!("Failed to persist record for {}", src_uid))?;
    }

    info!(graded, solved = tally.solved(), "All submissions graded");
    Ok(())
}

/// Recount solved problems from the results stream and print the tiers
fn report(config: &GraderConfig) -> anyhow::Result<()> {
    let results_path = config.results_path();
    if !results_path.exists() {
        warn!(results = %results_path.display(), "No results to report");
        return Ok(());
    }

    let records = store::read_records(&results_path)
        .with_context(|| format!("Failed to read {}", results_path.display()))?;
    let tally = SolveTally::new().reduce(&records);

    info!(
        records = records.len(),
        solved = tally.solved(),
        easy = tally.count(Tier::Easy),
        hard = tally.count(Tier::Hard),
        unranked = tally.unranked(),
        "Solve report"
    );
    println!("{}", tally);
    Ok(())
}
