// CLI commands for inspecting grading inputs and results
use anyhow::{Context, Result};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use synthgrade_common::config::{VariantConfig, VariantsJson};
use synthgrade_common::store::{self, JsonLines};
use synthgrade_common::tally::{SolveTally, Tier, HARD_BAR, NON_BAR};
use synthgrade_common::testcase::filter_gradable;
use synthgrade_common::types::{InputRecord, LoadError, Submission, Variant};

/// Load variants.json with the same rules the worker applies, falling back
/// to built-in defaults when the file is absent
fn load_variants_config(config_path: &Path) -> Result<Vec<VariantConfig>> {
    let configs = if config_path.exists() {
        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        VariantsJson::resolve(&content)
            .with_context(|| format!("Failed to load {}", config_path.display()))?
    } else {
        VariantsJson::builtin_map()
    };

    Ok(configs.into_values().collect())
}

/// Initialize a grading workspace
pub async fn init_project(path: &str) -> Result<()> {
    println!("🚀 Initializing grading workspace at: {}", path);

    let project_path = Path::new(path);

    for dir in ["config", "inference/results", "exec_results"] {
        fs::create_dir_all(project_path.join(dir))
            .with_context(|| format!("Failed to create directory: {}", dir))?;
        println!("  ✅ Created: {}", dir);
    }

    let variants_path = project_path.join("config/variants.json");
    if variants_path.exists() {
        println!("  ⏭️  Kept existing: config/variants.json");
    } else {
        let json_content = serde_json::to_string_pretty(&VariantsJson::builtin())?;
        fs::write(&variants_path, json_content)
            .context("Failed to write variants.json")?;
        println!("  ✅ Created: config/variants.json");
    }

    println!("✅ Workspace initialized successfully!");
    println!("\n📋 Next steps:");
    println!("  1. Place submissions in inference/results/program_synthesis_eval_<model>.jsonl");
    println!("  2. Validate them: synthgrade-cli check --input <file>");
    println!("  3. Run the worker with MODEL_NAME=<model>");

    Ok(())
}

/// Print the configured runtime variants
pub async fn list_variants(config_path: &str) -> Result<()> {
    let config_path = Path::new(config_path);
    let configs = load_variants_config(config_path)?;

    if !config_path.exists() {
        println!("⚠️  {} not found, showing built-in defaults", config_path.display());
    }

    println!("📋 Runtime variants:");
    for config in &configs {
        let exec = &config.execution;
        let invocation = std::iter::once(exec.command.as_str())
            .chain(exec.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");
        println!(
            "  • {} ({}) → {} <program{}>",
            config.name, config.version, invocation, exec.file_extension
        );
    }

    Ok(())
}

/// Findings from validating a submissions file
#[derive(Debug, Default, PartialEq)]
pub struct InputSummary {
    pub total: usize,
    pub unreadable: usize,
    pub unknown_variant: usize,
    pub malformed_testcases: usize,
    pub no_gradable_cases: usize,
    pub declared: BTreeMap<Variant, usize>,
    pub problems: usize,
}

impl InputSummary {
    pub fn gradable(&self) -> usize {
        self.declared.values().sum::<usize>() - self.no_gradable_cases
    }
}

pub fn summarize_input(path: &Path) -> Result<InputSummary> {
    let mut summary = InputSummary::default();
    let mut problems = HashSet::new();

    for item in JsonLines::<InputRecord>::open(path)? {
        summary.total += 1;
        let record = match item {
            Ok(record) => record,
            Err(e) => {
                println!("  ❌ {}", e);
                summary.unreadable += 1;
                continue;
            }
        };

        let src_uid = record.src_uid.clone();
        match Submission::try_from(record) {
            Ok(submission) => {
                *summary.declared.entry(submission.declared_variant).or_default() += 1;
                if filter_gradable(&submission.test_cases).is_empty() {
                    summary.no_gradable_cases += 1;
                }
                problems.insert(src_uid);
            }
            Err(LoadError::UnknownVariant(label)) => {
                println!("  ❌ {}: unknown variant '{}'", src_uid, label);
                summary.unknown_variant += 1;
            }
            Err(LoadError::MalformedTestcases(e)) => {
                println!("  ❌ {}: malformed testcases: {}", src_uid, e);
                summary.malformed_testcases += 1;
            }
        }
    }

    summary.problems = problems.len();
    Ok(summary)
}

/// Validate a submissions file
pub async fn check_input(input: &str) -> Result<()> {
    println!("🔍 Checking submissions: {}", input);

    let summary = summarize_input(Path::new(input))
        .with_context(|| format!("Failed to check {}", input))?;

    println!("\n📊 Summary:");
    println!("  Records:              {}", summary.total);
    println!("  Distinct problems:    {}", summary.problems);
    println!("  Unreadable lines:     {}", summary.unreadable);
    println!("  Unknown variants:     {}", summary.unknown_variant);
    println!("  Malformed testcases:  {}", summary.malformed_testcases);
    println!("  No gradable cases:    {}", summary.no_gradable_cases);
    println!("  Gradable submissions: {}", summary.gradable());
    for (variant, count) in &summary.declared {
        println!("  Declared {}: {}", variant, count);
    }

    let rejected = summary.unreadable + summary.unknown_variant + summary.malformed_testcases;
    if rejected == 0 {
        println!("✅ All records load");
    } else {
        println!("⚠️  {} record(s) will be skipped by the worker", rejected);
    }

    Ok(())
}

/// Count solved problems in a results file
pub async fn report_results(results: &str) -> Result<()> {
    let records = store::read_records(results)
        .with_context(|| format!("Failed to read {}", results))?;
    let tally = SolveTally::new().reduce(&records);

    println!("📊 {} record(s), {} distinct problem(s) solved", records.len(), tally.solved());
    println!("  Easy (< {}):  {}", HARD_BAR, tally.count(Tier::Easy));
    println!("  Hard (< {}):  {}", NON_BAR, tally.count(Tier::Hard));
    if tally.unranked() > 0 {
        println!("  Not tiered:   {}", tally.unranked());
    }
    println!("{}", tally);

    Ok(())
}
