// Grader configuration: environment settings and the variants.json schema
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::types::{LoadError, Variant};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid variants config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid variant entry '{name}': {source}")]
    UnknownVariant { name: String, source: LoadError },

    #[error("variant '{0}' has an empty command")]
    EmptyCommand(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantExecution {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub file_extension: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantConfig {
    pub name: String,
    #[serde(default)]
    pub version: String,
    pub execution: VariantExecution,
}

impl VariantConfig {
    /// Built-in invocation for a variant
    pub fn builtin(variant: Variant) -> Self {
        let (command, version) = match variant {
            Variant::Python2 => ("python2", "2.7"),
            Variant::Python3 => ("python3", "3"),
        };
        Self {
            name: variant.to_string(),
            version: version.to_string(),
            execution: VariantExecution {
                command: command.to_string(),
                args: vec![],
                file_extension: ".py".to_string(),
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VariantsJson {
    pub variants: Vec<VariantConfig>,
}

impl VariantsJson {
    pub fn builtin() -> Self {
        Self {
            variants: Variant::ALL.iter().map(|v| VariantConfig::builtin(*v)).collect(),
        }
    }

    /// Built-in invocation for every variant
    pub fn builtin_map() -> BTreeMap<Variant, VariantConfig> {
        Variant::ALL
            .iter()
            .map(|v| (*v, VariantConfig::builtin(*v)))
            .collect()
    }

    /// Decode variants.json and overlay its entries on the built-in
    /// invocations. Variants the file omits keep their defaults.
    pub fn resolve(content: &str) -> Result<BTreeMap<Variant, VariantConfig>, ConfigError> {
        let variants_json: VariantsJson = serde_json::from_str(content)?;

        let mut configs = Self::builtin_map();
        for config in variants_json.variants {
            let variant: Variant =
                config
                    .name
                    .parse()
                    .map_err(|source| ConfigError::UnknownVariant {
                        name: config.name.clone(),
                        source,
                    })?;
            if config.execution.command.trim().is_empty() {
                return Err(ConfigError::EmptyCommand(config.name));
            }
            configs.insert(variant, config);
        }

        Ok(configs)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraderConfig {
    pub model_name: String,
    pub inference_dir: PathBuf,
    pub exec_result_dir: PathBuf,
    pub exec_timeout: Duration,
    pub variants_config: PathBuf,
    /// Only write solved records to the results stream
    pub passed_only: bool,
    /// Stop grading further candidates of a problem once one is solved
    pub skip_solved: bool,
}

impl Default for GraderConfig {
    fn default() -> Self {
        Self {
            model_name: "gemini".to_string(),
            inference_dir: PathBuf::from("./inference/results/"),
            exec_result_dir: PathBuf::from("./exec_results/"),
            exec_timeout: Duration::from_secs(10),
            variants_config: PathBuf::from("config/variants.json"),
            passed_only: false,
            skip_solved: true,
        }
    }
}

impl GraderConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset or unparsable keys keep defaults
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let flag = |key: &str, default: bool| {
            lookup(key)
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(default)
        };

        Self {
            model_name: lookup("MODEL_NAME").unwrap_or(defaults.model_name),
            inference_dir: lookup("INFERENCE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.inference_dir),
            exec_result_dir: lookup("EXEC_RESULT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.exec_result_dir),
            exec_timeout: lookup("EXEC_TIMEOUT_MS")
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.exec_timeout),
            variants_config: lookup("VARIANTS_CONFIG")
                .map(PathBuf::from)
                .unwrap_or(defaults.variants_config),
            passed_only: flag("PASSED_ONLY", defaults.passed_only),
            skip_solved: flag("SKIP_SOLVED", defaults.skip_solved),
        }
    }

    fn stream_file_name(&self) -> String {
        format!("program_synthesis_eval_{}.jsonl", self.model_name)
    }

    /// Extracted submissions for this model
    pub fn input_path(&self) -> PathBuf {
        self.inference_dir.join(self.stream_file_name())
    }

    /// Verdict records for this model
    pub fn results_path(&self) -> PathBuf {
        self.exec_result_dir.join(self.stream_file_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = GraderConfig::from_lookup(|_| None);
        assert_eq!(config, GraderConfig::default());
        assert_eq!(config.exec_timeout, Duration::from_secs(10));
        assert_eq!(
            config.input_path(),
            PathBuf::from("./inference/results/program_synthesis_eval_gemini.jsonl")
        );
        assert_eq!(
            config.results_path(),
            PathBuf::from("./exec_results/program_synthesis_eval_gemini.jsonl")
        );
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("MODEL_NAME", "flash"),
            ("EXEC_RESULT_DIR", "/tmp/out"),
            ("EXEC_TIMEOUT_MS", "2500"),
            ("PASSED_ONLY", "TRUE"),
            ("SKIP_SOLVED", "false"),
        ]);
        let config = GraderConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.exec_timeout, Duration::from_millis(2500));
        assert!(config.passed_only);
        assert!(!config.skip_solved);
        assert_eq!(
            config.results_path(),
            PathBuf::from("/tmp/out/program_synthesis_eval_flash.jsonl")
        );
    }

    #[test]
    fn test_variants_resolve_overlays_builtins() {
        let configs = VariantsJson::resolve(
            r#"{"variants": [{"name": "Python 2", "execution": {"command": "pypy", "args": ["-E"], "file_extension": ".py"}}]}"#,
        )
        .unwrap();

        assert_eq!(configs.len(), 2);
        assert_eq!(configs[&Variant::Python2].execution.command, "pypy");
        assert_eq!(configs[&Variant::Python2].execution.args, vec!["-E"]);
        assert_eq!(configs[&Variant::Python3], VariantConfig::builtin(Variant::Python3));
    }

    #[test]
    fn test_variants_resolve_rejects_bad_entries() {
        assert!(matches!(
            VariantsJson::resolve(
                r#"{"variants": [{"name": "ruby", "execution": {"command": "ruby", "file_extension": ".rb"}}]}"#
            ),
            Err(ConfigError::UnknownVariant { .. })
        ));
        assert!(matches!(
            VariantsJson::resolve(
                r#"{"variants": [{"name": "python3", "execution": {"command": "  ", "file_extension": ".py"}}]}"#
            ),
            Err(ConfigError::EmptyCommand(name)) if name == "python3"
        ));
        assert!(matches!(VariantsJson::resolve("{"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_invalid_timeout_falls_back() {
        let config = GraderConfig::from_lookup(|k| (k == "EXEC_TIMEOUT_MS").then(|| "soon".to_string()));
        assert_eq!(config.exec_timeout, Duration::from_secs(10));
    }
}
