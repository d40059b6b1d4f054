// Runtime variant configuration for the grading worker
use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use synthgrade_common::config::{VariantConfig, VariantExecution, VariantsJson};
use synthgrade_common::types::Variant;

/// Variant configuration manager
#[derive(Debug, Clone)]
pub struct VariantConfigManager {
    configs: BTreeMap<Variant, VariantConfig>,
}

impl Default for VariantConfigManager {
    fn default() -> Self {
        Self {
            configs: VariantsJson::builtin_map(),
        }
    }
}

impl VariantConfigManager {
    /// Load variant configurations from variants.json.
    ///
    /// Entries override the built-in defaults; variants the file does not
    /// mention keep their built-in invocation.
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            bail!("Variant config file not found: {}", config_path.display());
        }

        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        Self::from_json(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(Self {
            configs: VariantsJson::resolve(content)?,
        })
    }

    /// Load from the given path, or fall back to built-in defaults when absent
    pub fn load_or_default(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            Self::load(config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn get_config(&self, variant: Variant) -> &VariantConfig {
        // `builtin_map` populates every variant
        &self.configs[&variant]
    }

    pub fn get_command(&self, variant: Variant) -> &VariantExecution {
        &self.get_config(variant).execution
    }

    pub fn list_variants(&self) -> Vec<String> {
        self.configs.keys().map(|v| v.to_string()).collect()
    }
}
