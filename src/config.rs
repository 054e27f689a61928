//! Configuration file schema.
//!
//! Every field has a default, so an empty file (or no file at all) is a
//! valid configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::TtlPolicy;
use crate::model::{ModelOverride, TaskType, DEFAULT_BASE_URL};
use crate::rules::{CustomRule, RuleSet};
use crate::source::DEFAULT_MAX_FILE_BYTES;

/// File names searched for in the working directory, in order.
pub const DEFAULT_CONFIG_NAMES: &[&str] = &["autoreview.yaml", ".autoreview.yaml"];

/// Commented configuration written by `autoreview init`.
pub const DEFAULT_TEMPLATE: &str = include_str!("templates/default.yaml");

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelSection,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub analysis: AnalysisSection,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    OpenAi,
    None,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ModelSection {
    #[serde(default)]
    pub provider: Provider,
    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Per-task overrides keyed by task name, e.g. `code_analysis`
    #[serde(default)]
    pub tasks: HashMap<String, ModelOverride>,
}

impl Default for ModelSection {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            api_key_env: default_api_key_env(),
            base_url: None,
            timeout_secs: default_timeout_secs(),
            tasks: HashMap::new(),
        }
    }
}

impl ModelSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CacheSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Store directory (default: platform cache directory)
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default)]
    pub ttl: TtlSection,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: None,
            ttl: TtlSection::default(),
        }
    }
}

/// Expiration per namespace, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TtlSection {
    pub analysis: u64,
    pub code_analysis: u64,
    pub web_test: u64,
    pub user_prefs: u64,
    pub task_status: u64,
}

impl Default for TtlSection {
    fn default() -> Self {
        let policy = TtlPolicy::default();
        Self {
            analysis: policy.analysis.as_secs(),
            code_analysis: policy.code_analysis.as_secs(),
            web_test: policy.web_test.as_secs(),
            user_prefs: policy.user_prefs.as_secs(),
            task_status: policy.task_status.as_secs(),
        }
    }
}

impl TtlSection {
    pub fn policy(&self) -> TtlPolicy {
        TtlPolicy {
            analysis: Duration::from_secs(self.analysis),
            code_analysis: Duration::from_secs(self.code_analysis),
            web_test: Duration::from_secs(self.web_test),
            user_prefs: Duration::from_secs(self.user_prefs),
            task_status: Duration::from_secs(self.task_status),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AnalysisSection {
    /// Glob patterns for paths to skip during scans (e.g. "**/migrations/**")
    #[serde(default)]
    pub excluded_paths: Vec<String>,
    #[serde(default = "default_true")]
    pub include_test_files: bool,
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
    #[serde(default)]
    pub custom_rules: Vec<CustomRule>,
}

impl Default for AnalysisSection {
    fn default() -> Self {
        Self {
            excluded_paths: Vec::new(),
            include_test_files: true,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            custom_rules: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_file_bytes() -> u64 {
    DEFAULT_MAX_FILE_BYTES
}

impl Config {
    /// Parse a configuration from a YAML file.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading {}: {}", path.display(), e))?;
        Self::parse_str(&content)
            .map_err(|e| anyhow::anyhow!("parsing {}: {}", path.display(), e))
    }

    pub fn parse_str(content: &str) -> anyhow::Result<Self> {
        // serde_yaml reads an empty document as null.
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Load `explicit` if given, else the first default file found in `dir`,
    /// else defaults. The result is validated.
    pub fn load(explicit: Option<&Path>, dir: &Path) -> anyhow::Result<Self> {
        let config = match explicit {
            Some(path) => Self::parse_file(path)?,
            None => match discover(dir) {
                Some(path) => {
                    tracing::debug!(path = %path.display(), "using configuration file");
                    Self::parse_file(path)?
                }
                None => Self::default(),
            },
        };
        validate(&config)?;
        Ok(config)
    }

    /// Built-in rules extended with the configured custom rules.
    pub fn rule_set(&self) -> anyhow::Result<Arc<RuleSet>> {
        if self.analysis.custom_rules.is_empty() {
            return Ok(RuleSet::builtin());
        }
        let rules = RuleSet::with_custom_rules(&self.analysis.custom_rules)?;
        Ok(Arc::new(rules))
    }
}

/// First default configuration file present in `dir`.
pub fn discover(dir: &Path) -> Option<PathBuf> {
    DEFAULT_CONFIG_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

/// Validate a configuration for correctness.
pub fn validate(config: &Config) -> anyhow::Result<()> {
    if config.model.timeout_secs == 0 {
        anyhow::bail!("model.timeout_secs must be greater than zero");
    }

    for (task, update) in &config.model.tasks {
        if TaskType::parse(task).is_none() {
            anyhow::bail!(
                "unknown task {:?} in model.tasks (expected one of: {})",
                task,
                TaskType::ALL
                    .iter()
                    .map(|t| t.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        if let Some(temperature) = update.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                anyhow::bail!(
                    "model.tasks.{}.temperature must be between 0 and 2, got {}",
                    task,
                    temperature
                );
            }
        }
    }

    // Compiles every pattern and checks the target language.
    RuleSet::with_custom_rules(&config.analysis.custom_rules)
        .map_err(|e| anyhow::anyhow!("invalid custom rule: {}", e))?;

    for pattern in &config.analysis.excluded_paths {
        globset::Glob::new(pattern)
            .map_err(|e| anyhow::anyhow!("invalid excluded_paths pattern {:?}: {}", pattern, e))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{Category, Language};
    use tempfile::TempDir;

    #[test]
    fn test_empty_config_is_default() {
        let config = Config::parse_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.model.timeout_secs, 30);
        assert_eq!(config.model.api_key_env, "OPENAI_API_KEY");
        assert!(config.cache.enabled);
        assert!(config.analysis.include_test_files);
        assert_eq!(config.cache.ttl.policy(), TtlPolicy::default());
    }

    #[test]
    fn test_parse_config() {
        let yaml = r#"
model:
  provider: none
  timeout_secs: 10
  tasks:
    code_analysis:
      model: gpt-4o
      temperature: 0.2
cache:
  ttl:
    code_analysis: 60
analysis:
  excluded_paths: ["**/migrations/**"]
  custom_rules:
    - language: python
      category: security
      pattern: 'yaml\.load\('
      message: "yaml.load without a safe loader"
"#;
        let config = Config::parse_str(yaml).unwrap();
        assert_eq!(config.model.provider, Provider::None);
        assert_eq!(config.model.timeout(), Duration::from_secs(10));
        assert_eq!(
            config.model.tasks["code_analysis"].model.as_deref(),
            Some("gpt-4o")
        );
        assert_eq!(config.cache.ttl.code_analysis, 60);
        assert_eq!(config.cache.ttl.user_prefs, 86400);
        assert_eq!(config.analysis.custom_rules.len(), 1);
        validate(&config).unwrap();

        let rules = config.rule_set().unwrap();
        assert!(rules
            .rules_for(Language::Python, Category::Security)
            .iter()
            .any(|r| r.message == "yaml.load without a safe loader"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.model.timeout_secs = 0;
        assert!(validate(&config).is_err());

        let config = Config::parse_str("model:\n  tasks:\n    code_analysis:\n      temperature: 3.5\n").unwrap();
        assert!(validate(&config).is_err());

        let config = Config::parse_str("model:\n  tasks:\n    poetry:\n      model: x\n").unwrap();
        assert!(validate(&config).is_err());

        let config = Config::parse_str("analysis:\n  excluded_paths: ['a[']\n").unwrap();
        assert!(validate(&config).is_err());

        let yaml = "analysis:\n  custom_rules:\n    - {language: python, category: security, pattern: '(', message: m}\n";
        let config = Config::parse_str(yaml).unwrap();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_template_is_valid() {
        let config = Config::parse_str(DEFAULT_TEMPLATE).unwrap();
        validate(&config).unwrap();
    }

    #[test]
    fn test_load_discovers_file() {
        let temp = TempDir::new().unwrap();
        assert_eq!(Config::load(None, temp.path()).unwrap(), Config::default());

        fs::write(temp.path().join(".autoreview.yaml"), "model:\n  timeout_secs: 5\n").unwrap();
        let config = Config::load(None, temp.path()).unwrap();
        assert_eq!(config.model.timeout_secs, 5);

        let missing = temp.path().join("nope.yaml");
        assert!(Config::load(Some(&missing), temp.path()).is_err());
    }
}
