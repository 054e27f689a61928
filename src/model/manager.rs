//! Per-task model configuration, prompt templates and caller context.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::warn;

/// Input size (in tokens) above which larger models are selected.
const LARGE_INPUT_TOKENS: usize = 4000;

/// Kinds of model tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    CodeAnalysis,
    BugDetection,
    CommitMessage,
    CodeRefactoring,
    Documentation,
}

impl TaskType {
    pub const ALL: [TaskType; 5] = [
        TaskType::CodeAnalysis,
        TaskType::BugDetection,
        TaskType::CommitMessage,
        TaskType::CodeRefactoring,
        TaskType::Documentation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::CodeAnalysis => "code_analysis",
            TaskType::BugDetection => "bug_detection",
            TaskType::CommitMessage => "commit_message",
            TaskType::CodeRefactoring => "code_refactoring",
            TaskType::Documentation => "documentation",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "code_analysis" => Some(TaskType::CodeAnalysis),
            "bug_detection" => Some(TaskType::BugDetection),
            "commit_message" => Some(TaskType::CommitMessage),
            "code_refactoring" => Some(TaskType::CodeRefactoring),
            "documentation" => Some(TaskType::Documentation),
            _ => None,
        }
    }

    fn default_config(&self) -> ModelConfig {
        let (temperature, max_tokens, context_window) = match self {
            TaskType::CodeAnalysis => (0.7, 4000, 8192),
            TaskType::BugDetection => (0.3, 2000, 8192),
            TaskType::CommitMessage => (0.7, 500, 4096),
            TaskType::CodeRefactoring => (0.5, 3000, 8192),
            TaskType::Documentation => (0.7, 2000, 8192),
        };
        ModelConfig {
            model: "gpt-4o-mini".to_string(),
            temperature,
            max_tokens,
            context_window,
        }
    }

    /// Prompt template with `{code}`, `{language}` and `{context}` placeholders.
    pub fn prompt_template(&self) -> &'static str {
        match self {
            TaskType::CodeAnalysis => CODE_ANALYSIS_PROMPT,
            TaskType::BugDetection => BUG_DETECTION_PROMPT,
            TaskType::CommitMessage => COMMIT_MESSAGE_PROMPT,
            TaskType::CodeRefactoring => CODE_REFACTORING_PROMPT,
            TaskType::Documentation => DOCUMENTATION_PROMPT,
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

const CODE_ANALYSIS_PROMPT: &str = r#"Analyze the following {language} code for:
1. Code quality and best practices
2. Potential bugs and issues
3. Performance optimizations
4. Security vulnerabilities
5. Documentation needs

Additional context: {context}

Code:
{code}

Respond with a single JSON object with these keys:
"quality_issues", "security_vulnerabilities", "performance_optimizations",
"best_practices", "improvement_suggestions" (each a list of objects with
"description" and optional "line"), and "structure_analysis" (an object)."#;

const BUG_DETECTION_PROMPT: &str = r#"Detect potential bugs in the following {language} code:
1. Runtime errors
2. Logic errors
3. Security vulnerabilities
4. Performance issues
5. Edge cases

Additional context: {context}

Code:
{code}

List all potential issues with explanations and suggested fixes."#;

const COMMIT_MESSAGE_PROMPT: &str = r#"Generate a clear and descriptive commit message for the following changes:

Changes:
{code}

Follow conventional commit format and include relevant details."#;

const CODE_REFACTORING_PROMPT: &str = r#"Suggest refactoring improvements for the following {language} code:
1. Code organization
2. Design patterns
3. Performance optimizations
4. Readability improvements
5. Maintainability enhancements

Code:
{code}

Provide specific refactoring suggestions with code examples."#;

const DOCUMENTATION_PROMPT: &str = r#"Write documentation for the following {language} code.
Describe each public function or class, its parameters and return values.

Code:
{code}"#;

/// Model parameters for one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub context_window: u32,
}

/// Partial update of a `ModelConfig`; unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelOverride {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub context_window: Option<u32>,
}

impl ModelOverride {
    fn apply(&self, config: &mut ModelConfig) {
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(temperature) = self.temperature {
            config.temperature = temperature;
        }
        if let Some(max_tokens) = self.max_tokens {
            config.max_tokens = max_tokens;
        }
        if let Some(context_window) = self.context_window {
            config.context_window = context_window;
        }
    }
}

/// Owns model configuration and per-task context.
///
/// One instance is shared per process and injected where needed.
#[derive(Debug)]
pub struct ModelManager {
    configs: RwLock<HashMap<TaskType, ModelConfig>>,
    contexts: RwLock<HashMap<TaskType, Value>>,
}

impl Default for ModelManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelManager {
    /// Create a manager with the default configuration for every task.
    pub fn new() -> Self {
        let configs = TaskType::ALL
            .iter()
            .map(|t| (*t, t.default_config()))
            .collect();
        Self {
            configs: RwLock::new(configs),
            contexts: RwLock::new(HashMap::new()),
        }
    }

    /// Create a manager with configured overrides applied on top of the
    /// defaults. Overrides for unknown task names are ignored with a warning.
    pub fn with_overrides(overrides: &HashMap<String, ModelOverride>) -> Self {
        let manager = Self::new();
        for (task, update) in overrides {
            if !manager.update_model_config(task, update) {
                warn!(task = %task, "ignoring model override for unknown task");
            }
        }
        manager
    }

    /// Configuration for a task type.
    pub fn config_for(&self, task: TaskType) -> ModelConfig {
        self.configs
            .read()
            .ok()
            .and_then(|configs| configs.get(&task).cloned())
            .unwrap_or_else(|| task.default_config())
    }

    /// Configuration for a task by name. Unknown tasks get the
    /// `code_analysis` configuration.
    pub fn get_model_config(&self, task: &str) -> ModelConfig {
        match TaskType::parse(task) {
            Some(t) => self.config_for(t),
            None => {
                warn!(task = %task, "task type not found, using code_analysis configuration");
                self.config_for(TaskType::CodeAnalysis)
            }
        }
    }

    /// Apply a partial update. Returns false for unknown tasks.
    pub fn update_model_config(&self, task: &str, update: &ModelOverride) -> bool {
        let Some(task) = TaskType::parse(task) else {
            return false;
        };
        match self.configs.write() {
            Ok(mut configs) => {
                let config = configs.entry(task).or_insert_with(|| task.default_config());
                update.apply(config);
                true
            }
            Err(_) => false,
        }
    }

    /// Context stored for a task, if any.
    pub fn get_context(&self, task: &str) -> Option<Value> {
        let task = TaskType::parse(task)?;
        self.contexts.read().ok()?.get(&task).cloned()
    }

    /// Replace the context for a task. Returns false for unknown tasks.
    pub fn update_context(&self, task: &str, context: Value) -> bool {
        let Some(task) = TaskType::parse(task) else {
            return false;
        };
        match self.contexts.write() {
            Ok(mut contexts) => {
                contexts.insert(task, context);
                true
            }
            Err(_) => false,
        }
    }

    /// Render the prompt for a task.
    ///
    /// `context` defaults to the stored task context, then to `{}`.
    pub fn render_prompt(
        &self,
        task: TaskType,
        code: &str,
        language: &str,
        context: Option<&Value>,
    ) -> String {
        let context = context
            .cloned()
            .or_else(|| self.get_context(task.as_str()))
            .map(|c| c.to_string())
            .unwrap_or_else(|| "{}".to_string());

        // Code goes in last so placeholders inside the sample stay untouched.
        task.prompt_template()
            .replace("{language}", language)
            .replace("{context}", &context)
            .replace("{code}", code)
    }

    /// Configuration adjusted to the input size.
    ///
    /// Returns a copy; the stored configuration is never changed.
    pub fn optimize_model_selection(&self, task: &str, input_size: usize) -> ModelConfig {
        let mut config = self.get_model_config(task);
        let task = TaskType::parse(task).unwrap_or(TaskType::CodeAnalysis);

        if input_size > LARGE_INPUT_TOKENS && task != TaskType::CodeAnalysis {
            config.model = "gpt-4".to_string();
            config.max_tokens = 4000;
        } else if input_size <= LARGE_INPUT_TOKENS
            && matches!(task, TaskType::CodeAnalysis | TaskType::BugDetection)
        {
            config.model = "gpt-3.5-turbo".to_string();
            config.max_tokens = 2000;
        }

        config
    }
}
