//! Command-line interface for autoreview.

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::cache::{CacheStore, FileBackend, Namespace};
use crate::config::{Config, Provider, DEFAULT_TEMPLATE};
use crate::detect::StaticAnalyzer;
use crate::model::{ModelManager, OpenAiClient};
use crate::report::{self, Gate, FORMATS};
use crate::rules::{Language, Severity};
use crate::service::{AnalysisService, CodeSample};
use crate::source::{LocalDirectory, RepositorySource};

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Pattern-based code review with optional model-assisted analysis.
///
/// Autoreview scans Python and JavaScript/TypeScript sources for security,
/// performance and maintainability issues, computes size and complexity
/// metrics, and caches reports keyed by content.
#[derive(Parser)]
#[command(name = "autoreview")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration YAML file (default: auto-discover)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze a single source file
    Analyze(AnalyzeArgs),
    /// Analyze every supported file under a directory
    Scan(ScanArgs),
    /// Inspect or evict cached entries
    Cache(CacheArgs),
    /// Write a default configuration file
    Init(InitArgs),
}

/// Arguments for the analyze command.
#[derive(Args)]
pub struct AnalyzeArgs {
    /// File to analyze
    pub file: PathBuf,

    /// Source language (default: inferred from the file extension)
    #[arg(short, long)]
    pub language: Option<String>,

    /// Extra JSON context passed to the model
    #[arg(long)]
    pub context: Option<String>,

    /// Output format: pretty or json
    #[arg(short, long, default_value = "pretty")]
    pub format: String,

    /// Skip the model call and report local findings only
    #[arg(long)]
    pub no_model: bool,

    /// Exit non-zero if any finding is at or above this severity (low, medium, high)
    #[arg(long)]
    pub fail_on: Option<String>,
}

/// Arguments for the scan command.
#[derive(Args)]
pub struct ScanArgs {
    /// Directory to scan
    pub path: PathBuf,

    /// Output format: pretty or json
    #[arg(short, long, default_value = "pretty")]
    pub format: String,

    /// Exit non-zero if any finding is at or above this severity (low, medium, high)
    #[arg(long)]
    pub fail_on: Option<String>,

    /// Ignore a cached report for this directory
    #[arg(long)]
    pub refresh: bool,
}

#[derive(Args)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub action: CacheAction,
}

#[derive(Subcommand)]
pub enum CacheAction {
    /// Print a cached entry
    Get {
        /// analysis, code_analysis, web_test, user_prefs, task or agent
        namespace: String,
        id: String,
    },
    /// Remove a cached entry
    Delete { namespace: String, id: String },
}

/// Arguments for the init command.
#[derive(Args)]
pub struct InitArgs {
    /// Output file path
    #[arg(short, long, default_value = "autoreview.yaml")]
    pub output: PathBuf,
}

/// Load configuration, or report why it cannot be used.
fn load_config(explicit: Option<&Path>) -> anyhow::Result<Config> {
    let cwd = std::env::current_dir()?;
    Config::load(explicit, &cwd)
}

/// Build the cache described by the configuration.
pub async fn build_cache(config: &Config) -> Arc<CacheStore> {
    let ttl = config.cache.ttl.policy();
    if !config.cache.enabled {
        return Arc::new(CacheStore::in_memory(ttl));
    }

    let backend = match &config.cache.directory {
        Some(dir) => Some(FileBackend::new(dir)),
        None => FileBackend::default_location(),
    };
    match backend {
        Some(backend) => Arc::new(CacheStore::connect(Arc::new(backend), ttl).await),
        None => {
            warn!("no cache directory available, caching in memory only");
            Arc::new(CacheStore::in_memory(ttl))
        }
    }
}

/// Build the analysis service described by the configuration.
pub async fn build_service(config: &Config, use_model: bool) -> anyhow::Result<AnalysisService> {
    let analyzer = StaticAnalyzer::new(config.rule_set()?);
    let mut service = AnalysisService::new(build_cache(config).await)
        .with_analyzer(analyzer)
        .with_model_manager(Arc::new(ModelManager::with_overrides(&config.model.tasks)))
        .with_model_timeout(config.model.timeout())
        .with_max_file_bytes(config.analysis.max_file_bytes);

    if use_model && config.model.provider == Provider::OpenAi {
        match OpenAiClient::from_env(&config.model.api_key_env, config.model.base_url())? {
            Some(client) => service = service.with_model(Arc::new(client)),
            None => info!(
                var = %config.model.api_key_env,
                "API key not set, model analysis disabled"
            ),
        }
    }

    Ok(service)
}

fn check_format(format: &str) -> bool {
    if FORMATS.contains(&format) {
        return true;
    }
    eprintln!(
        "Error: invalid format {:?}, must be one of: {}",
        format,
        FORMATS.join(", ")
    );
    false
}

/// Parse `--fail-on`. `Err` carries the exit code.
fn parse_fail_on(value: Option<&str>) -> Result<Option<Severity>, i32> {
    match value {
        None => Ok(None),
        Some(s) => s.parse::<Severity>().map(Some).map_err(|e| {
            eprintln!("Error: {}", e);
            EXIT_ERROR
        }),
    }
}

/// Run the analyze command.
pub async fn run_analyze(args: &AnalyzeArgs, config_path: Option<&Path>) -> anyhow::Result<i32> {
    if !check_format(&args.format) {
        return Ok(EXIT_ERROR);
    }
    let fail_on = match parse_fail_on(args.fail_on.as_deref()) {
        Ok(f) => f,
        Err(code) => return Ok(code),
    };

    let context: Option<serde_json::Value> = match &args.context {
        Some(raw) => match serde_json::from_str(raw) {
            Ok(v) => Some(v),
            Err(e) => {
                eprintln!("Error: --context is not valid JSON: {}", e);
                return Ok(EXIT_ERROR);
            }
        },
        None => None,
    };

    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: invalid configuration: {}", e);
            return Ok(EXIT_ERROR);
        }
    };

    let content = match std::fs::read(&args.file) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            eprintln!("Error: cannot read {}: {}", args.file.display(), e);
            return Ok(EXIT_ERROR);
        }
    };

    let language = match &args.language {
        Some(name) => Language::parse(name),
        None => args
            .file
            .extension()
            .and_then(|e| e.to_str())
            .map(Language::from_extension)
            .unwrap_or(Language::Unknown),
    };
    if !language.is_known() {
        warn!(file = %args.file.display(), "unsupported language, only metrics will be reported");
    }

    let service = build_service(&config, !args.no_model).await?;
    let sample = CodeSample::new(content, language);
    let outcome = service.analyze_with_context(&sample, context.as_ref()).await;

    let gate = match (fail_on, outcome.report()) {
        (Some(severity), Some(report)) => Some(Gate::evaluate(severity, [&report.findings])),
        _ => None,
    };

    let path_str = args.file.to_string_lossy().to_string();
    match args.format.as_str() {
        "json" => report::write_json(&outcome)?,
        _ => report::write_pretty(&path_str, &outcome, gate),
    }

    if outcome.is_error() || gate.map(|g| !g.passed()).unwrap_or(false) {
        Ok(EXIT_FAILED)
    } else {
        Ok(EXIT_SUCCESS)
    }
}

/// Run the scan command.
pub async fn run_scan(args: &ScanArgs, config_path: Option<&Path>) -> anyhow::Result<i32> {
    if !check_format(&args.format) {
        return Ok(EXIT_ERROR);
    }
    let fail_on = match parse_fail_on(args.fail_on.as_deref()) {
        Ok(f) => f,
        Err(code) => return Ok(code),
    };

    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: invalid configuration: {}", e);
            return Ok(EXIT_ERROR);
        }
    };

    if !args.path.is_dir() {
        eprintln!("Error: not a directory: {}", args.path.display());
        return Ok(EXIT_ERROR);
    }

    let source = LocalDirectory::new(&args.path)
        .with_exclusions(&config.analysis.excluded_paths)?
        .include_test_files(config.analysis.include_test_files)
        .max_file_bytes(config.analysis.max_file_bytes);

    // Scans are local-only; the model is used for single files.
    let service = build_service(&config, false).await?;
    let result = if args.refresh {
        let listing = source.list_files().await?;
        service.analyze_codebase(&source.identifier(), listing).await?
    } else {
        service.analyze_repository(&source).await?
    };

    if result.files_analyzed == 0 {
        eprintln!("Warning: no files to scan");
    }

    let gate = fail_on.map(|severity| {
        Gate::evaluate(severity, result.files.iter().map(|f| &f.findings))
    });

    let path_str = args.path.to_string_lossy().to_string();
    match args.format.as_str() {
        "json" => report::write_json(&result)?,
        _ => report::write_pretty_codebase(&path_str, &result, gate),
    }

    if gate.map(|g| !g.passed()).unwrap_or(false) {
        Ok(EXIT_FAILED)
    } else {
        Ok(EXIT_SUCCESS)
    }
}

/// Run the cache command.
pub async fn run_cache(args: &CacheArgs, config_path: Option<&Path>) -> anyhow::Result<i32> {
    let (namespace, id) = match &args.action {
        CacheAction::Get { namespace, id } | CacheAction::Delete { namespace, id } => {
            (namespace, id)
        }
    };
    let Some(namespace) = Namespace::parse(namespace) else {
        eprintln!("Error: unknown namespace {:?}", namespace);
        return Ok(EXIT_ERROR);
    };

    let config = load_config(config_path)?;
    let cache = build_cache(&config).await;
    let key = namespace.key(id);

    match &args.action {
        CacheAction::Get { .. } => match cache.get(&key).await {
            Some(raw) => {
                match serde_json::from_str::<serde_json::Value>(&raw) {
                    Ok(value) => report::write_json(&value)?,
                    Err(_) => println!("{}", raw),
                }
                Ok(EXIT_SUCCESS)
            }
            None => {
                eprintln!("Not found: {}", key);
                Ok(EXIT_FAILED)
            }
        },
        CacheAction::Delete { .. } => {
            if cache.delete(&key).await {
                println!("Removed {}", key);
                Ok(EXIT_SUCCESS)
            } else {
                eprintln!("Not found: {}", key);
                Ok(EXIT_FAILED)
            }
        }
    }
}

/// Run the init command.
pub fn run_init(args: &InitArgs) -> anyhow::Result<i32> {
    // Check if output already exists
    if args.output.exists() {
        eprintln!("Error: file already exists: {}", args.output.display());
        eprintln!("Remove it or use --output to specify a different path");
        return Ok(EXIT_ERROR);
    }

    // Create output directory if needed
    if let Some(parent) = args.output.parent() {
        if !parent.as_os_str().is_empty() && parent != Path::new(".") {
            if let Err(e) = std::fs::create_dir_all(parent) {
                eprintln!("Error: failed to create directory: {}", e);
                return Ok(EXIT_ERROR);
            }
        }
    }

    if let Err(e) = std::fs::write(&args.output, DEFAULT_TEMPLATE) {
        eprintln!("Error: failed to write configuration: {}", e);
        return Ok(EXIT_ERROR);
    }

    println!("Created {}", args.output.display());
    println!();
    println!("Next steps:");
    println!("  1. Edit {} to customize rules and model settings", args.output.display());
    println!("  2. Run: autoreview scan . --config {}", args.output.display());

    Ok(EXIT_SUCCESS)
}
