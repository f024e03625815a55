//! Foreman CLI - testing team coordinator bot
//!
//! A command-line interface for running the Foreman bot.

#![allow(clippy::print_stdout)] // CLI program intentionally uses stdout

use clap::{Args, Parser, Subcommand};
use foreman::orchestrator::Orchestrator;
use foreman::prompt::PromptBuilder;
use foreman::providers::AnthropicClient;
use foreman::role::Role;
use foreman_bot::config::{BotConfig, IssueLevel, config_path, init_config, load_config};
use foreman_bot::error::{BotError, DisplayError, ErrorContext, Result};
use foreman_bot::repl::{Repl, ReplConfig};
use foreman_bot::roster::Roster;
use foreman_bot::tools;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Foreman - turns team requests into tool calls through an LLM
#[derive(Parser)]
#[command(name = "foreman")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file path
    #[arg(short, long, env = "FOREMAN_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init(InitArgs),

    /// Start an interactive chat session
    Chat(ChatArgs),

    /// Show bot status and configuration
    Status,

    /// Manage configuration
    Config(ConfigArgs),
}

/// Arguments for the init command
#[derive(Args)]
struct InitArgs {
    /// Force overwrite existing configuration
    #[arg(short, long)]
    force: bool,
}

/// Arguments for the chat command
#[derive(Args)]
struct ChatArgs {
    /// Caller user id (defaults to the configured owner)
    #[arg(long)]
    caller: Option<i64>,

    /// Fixed caller role; resolved from the roster when omitted
    #[arg(long)]
    role: Option<Role>,

    /// Simulate a shared chat with this id
    #[arg(long)]
    chat: Option<i64>,

    /// Caller username
    #[arg(short, long, default_value = "cli")]
    username: String,

    /// Topic name
    #[arg(short, long, default_value = "private")]
    topic: String,

    /// Model to use (overrides config)
    #[arg(short = 'M', long, env = "FOREMAN_MODEL")]
    model: Option<String>,

    /// Prompt string
    #[arg(short, long, default_value = "You: ")]
    prompt: String,
}

/// Arguments for the config command
#[derive(Args)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Show configuration file path
    Path,
    /// Validate configuration
    Validate,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!(error = %e, "failed to create tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match rt.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", DisplayError(&e));
            ExitCode::FAILURE
        }
    }
}

/// Initialize logging with the given verbosity level.
fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "foreman_bot={level},foreman={level},{}",
            if verbosity >= 2 { "debug" } else { "warn" }
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbosity >= 2)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let path = cli.config.unwrap_or_else(config_path);
    match cli.command {
        Commands::Init(args) => cmd_init(args, &path).await,
        Commands::Chat(args) => cmd_chat(args, &path).await,
        Commands::Status => cmd_status(&path).await,
        Commands::Config(args) => cmd_config(args, &path).await,
    }
}

/// Load the configuration file and apply environment overrides.
async fn load(path: &Path) -> Result<BotConfig> {
    let mut config = load_config(Some(path))
        .await
        .with_context(|| format!("failed to load {}", path.display()))?;
    config.apply_env();
    Ok(config)
}

/// Write a default configuration.
async fn cmd_init(args: InitArgs, path: &Path) -> Result<()> {
    if path.exists() && !args.force {
        println!("Configuration already exists at: {}", path.display());
        println!("Use --force to overwrite.");
        return Ok(());
    }

    init_config(path)
        .await
        .context("failed to initialize config")?;

    println!("Configuration created: {}", path.display());
    println!();
    println!("Next steps:");
    println!("  1. set owner_id and testers in the file");
    println!("  2. export ANTHROPIC_API_KEY=<key>");
    println!("  3. foreman chat");

    Ok(())
}

/// Start interactive chat.
async fn cmd_chat(args: ChatArgs, path: &Path) -> Result<()> {
    let mut config = load(path).await?;
    if let Some(model) = args.model {
        config.core.models.default = model;
    }

    let errors: Vec<String> = config
        .validate()
        .into_iter()
        .filter(|issue| issue.level == IssueLevel::Error)
        .map(|issue| issue.message)
        .collect();
    if !errors.is_empty() {
        return Err(BotError::config(errors.join("; ")));
    }

    let api_key = config
        .anthropic
        .api_key
        .clone()
        .ok_or_else(|| BotError::config("No API key found. Set ANTHROPIC_API_KEY"))?;
    let mut client = AnthropicClient::builder()
        .api_key(api_key)
        .timeout_secs(config.anthropic.timeout_secs);
    if let Some(url) = &config.anthropic.base_url {
        client = client.base_url(url.clone());
    }
    let model = client.build()?;

    let roster = Arc::new(Roster::from_config(&config));
    let (outbox, outbound) = tokio::sync::mpsc::unbounded_channel();

    let mut prompt = PromptBuilder::new();
    if let Some(instructions) = &config.instructions {
        prompt = prompt.with_instructions(instructions.clone());
    }

    let orchestrator = Orchestrator::builder(model)
        .config(config.core.clone())
        .tools(tools::registry(&roster, outbox))
        .shortcuts(tools::shortcuts(&config)?)
        .prompt(prompt)
        .build()?;

    let repl_config = ReplConfig::new()
        .prompt(args.prompt)
        .caller(args.caller.unwrap_or(config.owner_id))
        .username(args.username)
        .role(args.role)
        .chat(args.chat)
        .topic(args.topic);
    let mut repl = Repl::new(Arc::new(orchestrator), roster, outbound, repl_config);

    println!("Foreman chat | type 'exit' to quit, '/chat <text>' for small talk\n");

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    tokio::select! {
        result = repl.run(stdin, &mut stdout) => result,
        _ = tokio::signal::ctrl_c() => {
            println!("\nShutting down...");
            Ok(())
        }
    }
}

/// Show status.
async fn cmd_status(path: &Path) -> Result<()> {
    println!("Foreman Status\n");

    println!("Configuration:");
    println!("  Path:   {}", path.display());
    println!("  Exists: {}", if path.exists() { "yes" } else { "no" });

    match load(path).await {
        Ok(config) => {
            let roster = Roster::from_config(&config);
            let (outbox, _outbound) = tokio::sync::mpsc::unbounded_channel();
            let registry = tools::registry(&Arc::new(roster), outbox);

            println!();
            println!("Core:");
            println!("  Model:          {}", config.core.models.default);
            println!("  Chat model:     {}", config.core.chat_model);
            println!("  Max rounds:     {}", config.core.max_rounds);
            println!("  Max sessions:   {}", config.core.max_sessions);
            println!("  Call interval:  {} ms", config.core.min_call_interval_ms);
            println!("  Retry attempts: {}", config.core.retry.max_attempts);
            println!();
            println!("Team:");
            println!("  Owner:   {}", config.owner_id);
            println!("  Admins:  {}", config.admins.len());
            println!("  Testers: {}", config.testers.len());
            println!();
            println!("Tools:");
            for role in Role::ALL {
                let names: Vec<String> = registry
                    .definitions_for(role)
                    .into_iter()
                    .map(|d| d.name)
                    .collect();
                println!("  {role:<7} {}", names.join(", "));
            }
            println!("  silent  {}", registry.silent_names().join(", "));
        }
        Err(e) => println!("  Valid:  no ({e})"),
    }

    println!();
    println!("Environment:");
    print_env_status("ANTHROPIC_API_KEY");
    print_env_status("ANTHROPIC_BASE_URL");
    print_env_status("FOREMAN_MODEL");
    print_env_status("FOREMAN_OWNER_ID");

    Ok(())
}

/// Configuration management.
async fn cmd_config(args: ConfigArgs, path: &Path) -> Result<()> {
    match args.command {
        ConfigCommands::Path => {
            println!("{}", path.display());
        }
        ConfigCommands::Show => {
            if path.exists() {
                let content = tokio::fs::read_to_string(path)
                    .await
                    .context("failed to read config")?;
                println!("{content}");
            } else {
                println!("Configuration file does not exist.");
                println!("Run 'foreman init' to create one.");
            }
        }
        ConfigCommands::Validate => {
            let config = load(path).await?;
            let issues = config.validate();
            if issues.is_empty() {
                println!("Configuration is valid");
            }
            for issue in issues {
                let label = match issue.level {
                    IssueLevel::Error => "error",
                    IssueLevel::Warning => "warning",
                };
                println!("{label}: {}", issue.message);
            }
        }
    }

    Ok(())
}

/// Print environment variable status.
fn print_env_status(name: &str) {
    let status = if std::env::var(name).is_ok() {
        "set"
    } else {
        "-"
    };
    println!("  {name}: {status}");
}
