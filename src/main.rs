use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use dialoguer::{Confirm, Input, Password, Select};
use tracing_subscriber::EnvFilter;

use parley::providers::SettingValue;
use parley::voice::console::{ConsoleRecognizer, ConsoleSynthesizer};
use parley::{Assistant, Config, ProviderConfig, ProviderRegistry, network};

/// Parley - Conversation engine for voice and text assistants
#[derive(Parser)]
#[command(name = "parley", version, about)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, env = "PARLEY_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive first-run setup
    Init,
    /// Manage provider configurations
    Provider {
        #[command(subcommand)]
        command: ProviderCommand,
    },
    /// Update individual settings
    Set {
        /// Default provider name
        #[arg(long)]
        provider: Option<String>,
        /// Conversation language tag (e.g., "zh-CN")
        #[arg(long)]
        language: Option<String>,
        /// Speech rate in words per minute
        #[arg(long)]
        speech_rate: Option<u32>,
        /// Playback volume (0.0 to 1.0)
        #[arg(long)]
        volume: Option<f32>,
    },
    /// Check configuration, provider, and network health
    Diagnose,
}

#[derive(Subcommand)]
enum ProviderCommand {
    /// Add or replace a named provider configuration
    Add {
        /// Name to register the provider under
        name: String,
        /// Provider kind (openai, azure)
        #[arg(short, long, default_value = "openai")]
        kind: String,
    },
    /// Remove a named provider configuration
    Remove {
        /// Name of the provider to remove
        name: String,
    },
    /// List configured providers with masked credentials
    List,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,parley=info",
        1 => "info,parley=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config.as_deref();

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::Init => cmd_init(config_path),
            Command::Provider { command } => match command {
                ProviderCommand::Add { name, kind } => {
                    cmd_provider_add(config_path, &name, &kind)
                }
                ProviderCommand::Remove { name } => {
                    cmd_provider_remove(config_path, &name)
                }
                ProviderCommand::List => cmd_provider_list(config_path),
            },
            Command::Set {
                provider,
                language,
                speech_rate,
                volume,
            } => cmd_set(config_path, provider, language, speech_rate, volume),
            Command::Diagnose => cmd_diagnose(config_path).await,
        };
    }

    let config = Config::load(config_path)?;
    tracing::debug!(?config, "loaded configuration");

    chat(config).await
}

/// Run the conversation loop on stdin/stdout.
async fn chat(config: Config) -> anyhow::Result<()> {
    let registry = ProviderRegistry::with_builtins();
    let provider_config = config
        .provider_config(&config.default_provider)
        .ok_or_else(|| {
            anyhow::anyhow!(
                "provider '{}' is not configured; run `parley init` or `parley provider add {}`",
                config.default_provider,
                config.default_provider
            )
        })?;
    let provider = registry.build(provider_config)?;

    tracing::info!(
        provider = %config.default_provider,
        kind = provider.kind(),
        "starting assistant"
    );

    let recognizer = Box::new(ConsoleRecognizer::new(config.listen_timeout()));
    let synthesizer = Box::new(ConsoleSynthesizer::new(config.name.clone()));

    let mut assistant = Assistant::new(config, provider, recognizer, synthesizer);
    let result = assistant.run().await;
    // Persist history even when the loop ended in an error
    assistant.stop().await?;
    result?;
    Ok(())
}

/// Interactive first-run setup: pick a provider, collect its credentials,
/// write the config file.
fn cmd_init(config_path: Option<&Path>) -> anyhow::Result<()> {
    let mut config = Config::load(config_path)?;

    let name: String = Input::new()
        .with_prompt("Assistant name")
        .default(config.name.clone())
        .interact_text()?;
    config.name = name;

    let kinds = ["openai", "azure"];
    let kind_idx = Select::new()
        .with_prompt("Select a provider")
        .items(&kinds)
        .default(0)
        .interact()?;
    let kind = kinds[kind_idx];

    let provider_name: String = Input::new()
        .with_prompt("Name for this provider")
        .default(kind.to_string())
        .interact_text()?;

    let provider_config = prompt_provider_settings(kind, config.provider_config(&provider_name))?;
    config.default_provider = provider_name.clone();
    config.providers.insert(provider_name, provider_config);

    config.enable_monitoring = Confirm::new()
        .with_prompt("Record per-turn performance statistics?")
        .default(config.enable_monitoring)
        .interact()?;

    let path = config.save(config_path)?;
    println!("Configuration written to {}", path.display());
    Ok(())
}

fn cmd_provider_add(config_path: Option<&Path>, name: &str, kind: &str) -> anyhow::Result<()> {
    let registry = ProviderRegistry::with_builtins();
    if !registry.contains(kind) {
        anyhow::bail!("unknown provider kind: {kind}");
    }

    let mut config = Config::load(config_path)?;
    let provider_config = prompt_provider_settings(kind, config.provider_config(name))?;

    // Validate before persisting
    registry.build(&provider_config)?;

    config.providers.insert(name.to_string(), provider_config);
    if config.providers.len() == 1 {
        config.default_provider = name.to_string();
    }

    let path = config.save(config_path)?;
    println!("Provider '{name}' saved to {}", path.display());
    Ok(())
}

fn cmd_provider_remove(config_path: Option<&Path>, name: &str) -> anyhow::Result<()> {
    let mut config = Config::load(config_path)?;
    if config.providers.remove(name).is_none() {
        anyhow::bail!("provider '{name}' is not configured");
    }
    if config.default_provider == name {
        config.default_provider = config.providers.keys().next().cloned().unwrap_or_default();
    }
    let path = config.save(config_path)?;
    println!("Provider '{name}' removed from {}", path.display());
    Ok(())
}

fn cmd_provider_list(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = Config::load(config_path)?;
    if config.providers.is_empty() {
        println!("No providers configured; run `parley provider add <name>`.");
        return Ok(());
    }

    for (name, provider) in &config.providers {
        let default_marker = if *name == config.default_provider {
            " (default)"
        } else {
            ""
        };
        println!("{name}{default_marker} [{}]", provider.kind);
        for (key, value) in &provider.settings {
            let shown = match value {
                SettingValue::Text(text) if is_secret_key(key) => mask_key(text),
                SettingValue::Text(text) => text.clone(),
                SettingValue::Number(n) => n.to_string(),
            };
            println!("  {key} = {shown}");
        }
    }
    Ok(())
}

fn cmd_set(
    config_path: Option<&Path>,
    provider: Option<String>,
    language: Option<String>,
    speech_rate: Option<u32>,
    volume: Option<f32>,
) -> anyhow::Result<()> {
    let mut config = Config::load(config_path)?;

    if let Some(provider) = provider {
        if !config.providers.contains_key(&provider) {
            anyhow::bail!("provider '{provider}' is not configured");
        }
        config.default_provider = provider;
    }
    if let Some(language) = language {
        config.language = language;
    }
    if let Some(speech_rate) = speech_rate {
        config.speech_rate = speech_rate;
    }
    if let Some(volume) = volume {
        if !(0.0..=1.0).contains(&volume) {
            anyhow::bail!("volume must be between 0.0 and 1.0");
        }
        config.volume = volume;
    }

    let path = config.save(config_path)?;
    println!("Configuration updated at {}", path.display());
    Ok(())
}

async fn cmd_diagnose(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = Config::load(config_path)?;
    let mut healthy = true;

    let registry = ProviderRegistry::with_builtins();
    match config.provider_config(&config.default_provider) {
        Some(provider_config) => match registry.build(provider_config) {
            Ok(provider) => println!(
                "provider: ok ('{}' [{}])",
                config.default_provider,
                provider.kind()
            ),
            Err(e) => {
                println!("provider: FAILED ({e})");
                healthy = false;
            }
        },
        None => {
            println!(
                "provider: FAILED ('{}' is not configured)",
                config.default_provider
            );
            healthy = false;
        }
    }

    if network::check_connection(&config.connectivity_probe_url, config.network_timeout()).await {
        println!("network: ok ({})", config.connectivity_probe_url);
    } else {
        println!("network: FAILED ({})", config.connectivity_probe_url);
        healthy = false;
    }

    match std::fs::create_dir_all(&config.data_dir) {
        Ok(()) => println!("data dir: ok ({})", config.data_dir.display()),
        Err(e) => {
            println!("data dir: FAILED ({}: {e})", config.data_dir.display());
            healthy = false;
        }
    }

    if healthy {
        println!("all checks passed");
        Ok(())
    } else {
        anyhow::bail!("one or more checks failed")
    }
}

/// Prompt for the settings a provider kind requires, keeping an existing
/// credential when the prompt is left blank.
fn prompt_provider_settings(
    kind: &str,
    existing: Option<&ProviderConfig>,
) -> anyhow::Result<ProviderConfig> {
    let existing_key = existing.and_then(|p| p.text_setting("api_key"));

    let prompt = existing_key.map_or_else(
        || "API key".to_string(),
        |key| format!("API key (current: {}, leave blank to keep)", mask_key(key)),
    );
    let key_input = Password::new()
        .with_prompt(&prompt)
        .allow_empty_password(true)
        .interact()?;
    let api_key = if key_input.is_empty() {
        existing_key.map(str::to_string).unwrap_or_default()
    } else {
        key_input
    };
    if api_key.is_empty() {
        anyhow::bail!("an API key is required");
    }

    let mut provider = ProviderConfig::new(kind).with_setting("api_key", SettingValue::Text(api_key));

    match kind {
        "openai" => {
            let default_model = existing
                .and_then(|p| p.text_setting("model"))
                .unwrap_or("gpt-4o");
            let model: String = Input::new()
                .with_prompt("Model")
                .default(default_model.to_string())
                .interact_text()?;
            provider = provider.with_setting("model", SettingValue::Text(model));
        }
        "azure" => {
            let endpoint: String = Input::new()
                .with_prompt("Azure endpoint (https://<resource>.openai.azure.com)")
                .default(
                    existing
                        .and_then(|p| p.text_setting("endpoint"))
                        .unwrap_or_default()
                        .to_string(),
                )
                .interact_text()?;
            let deployment: String = Input::new()
                .with_prompt("Deployment name")
                .default(
                    existing
                        .and_then(|p| p.text_setting("deployment_name"))
                        .unwrap_or_default()
                        .to_string(),
                )
                .interact_text()?;
            provider = provider
                .with_setting("endpoint", SettingValue::Text(endpoint))
                .with_setting("deployment_name", SettingValue::Text(deployment));
        }
        _ => {}
    }

    Ok(provider)
}

fn is_secret_key(key: &str) -> bool {
    key.contains("key") || key.contains("secret") || key.contains("token")
}

fn mask_key(key: &str) -> String {
    // Char-wise so multibyte credentials never split a boundary
    let chars: Vec<char> = key.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    } else {
        "****".to_string()
    }
}
