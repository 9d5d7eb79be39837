//! # Model Gateway
//!
//! Operator CLI: loads a gateway configuration, resolves a model for a
//! caller and capability, and sends one prompt through it.
//!
//! ## Usage
//!
//! ```bash
//! # Buffered call
//! model-gateway --config gateway.yaml --caller visual-agent --capability chat --prompt "Hello"
//!
//! # Streamed call, printing text as it arrives
//! model-gateway --caller visual-agent --capability chat --prompt "Hello" --stream
//!
//! # Show the resolution without calling the model
//! GATEWAY_CONFIG=/etc/gateway.yaml model-gateway --caller visual-agent --capability chat --resolve-only
//! ```

use anyhow::{bail, Context, Result};
use clap::Parser;
use futures::StreamExt;
use gateway_config::{load_config, DEFAULT_CONFIG_PATH};
use gateway_core::{Capability, GatewayRequest, UnifiedChunk};
use gateway_orchestrator::Gateway;
use gateway_telemetry::init_logging;
use serde_json::json;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

/// Send one request through the model gateway
#[derive(Parser, Debug)]
#[command(name = "model-gateway")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (YAML, TOML or JSON)
    #[arg(short, long, env = "GATEWAY_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Calling client identifier
    #[arg(long)]
    caller: String,

    /// Requested capability (chat, intent, vision, generation, embedding)
    #[arg(long, default_value = "chat")]
    capability: Capability,

    /// User prompt
    #[arg(short, long, required_unless_present = "resolve_only")]
    prompt: Option<String>,

    /// Optional system prompt
    #[arg(long)]
    system: Option<String>,

    /// Stream the response
    #[arg(long)]
    stream: bool,

    /// Model the caller expects (logged, never binding)
    #[arg(long)]
    expected_model: Option<String>,

    /// Request timeout in seconds, overriding the configured one
    #[arg(long)]
    timeout: Option<u64>,

    /// Print the resolution and exit
    #[arg(long)]
    resolve_only: bool,

    /// Print results as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!(error = %e, "Command failed");
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli.config)
        .await
        .with_context(|| format!("failed to load {}", cli.config.display()))?;

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
    }
    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "Starting model gateway"
    );

    let gateway = Gateway::from_config(&config)?;

    if cli.resolve_only {
        return print_resolution(&gateway, &cli).await;
    }

    let Some(prompt) = cli.prompt.as_deref() else {
        bail!("--prompt is required unless --resolve-only is set");
    };

    let mut messages = Vec::new();
    if let Some(system) = &cli.system {
        messages.push(json!({"role": "system", "content": system}));
    }
    messages.push(json!({"role": "user", "content": prompt}));

    let mut builder = GatewayRequest::builder()
        .caller(cli.caller.as_str())
        .capability(cli.capability)
        .body(json!({ "messages": messages }))
        .stream(cli.stream);
    if let Some(model) = &cli.expected_model {
        builder = builder.expected_model(model.as_str());
    }
    if let Some(seconds) = cli.timeout {
        builder = builder.timeout(Duration::from_secs(seconds));
    }
    let request = builder.build()?;

    if cli.stream {
        stream_response(&gateway, request, cli.json).await
    } else {
        let response = gateway.send(request).await?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&response)?);
        } else {
            println!("{}", response.content);
            eprintln!(
                "[{} via {} ({}), {} ms]",
                response.model_id, response.platform_id, response.resolution_type, response.duration_ms
            );
        }
        Ok(())
    }
}

async fn stream_response(gateway: &Gateway, request: GatewayRequest, json: bool) -> Result<()> {
    let mut stream = gateway.stream(request).await?;
    let mut stdout = std::io::stdout();

    while let Some(chunk) = stream.next().await {
        if json {
            println!("{}", serde_json::to_string(&chunk)?);
            continue;
        }
        match chunk {
            UnifiedChunk::Start(start) => {
                eprintln!("[{} via {} ({})]", start.model_id, start.platform_id, start.resolution_type);
            }
            UnifiedChunk::Text { delta } => {
                write!(stdout, "{delta}")?;
                stdout.flush()?;
            }
            UnifiedChunk::Thinking { .. } => {}
            UnifiedChunk::Done { finish_reason, usage } => {
                writeln!(stdout)?;
                eprintln!(
                    "[finish: {}, tokens in/out: {}/{}]",
                    finish_reason.as_deref().unwrap_or("-"),
                    usage.input_tokens.map_or_else(|| "-".to_string(), |n| n.to_string()),
                    usage.output_tokens.map_or_else(|| "-".to_string(), |n| n.to_string()),
                );
            }
            UnifiedChunk::Error { message } => bail!("stream failed: {message}"),
        }
    }
    Ok(())
}

async fn print_resolution(gateway: &Gateway, cli: &Cli) -> Result<()> {
    let resolution = gateway
        .resolve(&cli.caller, cli.capability, cli.expected_model.as_deref())
        .await?;

    let summary = json!({
        "resolution_type": resolution.resolution_type,
        "model_id": resolution.actual_model(),
        "platform_id": resolution.target.as_ref().map(|t| t.platform.id.as_str()),
        "pool_name": resolution.target.as_ref().and_then(|t| t.pool_name.as_deref()),
        "is_fallback": resolution.is_fallback,
        "fallback_reason": resolution.fallback_reason,
        "expected_model_matched": resolution.matches_expected(),
        "error": resolution.error,
    });

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        match resolution.actual_model() {
            Some(model) => println!("{} -> {model} ({})", cli.capability, resolution.resolution_type),
            None => println!(
                "{} -> not found: {}",
                cli.capability,
                resolution.error.as_deref().unwrap_or("-")
            ),
        }
    }
    Ok(())
}
