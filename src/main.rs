use clap::{Arg, ArgMatches, Command};
use std::env;
use std::fmt::Display;
use std::process;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod relay;
mod server;
mod utils;

use server::config::RelayConfig;
use server::router::RelayServer;
use utils::gemini::GeminiService;

/// Prints a formatted box with the given lines
/// Empty strings create empty lines, other strings are centered within the box
fn print_box(lines: &[&str]) {
    const BOX_WIDTH: usize = 60; // Total width including borders
    const CONTENT_WIDTH: usize = BOX_WIDTH - 4; // Width for content (excluding "║  " and "  ║")

    eprintln!("\n\x1b[36m╔{}╗", "═".repeat(BOX_WIDTH - 2));

    for line in lines {
        if line.is_empty() {
            // Empty line
            eprintln!("║{}║", " ".repeat(BOX_WIDTH - 2));
        } else {
            // Visible width in chars, ignoring ANSI escape codes
            let visible_len = strip_ansi_codes(line).chars().count();

            if visible_len < CONTENT_WIDTH {
                // Center the text
                let total_padding = CONTENT_WIDTH - visible_len;
                let left_padding = total_padding / 2;
                let right_padding = total_padding - left_padding;

                eprintln!(
                    "║  {}{}{}\x1b[36m║",
                    " ".repeat(left_padding),
                    line,
                    " ".repeat(right_padding)
                );
            } else {
                // Text is too long, just fit it
                eprintln!("║  {}\x1b[36m  ║", line);
            }
        }
    }

    eprintln!("╚{}╝\x1b[0m\n", "═".repeat(BOX_WIDTH - 2));
}

/// Strips ANSI escape codes to calculate visible text length
fn strip_ansi_codes(text: &str) -> String {
    let mut result = String::new();
    let mut chars = text.chars();

    while let Some(ch) = chars.next() {
        if ch == '\x1b' {
            // Skip escape sequence
            if chars.next() == Some('[') {
                for c in chars.by_ref() {
                    if c.is_ascii_alphabetic() {
                        break;
                    }
                }
            }
        } else {
            result.push(ch);
        }
    }

    result
}

fn build_cli() -> Command {
    Command::new("pdf-relay")
        .version(env!("CARGO_PKG_VERSION"))
        .about("HTTP relay from PDF, ZIP and text uploads to the Gemini API")
        .long_about(
            "This server exposes the following endpoints:\n\
            - POST /relay/pdf  (alias /ocr-pdf-gemini): prompt + apiKey + one PDF, returns text\n\
            - POST /relay/zip  (alias /ocr-zip-gemini): prompt + apiKey + ZIP of PDFs, returns a JSON array\n\
            - POST /relay/text (alias /query): JSON {prompt, query, apiKey}, returns text\n\
            - GET  /health\n\
            The API key is taken from each request and never stored.",
        )
        .arg(
            Arg::new("host")
                .long("host")
                .value_name("ADDR")
                .help("Address to bind (env: HOST, default 0.0.0.0)")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("port")
                .long("port")
                .short('p')
                .value_name("PORT")
                .help("Port to listen on (env: PORT, default 3000)")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("pdf-model")
                .long("pdf-model")
                .value_name("MODEL")
                .help("Model for PDF and ZIP uploads (env: RELAY_PDF_MODEL)")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("text-model")
                .long("text-model")
                .value_name("MODEL")
                .help("Model for text queries (env: RELAY_TEXT_MODEL)")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("max-output-tokens")
                .long("max-output-tokens")
                .value_name("N")
                .help("Output token cap for document calls (env: RELAY_MAX_OUTPUT_TOKENS)")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("provider-endpoint")
                .long("provider-endpoint")
                .value_name("URL")
                .help("Base URL of the generateContent API (env: RELAY_PROVIDER_ENDPOINT)")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .value_name("SECS")
                .help("Timeout for each model call in seconds (env: RELAY_TIMEOUT_SECS)")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("body-limit-mb")
                .long("body-limit-mb")
                .value_name("MB")
                .help("Maximum upload size in MiB (env: RELAY_BODY_LIMIT_MB)")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("quiet")
                .long("quiet")
                .short('q')
                .help("Suppress the banner and log errors only")
                .action(clap::ArgAction::SetTrue),
        )
}

/// Reads a setting from the command line, then the environment.
fn setting<T>(matches: &ArgMatches, id: &str, env_key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = matches
        .get_one::<String>(id)
        .cloned()
        .or_else(|| env::var(env_key).ok());

    match raw {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("invalid value '{}' for {}: {}", value, id, e)),
        None => Ok(None),
    }
}

fn load_config(matches: &ArgMatches) -> anyhow::Result<RelayConfig> {
    let defaults = RelayConfig::default();

    let timeout_secs: Option<u64> = setting(matches, "timeout", "RELAY_TIMEOUT_SECS")?;
    let body_limit_mb: Option<usize> = setting(matches, "body-limit-mb", "RELAY_BODY_LIMIT_MB")?;
    let body_limit_bytes = match body_limit_mb {
        Some(mb) => mb
            .checked_mul(1024 * 1024)
            .ok_or_else(|| anyhow::anyhow!("value {} for body-limit-mb is too large", mb))?,
        None => defaults.body_limit_bytes,
    };

    Ok(RelayConfig {
        host: setting(matches, "host", "HOST")?.unwrap_or(defaults.host),
        port: setting(matches, "port", "PORT")?.unwrap_or(defaults.port),
        pdf_model: setting(matches, "pdf-model", "RELAY_PDF_MODEL")?
            .unwrap_or(defaults.pdf_model),
        text_model: setting(matches, "text-model", "RELAY_TEXT_MODEL")?
            .unwrap_or(defaults.text_model),
        max_output_tokens: setting(matches, "max-output-tokens", "RELAY_MAX_OUTPUT_TOKENS")?
            .unwrap_or(defaults.max_output_tokens),
        provider_endpoint: setting(matches, "provider-endpoint", "RELAY_PROVIDER_ENDPOINT")?
            .unwrap_or(defaults.provider_endpoint),
        provider_timeout: timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(defaults.provider_timeout),
        body_limit_bytes,
    })
}

#[tokio::main]
async fn main() {
    let matches = build_cli().get_matches();
    let quiet = matches.get_flag("quiet");

    // RUST_LOG wins; otherwise info, or errors only in quiet mode
    let default_level = if quiet { "error" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    let config = match load_config(&matches) {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            process::exit(1);
        }
    };

    if config.provider_endpoint != utils::gemini::DEFAULT_ENDPOINT {
        warn!("Using custom provider endpoint: {}", config.provider_endpoint);
    }
    info!(
        "Models: documents={} (max {} tokens), text={}",
        config.pdf_model, config.max_output_tokens, config.text_model
    );

    let provider = match GeminiService::new(&config.provider_endpoint, config.provider_timeout) {
        Ok(service) => Arc::new(service),
        Err(e) => {
            error!("Failed to create HTTP client: {}", e);
            process::exit(1);
        }
    };

    if !quiet {
        let address = format!("http://{}", config.bind_address());
        print_box(&[
            "",
            "\x1b[1m\x1b[31m PDF Relay \x1b[0m",
            "",
            "\x1b[0m PDF, ZIP and text relay to Gemini \x1b[0m",
            "",
            address.as_str(),
            "",
        ]);
    }

    info!("Starting relay server...");

    let server = RelayServer::new(config, provider);
    if let Err(e) = server.start().await {
        error!("Failed to start server: {:#}", e);
        process::exit(1);
    }
}
