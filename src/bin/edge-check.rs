use std::path::PathBuf;
use std::sync::Arc;

use axum::http::{header, Request};
use clap::Parser;
use serde::Serialize;

use edge_middleware::config::load_config;
use edge_middleware::observability::logging::init_tracing;
use edge_middleware::{compose_matchers, Diagnostics, EdgeRequest, MatcherSpec};

#[derive(Parser)]
#[command(name = "edge-check")]
#[command(about = "Check which middleware of a chain config apply to a request", long_about = None)]
struct Cli {
    /// Chain configuration file (TOML)
    #[arg(short, long)]
    config: PathBuf,

    /// Request path, with optional query string
    #[arg(short, long, default_value = "/")]
    path: String,

    /// Request header as name=value (repeatable)
    #[arg(long = "header", value_parser = parse_pair)]
    headers: Vec<(String, String)>,

    /// Request cookie as name=value (repeatable)
    #[arg(long = "cookie", value_parser = parse_pair)]
    cookies: Vec<(String, String)>,

    /// Request host
    #[arg(long)]
    host: Option<String>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct EntryReport {
    index: usize,
    handler: String,
    matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct Report {
    path: String,
    entries: Vec<EntryReport>,
    diagnostics: Diagnostics,
}

fn parse_pair(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected name=value, got `{}`", s))
}

fn build_request(cli: &Cli) -> Result<EdgeRequest, Box<dyn std::error::Error>> {
    let mut builder = Request::builder().uri(cli.path.as_str());
    if let Some(host) = &cli.host {
        builder = builder.header(header::HOST, host.as_str());
    }
    for (name, value) in &cli.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    if !cli.cookies.is_empty() {
        let cookie = cli
            .cookies
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("; ");
        builder = builder.header(header::COOKIE, cookie);
    }
    Ok(EdgeRequest::from(&builder.body(())?))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    init_tracing(&config.observability)?;

    let request = Arc::new(build_request(&cli)?);
    let mut diagnostics = Diagnostics::new();
    let mut entries = Vec::with_capacity(config.middleware.len());

    for (index, entry) in config.middleware.iter().enumerate() {
        let matcher = match &entry.matcher {
            Some(matcher) => compose_matchers(&matcher.clone().map(MatcherSpec::from), &mut diagnostics)?,
            None => None,
        };

        let (matched, error) = match matcher {
            None => (true, None),
            Some(matcher) => match matcher.matches(Arc::clone(&request)).await {
                Ok(matched) => (matched, None),
                Err(e) => (false, Some(e.to_string())),
            },
        };

        entries.push(EntryReport {
            index,
            handler: entry.handler.clone(),
            matched,
            error,
        });
    }

    let report = Report {
        path: cli.path,
        entries,
        diagnostics,
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Request: {}", report.path);
    for entry in &report.entries {
        let status = match (&entry.error, entry.matched) {
            (Some(e), _) => format!("error: {}", e),
            (None, true) => "runs".to_string(),
            (None, false) => "skipped".to_string(),
        };
        println!("  [{}] {:<24} {}", entry.index, entry.handler, status);
    }
    for diagnostic in &report.diagnostics {
        println!("  {}", diagnostic);
    }

    Ok(())
}
