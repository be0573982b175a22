//! fitlink-cli: command line client for the Fitlink exercise link API
//!
//! Talks to the server's HTTP endpoints; every command maps to one request.
//!
//! # Subcommands
//! - `list <exercise> [--link-type <type>] [--json]`
//! - `create <exercise> <target> <link_type> [--display-order <n>]`
//! - `update <exercise> <link_id> --display-order <n> [--inactive]`
//! - `delete <exercise> <link_id> [--keep-reverse]`
//! - `suggest <exercise> [-n <count>]`
//! - `status`

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

const DEFAULT_SERVER: &str = "http://127.0.0.1:8780";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "fitlink-cli",
    version,
    about = "Manage warmup, cooldown and alternative links between exercises"
)]
struct Cli {
    /// Fitlink HTTP server URL (overrides FITLINK_HTTP_URL env var)
    #[arg(long, env = "FITLINK_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List the active outgoing links of an exercise
    List {
        /// Source exercise id
        exercise: String,

        /// Only show links of this type (WARMUP, COOLDOWN, WORKOUT, ALTERNATIVE)
        #[arg(long)]
        link_type: Option<String>,

        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },

    /// Create a link from an exercise to a target
    Create {
        /// Source exercise id
        exercise: String,

        /// Target exercise id
        target: String,

        /// WARMUP, COOLDOWN or ALTERNATIVE
        link_type: String,

        /// Position among the source's links of this type
        #[arg(long)]
        display_order: Option<i64>,
    },

    /// Change the display order of a link, or deactivate it
    Update {
        /// Source exercise id that owns the link
        exercise: String,

        /// Link id
        link_id: String,

        #[arg(long)]
        display_order: i64,

        /// Mark the link inactive
        #[arg(long)]
        inactive: bool,
    },

    /// Delete a link (and its mirrored reverse unless --keep-reverse)
    Delete {
        /// Source exercise id that owns the link
        exercise: String,

        /// Link id
        link_id: String,

        #[arg(long)]
        keep_reverse: bool,
    },

    /// Show the most used links as suggestions
    Suggest {
        /// Exercise id the suggestions are for
        exercise: String,

        /// Number of suggestions (1-20)
        #[arg(short = 'n', long)]
        count: Option<i64>,
    },

    /// Show Fitlink server status
    Status,
}

// ============================================================================
// API Types
// ============================================================================

/// A link as returned by the HTTP API
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkDto {
    pub id: String,
    pub source_exercise_id: String,
    pub target_exercise_id: String,
    pub link_type: String,
    pub display_order: u32,
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkListDto {
    pub exercise_id: String,
    pub links: Vec<LinkDto>,
    pub total_count: usize,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorDto {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct ErrorBodyDto {
    #[serde(default)]
    pub errors: Vec<ApiErrorDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateBody<'a> {
    target_exercise_id: &'a str,
    link_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    display_order: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateBody {
    display_order: i64,
    is_active: bool,
}

// ============================================================================
// URL building and formatting
// ============================================================================

fn links_url(server: &str, exercise: &str) -> String {
    format!("{}/api/exercises/{}/links", server, exercise)
}

fn link_url(server: &str, exercise: &str, link_id: &str) -> String {
    format!("{}/{}", links_url(server, exercise), link_id)
}

fn list_url(server: &str, exercise: &str, link_type: Option<&str>) -> String {
    match link_type {
        Some(t) => format!("{}?linkType={}", links_url(server, exercise), t.to_uppercase()),
        None => links_url(server, exercise),
    }
}

fn suggest_url(server: &str, exercise: &str, count: Option<i64>) -> String {
    let base = format!("{}/suggested", links_url(server, exercise));
    match count {
        Some(n) => format!("{}?count={}", base, n),
        None => base,
    }
}

fn delete_url(server: &str, exercise: &str, link_id: &str, keep_reverse: bool) -> String {
    let base = link_url(server, exercise, link_id);
    if keep_reverse {
        format!("{}?deleteReverse=false", base)
    } else {
        base
    }
}

/// One line per link: `#order TYPE target (id)`.
fn format_link(link: &LinkDto) -> String {
    let state = if link.is_active { "" } else { " [inactive]" };
    format!(
        "#{:<3} {:<12} -> {}  ({}){}",
        link.display_order, link.link_type, link.target_exercise_id, link.id, state
    )
}

/// Render the `errors` array of a failed response, falling back to the status.
fn format_errors(status: u16, body: &str) -> String {
    let parsed: ErrorBodyDto = serde_json::from_str(body).unwrap_or_default();
    if parsed.errors.is_empty() {
        return format!("request failed (HTTP {})", status);
    }
    parsed
        .errors
        .iter()
        .map(|e| format!("[{}] {}", e.code, e.message))
        .collect::<Vec<_>>()
        .join("\n")
}

// ============================================================================
// Commands
// ============================================================================

fn client() -> anyhow::Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()?)
}

/// Send a request; on a non-success status print the API errors and exit.
fn send(req: reqwest::blocking::RequestBuilder, url: &str) -> reqwest::blocking::Response {
    let resp = match req.send() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("fitlink-cli: cannot reach {}: {}", url, e);
            std::process::exit(1);
        }
    };

    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let body = resp.text().unwrap_or_default();
        eprintln!("fitlink-cli: {}", format_errors(status, &body));
        std::process::exit(1);
    }
    resp
}

fn do_list(server: &str, exercise: &str, link_type: Option<&str>, json: bool) -> anyhow::Result<()> {
    let url = list_url(server, exercise, link_type);
    let resp = send(client()?.get(&url), &url);

    if json {
        let body: serde_json::Value = resp.json()?;
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    let list: LinkListDto = resp.json()?;
    if list.links.is_empty() {
        eprintln!("No links for exercise {}", list.exercise_id);
        return Ok(());
    }
    for link in &list.links {
        println!("{}", format_link(link));
    }
    println!("\n{} link(s)", list.total_count);
    Ok(())
}

fn do_create(
    server: &str,
    exercise: &str,
    target: &str,
    link_type: &str,
    display_order: Option<i64>,
) -> anyhow::Result<()> {
    let url = links_url(server, exercise);
    let link_type = link_type.to_uppercase();
    let body = CreateBody {
        target_exercise_id: target,
        link_type: &link_type,
        display_order,
    };
    let link: LinkDto = send(client()?.post(&url).json(&body), &url).json()?;
    println!("Created {}", format_link(&link));
    Ok(())
}

fn do_update(
    server: &str,
    exercise: &str,
    link_id: &str,
    display_order: i64,
    inactive: bool,
) -> anyhow::Result<()> {
    let url = link_url(server, exercise, link_id);
    let body = UpdateBody {
        display_order,
        is_active: !inactive,
    };
    let link: LinkDto = send(client()?.put(&url).json(&body), &url).json()?;
    println!("Updated {}", format_link(&link));
    Ok(())
}

fn do_delete(server: &str, exercise: &str, link_id: &str, keep_reverse: bool) -> anyhow::Result<()> {
    let url = delete_url(server, exercise, link_id, keep_reverse);
    send(client()?.delete(&url), &url);
    println!("Deleted {}", link_id);
    Ok(())
}

fn do_suggest(server: &str, exercise: &str, count: Option<i64>) -> anyhow::Result<()> {
    let url = suggest_url(server, exercise, count);
    let links: Vec<LinkDto> = send(client()?.get(&url), &url).json()?;
    if links.is_empty() {
        eprintln!("No suggestions yet");
        return Ok(());
    }
    for link in &links {
        println!("{}", format_link(link));
    }
    Ok(())
}

/// Show the server status by calling GET /health.
fn do_status(server: &str) -> anyhow::Result<()> {
    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()?;

    let url = format!("{}/health", server);
    match client.get(&url).send() {
        Ok(r) if r.status().is_success() => {
            let body: serde_json::Value = r.json().unwrap_or_default();
            println!("Fitlink server: {}", body["status"].as_str().unwrap_or("unknown"));
            println!("Version:        {}", body["version"].as_str().unwrap_or("?"));
            println!("Storage:        {}", body["storage"].as_str().unwrap_or("?"));
            if let Some(pg) = body["postgresql"].as_str() {
                println!("PostgreSQL:     {}", pg);
            }
            println!("Socket:         {}", body["socket"].as_str().unwrap_or("?"));
        }
        Ok(r) => {
            eprintln!("fitlink-cli: server unhealthy (HTTP {})", r.status());
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("fitlink-cli: cannot reach {}: {}", url, e);
            std::process::exit(1);
        }
    }

    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();

    let result = match cli.command {
        Commands::List { exercise, link_type, json } => {
            do_list(&server, &exercise, link_type.as_deref(), json)
        }
        Commands::Create { exercise, target, link_type, display_order } => {
            do_create(&server, &exercise, &target, &link_type, display_order)
        }
        Commands::Update { exercise, link_id, display_order, inactive } => {
            do_update(&server, &exercise, &link_id, display_order, inactive)
        }
        Commands::Delete { exercise, link_id, keep_reverse } => {
            do_delete(&server, &exercise, &link_id, keep_reverse)
        }
        Commands::Suggest { exercise, count } => do_suggest(&server, &exercise, count),
        Commands::Status => do_status(&server),
    };

    if let Err(e) = result {
        eprintln!("fitlink-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================
