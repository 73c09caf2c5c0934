//! Command implementations for the pcm CLI.
//!
//! Each command module provides:
//! - Args struct for clap argument parsing
//! - execute() function that performs the command
//! - Human-readable and JSON output formatting

pub mod count;
pub mod part;
pub mod parts;
pub mod prices;
pub mod product;
pub mod rules;
pub mod rules_count;
pub mod type_counts;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Common error type for HTTP requests.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },
}

/// `{ "data": ..., "metadata": ... }` body returned by the `/v4` routes.
#[derive(Debug, Deserialize, Serialize)]
pub struct Envelope<T> {
    pub data: T,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Build the HTTP client used by all commands.
pub fn build_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .user_agent(concat!("pcm-cli/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Print output in JSON or human-readable format.
pub fn output<T: Serialize + HumanReadable>(value: &T, human: bool) -> Result<()> {
    if human {
        value.print_human();
    } else {
        println!("{}", serde_json::to_string_pretty(value)?);
    }
    Ok(())
}

/// Trait for types that can be printed in human-readable format.
pub trait HumanReadable {
    fn print_human(&self);
}

/// Make an HTTP request and handle common error cases.
pub async fn make_request<T: serde::de::DeserializeOwned>(
    request: reqwest::RequestBuilder,
) -> Result<T, CliError> {
    let response = request.send().await?;
    let status = response.status();

    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }

    let body = response.text().await.unwrap_or_default();
    Err(CliError::Server {
        status: status.as_u16(),
        message: error_message(&body),
    })
}

/// Pull `error.message` out of a JSON error body, else return the body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| {
            json.pointer("/error/message")
                .and_then(|v| v.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

/// Split a comma-separated list, dropping empty items.
pub fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Truncate a string for display, adding ellipsis if needed.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
