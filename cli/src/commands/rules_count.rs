//! RULES-COUNT command - Count products matching a rule filter.

use anyhow::Result;
use clap::Args;
use serde_json::json;

use super::count::CountData;
use super::rules::parse_rules;
use super::{Envelope, make_request, output};

/// Arguments for the rules-count command.
#[derive(Args)]
pub struct RulesCountArgs {
    /// Product type (book, chapter, creativeWork, ...)
    #[arg(long = "type")]
    pub product_type: String,

    /// Rule filter as a JSON object
    #[arg(long, default_value = "{}")]
    pub rules: String,
}

/// Execute the rules-count command.
pub async fn execute(
    client: &reqwest::Client,
    base_url: &str,
    human: bool,
    args: RulesCountArgs,
) -> Result<()> {
    let url = format!("{}/v4/products/rules/count", base_url);
    let body = json!({
        "productType": args.product_type,
        "rules": parse_rules(&args.rules)?,
    });

    let response: Envelope<CountData> = make_request(client.post(&url).json(&body)).await?;
    output(&response, human)
}
