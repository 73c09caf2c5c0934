//! PARTS-COUNT command - Count a parent's parts.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde::{Deserialize, Serialize};

use super::{Envelope, HumanReadable, make_request, output};

/// Arguments for the parts-count command.
#[derive(Args)]
pub struct CountArgs {
    /// Parent product ID
    pub product_id: String,

    /// Only count parts of this type (case-insensitive)
    #[arg(long = "type")]
    pub part_type: Option<String>,

    /// Only count parts with this exact format
    #[arg(long)]
    pub format: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CountData {
    pub count: u64,
}

impl HumanReadable for Envelope<CountData> {
    fn print_human(&self) {
        println!("{} {}", "Count:".cyan(), self.data.count.to_string().bold());
    }
}

/// Execute the parts-count command.
pub async fn execute(
    client: &reqwest::Client,
    base_url: &str,
    human: bool,
    args: CountArgs,
) -> Result<()> {
    let url = format!("{}/v4/products/{}/parts/count", base_url, args.product_id);

    let mut query = Vec::new();
    if let Some(t) = &args.part_type {
        query.push(("partType", t.as_str()));
    }
    if let Some(f) = &args.format {
        query.push(("format", f.as_str()));
    }

    let response: Envelope<CountData> = make_request(client.get(&url).query(&query)).await?;
    output(&response, human)
}
