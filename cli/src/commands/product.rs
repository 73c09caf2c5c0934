//! PRODUCT command - Show one product.

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::{Envelope, HumanReadable, make_request, output, truncate};

/// Arguments for the product command.
#[derive(Args)]
pub struct ProductArgs {
    /// Product ID
    pub id: String,

    /// Product type (book, chapter, creativeWork, ...)
    #[arg(long = "type")]
    pub product_type: String,

    /// Comma-separated field paths to return
    #[arg(long)]
    pub projections: Option<String>,
}

impl HumanReadable for Envelope<serde_json::Value> {
    fn print_human(&self) {
        let id = self.data.get("_id").and_then(|v| v.as_str()).unwrap_or("?");
        println!("{}", id.green().bold());

        if let Some(fields) = self.data.as_object() {
            for (key, value) in fields.iter().filter(|(k, _)| k.as_str() != "_id") {
                let rendered = match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                println!("  {:<20} {}", format!("{}:", key).cyan(), truncate(&rendered, 60));
            }
        }
    }
}

/// Execute the product command.
pub async fn execute(
    client: &reqwest::Client,
    base_url: &str,
    human: bool,
    args: ProductArgs,
) -> Result<()> {
    let url = format!("{}/v4/products/{}", base_url, args.id);

    let mut query = vec![("productType", args.product_type.as_str())];
    if let Some(p) = &args.projections {
        query.push(("projections", p.as_str()));
    }

    let response: Envelope<serde_json::Value> =
        make_request(client.get(&url).query(&query)).await?;
    output(&response, human)
}
