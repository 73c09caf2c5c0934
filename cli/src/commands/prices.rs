//! PRICES command - Price totals of products matching a rule filter.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use pcm_core::PriceAggregate;
use serde_json::json;

use super::rules::parse_rules;
use super::{Envelope, HumanReadable, make_request, output};

/// Arguments for the prices command.
#[derive(Args)]
pub struct PricesArgs {
    /// Product type (book, chapter, creativeWork, ...)
    #[arg(long = "type")]
    pub product_type: String,

    /// Rule filter as a JSON object
    #[arg(long, default_value = "{}")]
    pub rules: String,
}

impl HumanReadable for Envelope<Vec<PriceAggregate>> {
    fn print_human(&self) {
        println!("{}", "Prices".green().bold());
        println!("{}", "=".repeat(56));

        if self.data.is_empty() {
            println!("  {}", "(No matching prices)".dimmed());
            return;
        }

        println!(
            "  {:<10} {:<10} {:>14} {:>14}",
            "Currency".cyan(),
            "Type".cyan(),
            "Total".cyan(),
            "Products".cyan()
        );
        for row in &self.data {
            println!(
                "  {:<10} {:<10} {:>14.2} {:>14}",
                row.currency, row.price_type_code, row.price, row.product_count
            );
        }
    }
}

/// Execute the prices command.
pub async fn execute(
    client: &reqwest::Client,
    base_url: &str,
    human: bool,
    args: PricesArgs,
) -> Result<()> {
    let body = json!({
        "productType": args.product_type,
        "rules": parse_rules(&args.rules)?,
    });

    let url = format!("{}/v4/products/rules/prices", base_url);
    let response: Envelope<Vec<PriceAggregate>> =
        make_request(client.post(&url).json(&body)).await?;
    output(&response, human)
}
