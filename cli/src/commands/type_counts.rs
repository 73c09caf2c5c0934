//! TYPE-COUNTS command - Count a parent's parts per child type.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use pcm_core::PartTypeCount;

use super::{Envelope, HumanReadable, make_request, output};

/// Arguments for the type-counts command.
#[derive(Args)]
pub struct TypeCountsArgs {
    /// Parent product ID
    pub product_id: String,
}

impl HumanReadable for Envelope<Vec<PartTypeCount>> {
    fn print_human(&self) {
        println!("{}", "Parts by type".green().bold());
        println!("{}", "=".repeat(40));

        let mut total = 0;
        for row in &self.data {
            let kind = row.part_type.as_deref().unwrap_or("(untyped)");
            println!("  {:<24} {:>8}", kind.cyan(), row.count);
            total += row.count;
        }

        println!("{}", "-".repeat(40));
        println!("  {:<24} {:>8}", "Total".bold(), total);
    }
}

/// Execute the type-counts command.
pub async fn execute(
    client: &reqwest::Client,
    base_url: &str,
    human: bool,
    args: TypeCountsArgs,
) -> Result<()> {
    let url = format!(
        "{}/v4/products/{}/parts/type-counts",
        base_url, args.product_id
    );
    let response: Envelope<Vec<PartTypeCount>> = make_request(client.get(&url)).await?;

    output(&response, human)
}
