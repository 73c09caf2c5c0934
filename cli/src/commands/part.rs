//! PART command - Show one part of a parent.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use pcm_core::{HasPart, label_text};

use super::{Envelope, HumanReadable, make_request, output};

/// Arguments for the part command.
#[derive(Args)]
pub struct PartArgs {
    /// Parent product ID
    pub product_id: String,

    /// Child product ID
    pub part_id: String,
}

impl HumanReadable for Envelope<HasPart> {
    fn print_human(&self) {
        let part = &self.data;
        println!("{}", part.id.as_deref().unwrap_or("-").green().bold());

        let fields = [
            ("Type", part.part_type.clone()),
            ("Title", part.title.clone()),
            ("Position", part.position.map(|n| n.to_string())),
            ("Level", part.level.map(|n| n.to_string())),
            ("Free", part.is_free.map(|b| b.to_string())),
            ("Format", part.format.clone()),
            ("Pages", match (&part.page_start, &part.page_end) {
                (Some(start), Some(end)) => {
                    Some(format!("{}-{}", label_text(start), label_text(end)))
                }
                (Some(start), None) => Some(label_text(start)),
                _ => None,
            }),
            ("Version", part.version.as_ref().map(label_text)),
        ];
        for (label, value) in fields {
            if let Some(value) = value {
                println!("  {:<10} {}", format!("{}:", label).cyan(), value);
            }
        }
    }
}

/// Execute the part command.
pub async fn execute(
    client: &reqwest::Client,
    base_url: &str,
    human: bool,
    args: PartArgs,
) -> Result<()> {
    let url = format!(
        "{}/v4/products/{}/parts/{}",
        base_url, args.product_id, args.part_id
    );
    let response: Envelope<HasPart> = make_request(client.get(&url)).await?;

    output(&response, human)
}
