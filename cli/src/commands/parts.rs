//! PARTS command - Page through a parent's parts.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use pcm_core::HasPart;

use super::{Envelope, HumanReadable, make_request, output, truncate};

/// Arguments for the parts command.
#[derive(Args)]
pub struct PartsArgs {
    /// Parent product ID
    pub product_id: String,

    /// Number of parts to skip
    #[arg(long)]
    pub offset: Option<i64>,

    /// Maximum number of parts to return
    #[arg(long)]
    pub limit: Option<i64>,

    /// Only parts of this type (case-insensitive)
    #[arg(long = "type")]
    pub part_type: Option<String>,

    /// Only parts with this exact format
    #[arg(long)]
    pub format: Option<String>,

    /// Comma-separated field paths to return (e.g. parts._id,parts.title)
    #[arg(long)]
    pub projections: Option<String>,
}

impl PartsArgs {
    fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(n) = self.offset {
            query.push(("offset", n.to_string()));
        }
        if let Some(n) = self.limit {
            query.push(("limit", n.to_string()));
        }
        if let Some(t) = &self.part_type {
            query.push(("partType", t.clone()));
        }
        if let Some(f) = &self.format {
            query.push(("format", f.clone()));
        }
        if let Some(p) = &self.projections {
            query.push(("projections", p.clone()));
        }
        query
    }
}

impl HumanReadable for Envelope<Vec<HasPart>> {
    fn print_human(&self) {
        println!("{}", "Parts".green().bold());
        println!("{}", "=".repeat(80));

        if self.data.is_empty() {
            println!("  {}", "(No parts)".dimmed());
            return;
        }

        for part in &self.data {
            let position = part
                .position
                .map(|p| format!("{:>4}", p))
                .unwrap_or_else(|| "   -".to_string());
            let kind = part.part_type.as_deref().unwrap_or("?");
            let free = if part.is_free == Some(true) {
                " free".yellow()
            } else {
                "".normal()
            };
            println!(
                "  {} {} {}{}",
                position.dimmed(),
                part.id.as_deref().unwrap_or("-").bold(),
                format!("[{}]", kind).cyan(),
                free
            );
            if let Some(title) = &part.title {
                println!("       {}", truncate(title, 70));
            }
            if let Some(format) = &part.format {
                println!("       {} {}", "Format:".cyan(), format);
            }
        }

        println!();
        println!("  {} {}", "Returned:".cyan(), self.data.len());
    }
}

/// Execute the parts command.
pub async fn execute(
    client: &reqwest::Client,
    base_url: &str,
    human: bool,
    args: PartsArgs,
) -> Result<()> {
    let url = format!("{}/v4/products/{}/parts", base_url, args.product_id);
    let response: Envelope<Vec<HasPart>> =
        make_request(client.get(&url).query(&args.query())).await?;

    output(&response, human)
}
