//! RULES command - Find products matching a rule filter.

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use colored::Colorize;
use serde::Serialize;

use super::{Envelope, HumanReadable, make_request, output, split_list, truncate};

/// Sort direction by product id.
#[derive(Clone, Copy, Debug, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sort {
    Asc,
    Desc,
}

/// Arguments for the rules command.
#[derive(Args)]
pub struct RulesArgs {
    /// Product type (book, chapter, creativeWork, ...)
    #[arg(long = "type")]
    pub product_type: String,

    /// Rule filter as a JSON object, e.g. '{"subject":"maths"}'
    #[arg(long, default_value = "{}")]
    pub rules: String,

    /// Comma-separated field paths to return
    #[arg(long)]
    pub projections: Option<String>,

    /// Project the first availability entry with this channel name
    #[arg(long)]
    pub availability_name: Option<String>,

    /// Comma-separated channel names; availability is narrowed to these
    #[arg(long)]
    pub availability: Option<String>,

    /// Number of products to skip
    #[arg(long)]
    pub offset: Option<i64>,

    /// Maximum number of products to return
    #[arg(long)]
    pub limit: Option<i64>,

    /// Sort order by product id
    #[arg(long, value_enum, default_value = "desc")]
    pub sort: Sort,
}

#[derive(Debug, Serialize)]
struct Channel {
    name: String,
}

/// Request body for POST /v4/products/rules.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RuleQueryBody {
    product_type: String,
    rules: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    projections: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    availability_name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    availability: Vec<Channel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<i64>,
    sort_order: Sort,
}

impl RulesArgs {
    fn body(&self) -> Result<RuleQueryBody> {
        Ok(RuleQueryBody {
            product_type: self.product_type.clone(),
            rules: parse_rules(&self.rules)?,
            projections: self.projections.as_deref().map(split_list),
            availability_name: self.availability_name.clone(),
            availability: self
                .availability
                .as_deref()
                .map(split_list)
                .unwrap_or_default()
                .into_iter()
                .map(|name| Channel { name })
                .collect(),
            offset: self.offset,
            limit: self.limit,
            sort_order: self.sort,
        })
    }
}

/// Parse the `--rules` argument as JSON.
pub fn parse_rules(rules: &str) -> Result<serde_json::Value> {
    serde_json::from_str(rules).context("--rules must be valid JSON")
}

impl HumanReadable for Envelope<Vec<serde_json::Value>> {
    fn print_human(&self) {
        println!("{}", "Products".green().bold());
        println!("{}", "=".repeat(80));

        if self.data.is_empty() {
            println!("  {}", "(No matching products)".dimmed());
            return;
        }

        for product in &self.data {
            let id = product.get("_id").and_then(|v| v.as_str()).unwrap_or("?");
            let title = product
                .get("title")
                .and_then(|v| v.as_str())
                .map(|t| truncate(t, 60))
                .unwrap_or_default();
            println!("  {} {}", id.bold(), title);

            if let Some(channels) = product.get("availability").and_then(|v| v.as_array()) {
                let names: Vec<&str> = channels
                    .iter()
                    .filter_map(|c| c.get("name").and_then(|n| n.as_str()))
                    .collect();
                println!("    {} {}", "Availability:".cyan(), names.join(", "));
            }
        }

        println!();
        println!("  {} {}", "Returned:".cyan(), self.data.len());
    }
}

/// Execute the rules command.
pub async fn execute(
    client: &reqwest::Client,
    base_url: &str,
    human: bool,
    args: RulesArgs,
) -> Result<()> {
    let url = format!("{}/v4/products/rules", base_url);
    let body = args.body()?;

    let response: Envelope<Vec<serde_json::Value>> =
        make_request(client.post(&url).json(&body)).await?;
    output(&response, human)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_body_serialize() {
        let args = RulesArgs {
            product_type: "book".into(),
            rules: r#"{"subject":"maths"}"#.into(),
            projections: Some("title,subject".into()),
            availability_name: None,
            availability: Some("UBX,EBK".into()),
            offset: None,
            limit: Some(10),
            sort: Sort::Asc,
        };
        let body = serde_json::to_value(args.body().unwrap()).unwrap();
        assert_eq!(
            body,
            json!({
                "productType": "book",
                "rules": { "subject": "maths" },
                "projections": ["title", "subject"],
                "availability": [{ "name": "UBX" }, { "name": "EBK" }],
                "limit": 10,
                "sortOrder": "asc",
            })
        );
    }

    #[test]
    fn test_bad_rules_json() {
        assert!(parse_rules("{subject: maths}").is_err());
    }
}
