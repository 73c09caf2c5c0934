//! Command-line interface for the Product Content Management API.
//!
//! Commands:
//! - parts: Page through a parent's parts
//! - parts-count: Count a parent's parts
//! - type-counts: Count a parent's parts per child type
//! - part: Show one part of a parent
//! - product: Show one product
//! - rules: Find products matching a rule filter
//! - rules-count: Count products matching a rule filter
//! - prices: Price totals of products matching a rule filter
//!
//! Configuration via environment:
//! - PCM_URL: Base URL of the pcm server (default: http://localhost:3000)

mod commands;

use clap::{Parser, Subcommand};

use commands::{
    count::CountArgs, part::PartArgs, parts::PartsArgs, prices::PricesArgs,
    product::ProductArgs, rules::RulesArgs, rules_count::RulesCountArgs,
    type_counts::TypeCountsArgs,
};

/// Product Content Management CLI
///
/// Query parts and products from the command line. Prints JSON by default;
/// use --human for formatted output.
#[derive(Parser)]
#[command(name = "pcm")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Output human-readable formatted text instead of JSON
    #[arg(long, global = true)]
    human: bool,

    /// pcm server URL
    #[arg(
        long,
        env = "PCM_URL",
        default_value = "http://localhost:3000",
        global = true
    )]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Page through a parent's parts
    Parts(PartsArgs),

    /// Count a parent's parts
    PartsCount(CountArgs),

    /// Count a parent's parts per child type
    TypeCounts(TypeCountsArgs),

    /// Show one part of a parent
    Part(PartArgs),

    /// Show one product
    Product(ProductArgs),

    /// Find products matching a rule filter
    Rules(RulesArgs),

    /// Count products matching a rule filter
    RulesCount(RulesCountArgs),

    /// Price totals of products matching a rule filter
    Prices(PricesArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let client = match commands::build_client() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let url = cli.url.trim_end_matches('/');
    let result = match cli.command {
        Commands::Parts(args) => commands::parts::execute(&client, url, cli.human, args).await,
        Commands::PartsCount(args) => {
            commands::count::execute(&client, url, cli.human, args).await
        }
        Commands::TypeCounts(args) => {
            commands::type_counts::execute(&client, url, cli.human, args).await
        }
        Commands::Part(args) => commands::part::execute(&client, url, cli.human, args).await,
        Commands::Product(args) => {
            commands::product::execute(&client, url, cli.human, args).await
        }
        Commands::Rules(args) => commands::rules::execute(&client, url, cli.human, args).await,
        Commands::RulesCount(args) => {
            commands::rules_count::execute(&client, url, cli.human, args).await
        }
        Commands::Prices(args) => commands::prices::execute(&client, url, cli.human, args).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
