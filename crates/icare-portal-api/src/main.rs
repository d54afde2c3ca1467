//! iCare portal API entry point.

use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use icare_portal::{Engine, PropertyRecord, SearchQuery, TaxSummary};
use icare_portal_api::config::{resolve_listen_addr, resolve_portal_config};
use icare_portal_api::types::{SearchResponse, TaxSummaryResponse};

#[derive(Parser)]
#[command(
    name = "icare-portal-api",
    about = "Fairfax County iCare property search and tax summaries as JSON",
    version
)]
struct Cli {
    /// Portal base URL (overrides ICARE_BASE_URL).
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Print results as JSON instead of plain text.
    #[arg(long, global = true)]
    json: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the REST API server (default).
    Serve {
        /// Listen address (host:port). Also reads ICARE_ADDR.
        #[arg(long)]
        addr: Option<String>,
    },

    /// Search properties by street address.
    Search {
        /// Street name; may be empty to match on the other fields.
        #[arg(long)]
        street: String,

        /// House number.
        #[arg(long, default_value = "")]
        number: String,

        /// Street suffix (ST, RD, DR, ...).
        #[arg(long, default_value = "")]
        suffix: String,

        /// Unit or apartment.
        #[arg(long, default_value = "")]
        unit: String,

        /// Results per page.
        #[arg(long)]
        page_size: Option<String>,
    },

    /// Search properties by map number, e.g. "0812 03 0026".
    Map {
        /// Map number (PARID), spaced or as ten digits.
        map_number: String,
    },

    /// Fetch the tax summary behind a search result's DetailURL.
    Tax {
        /// DetailURL from a search result.
        detail_url: String,
    },

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   icare-portal-api completions bash > ~/.local/share/bash-completion/completions/icare-portal-api
    ///   icare-portal-api completions zsh > ~/.zfunc/_icare-portal-api
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let engine = Engine::new(resolve_portal_config(cli.base_url.as_deref()));

    match cli.command.unwrap_or(Commands::Serve { addr: None }) {
        Commands::Serve { addr } => {
            let addr = resolve_listen_addr(addr.as_deref());
            tracing::info!("iCare portal API");
            icare_portal_api::serve(&addr, Arc::new(engine)).await?;
        }

        Commands::Search {
            street,
            number,
            suffix,
            unit,
            page_size,
        } => {
            let mut query = SearchQuery::street(street)
                .number(number)
                .suffix(suffix)
                .unit(unit);
            if let Some(page_size) = page_size {
                query = query.page_size(page_size);
            }
            let records = engine.search(&query.to_portal_case()).await?;
            print_records(records, cli.json)?;
        }

        Commands::Map { map_number } => {
            let records = engine.search_map_number(&map_number).await?;
            print_records(records, cli.json)?;
        }

        Commands::Tax { detail_url } => {
            let summary = engine.tax_summary(&detail_url).await?;
            print_summary(summary, cli.json)?;
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "icare-portal-api", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn print_records(records: Vec<PropertyRecord>, json: bool) -> anyhow::Result<()> {
    if json {
        let response = SearchResponse::new(records);
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No matching properties.");
        return Ok(());
    }

    println!("{} propert{} found", records.len(), if records.len() == 1 { "y" } else { "ies" });
    for record in &records {
        println!();
        println!("  Map #:            {}", record.map_number);
        println!("  Owner:            {}", record.owner);
        println!("  Property Address: {}", record.property_address);
        println!("  Last Sale:        {}", record.last_sale);
        println!("  DetailURL:        {}", record.detail_url);
    }
    Ok(())
}

fn print_summary(summary: TaxSummary, json: bool) -> anyhow::Result<()> {
    if json {
        let response = TaxSummaryResponse::from(summary);
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    println!("{}", summary.title);
    println!("  Stub number:   {}", summary.stub_number);
    println!("  Tax year code: {}", summary.tax_year_code);
    println!();
    println!("  {:<8} {:<24} {:>14} {:>14}", "Year", "", "Amount Paid", "Balance Due");
    for period in summary.periods.iter().chain(std::iter::once(&summary.total)) {
        println!(
            "  {:<8} {:<24} {:>14} {:>14}",
            period.year,
            period.label,
            period.amount_paid.display(),
            period.balance_due.display()
        );
    }

    for warning in &summary.warnings {
        eprintln!("warning: {}", serde_json::to_string(warning)?);
    }
    Ok(())
}
