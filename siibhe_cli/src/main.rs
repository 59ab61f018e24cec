mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::output::OutputFormat;

#[derive(Parser)]
#[command(name = "siibhe")]
#[command(about = "Query issued fee invoices (boletas de honorarios) from the SII portal")]
struct Cli {
    /// Output format: table or json
    #[arg(long, default_value = "table", global = true)]
    output: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Annual summary of issued invoices, month by month
    Annual(commands::annual::AnnualArgs),
    /// Invoices issued in one month
    Monthly(commands::monthly::MonthlyArgs),
    /// Download the PDF of one invoice
    Pdf(commands::pdf::PdfArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("siibhe=info".parse()?),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let format = match cli.output.as_str() {
        "json" => OutputFormat::Json,
        _ => OutputFormat::Table,
    };

    let client = commands::connect().await?;

    match &cli.command {
        Commands::Annual(args) => commands::annual::run(args, &client, &format).await?,
        Commands::Monthly(args) => commands::monthly::run(args, &client, &format).await?,
        Commands::Pdf(args) => commands::pdf::run(args, &client).await?,
    }

    Ok(())
}
