use anyhow::Result;
use clap::Args;
use siibhe_lib::BheClient;

use crate::output::{print_annual_table, print_json, OutputFormat};

#[derive(Args)]
pub struct AnnualArgs {
    /// Report year (defaults to the current year)
    #[arg(long)]
    pub year: Option<i32>,
}

pub async fn run(args: &AnnualArgs, client: &BheClient, format: &OutputFormat) -> Result<()> {
    let year = args.year.unwrap_or_else(super::current_year);
    let report = client.annual_report(year).await?;

    match format {
        OutputFormat::Table => {
            eprintln!(
                "{} ({}), year {}{}",
                report.taxpayer_name,
                report.rut,
                report.year,
                if report.is_professional_partnership {
                    ", professional partnership"
                } else {
                    ""
                }
            );
            print_annual_table(&report);
        }
        OutputFormat::Json => print_json(&report),
    }

    Ok(())
}
