use anyhow::Result;
use clap::Args;
use siibhe_lib::BheClient;

use crate::output::{print_invoices_table, print_json, OutputFormat};

#[derive(Args)]
pub struct MonthlyArgs {
    /// Month number, 1-12
    #[arg(long)]
    pub month: u32,

    /// Report year (defaults to the current year)
    #[arg(long)]
    pub year: Option<i32>,
}

pub async fn run(args: &MonthlyArgs, client: &BheClient, format: &OutputFormat) -> Result<()> {
    let month = super::validate_month(args.month)?;
    let year = args.year.unwrap_or_else(super::current_year);
    let report = client.monthly_report(year, month).await?;

    match format {
        OutputFormat::Table => {
            eprintln!(
                "{} ({}), {}-{:02}: {} invoices",
                report.taxpayer_name, report.rut, report.year, report.month, report.total_invoices
            );
            print_invoices_table(&report);
        }
        OutputFormat::Json => print_json(&report),
    }

    Ok(())
}
