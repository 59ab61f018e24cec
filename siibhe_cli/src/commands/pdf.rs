use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use siibhe_lib::{BheClient, InvoiceDetail, MonthlyReport};

#[derive(Args)]
#[command(group(clap::ArgGroup::new("invoice").required(true).args(["index", "barcode"])))]
pub struct PdfArgs {
    /// Month the invoice was issued in, 1-12
    #[arg(long)]
    pub month: u32,

    /// Year the invoice was issued in (defaults to the current year)
    #[arg(long)]
    pub year: Option<i32>,

    /// Position of the invoice in the monthly report, starting at 1
    #[arg(long)]
    pub index: Option<usize>,

    /// Barcode of the invoice
    #[arg(long)]
    pub barcode: Option<String>,

    /// Output file (defaults to <barcode>.pdf)
    #[arg(long)]
    pub out: Option<PathBuf>,
}

pub async fn run(args: &PdfArgs, client: &BheClient) -> Result<()> {
    let month = super::validate_month(args.month)?;
    let year = args.year.unwrap_or_else(super::current_year);
    let report = client.monthly_report(year, month).await?;

    let invoice = select_invoice(&report, args.index, args.barcode.as_deref())?;
    let pdf = invoice.get_pdf().await?;

    let path = args
        .out
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("{}.pdf", invoice.barcode)));
    pdf.save(&path)
        .with_context(|| format!("writing {}", path.display()))?;
    eprintln!(
        "Saved invoice {} ({} bytes) to {}",
        invoice.number,
        pdf.len(),
        path.display()
    );
    Ok(())
}

fn select_invoice<'a>(
    report: &'a MonthlyReport,
    index: Option<usize>,
    barcode: Option<&str>,
) -> Result<&'a InvoiceDetail> {
    match (index, barcode) {
        (Some(index), _) => index
            .checked_sub(1)
            .and_then(|i| report.invoices.get(i))
            .with_context(|| {
                format!(
                    "no invoice at position {} (the month has {})",
                    index,
                    report.invoices.len()
                )
            }),
        (None, Some(barcode)) => report
            .invoice_by_barcode(barcode)
            .with_context(|| format!("no invoice with barcode {}", barcode)),
        (None, None) => anyhow::bail!("either --index or --barcode is required"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> MonthlyReport {
        let json = serde_json::json!({
            "taxpayer_name": "ANA",
            "rut": "1-9",
            "year": 2025,
            "month": 1,
            "total_invoices": 2,
            "total_fees": 0,
            "total_issuer_withholding": 0,
            "total_recipient_withholding": 0,
            "total_net_amount": 0,
            "invoices": [invoice(1, "AAA"), invoice(2, "BBB")],
        });
        serde_json::from_value(json).unwrap()
    }

    fn invoice(number: i64, barcode: &str) -> serde_json::Value {
        serde_json::json!({
            "number": number,
            "issuer": "",
            "issue_date": "",
            "recipient_rut": "",
            "recipient_name": "",
            "total_fee": 0,
            "issuer_withholding": 0,
            "recipient_withholding": 0,
            "net_amount": 0,
            "status": "VIGENTE",
            "barcode": barcode,
            "void_date": null,
        })
    }

    #[test]
    fn selects_by_index_or_barcode() {
        let report = report();
        assert_eq!(select_invoice(&report, Some(2), None).unwrap().barcode, "BBB");
        assert_eq!(select_invoice(&report, None, Some("AAA")).unwrap().number, 1);
    }

    #[test]
    fn out_of_range_selection_fails() {
        let report = report();
        assert!(select_invoice(&report, Some(0), None).is_err());
        assert!(select_invoice(&report, Some(3), None).is_err());
        assert!(select_invoice(&report, None, Some("ZZZ")).is_err());
        assert!(select_invoice(&report, None, None).is_err());
    }
}
