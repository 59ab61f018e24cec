use serde::Serialize;
use siibhe_lib::{AnnualReport, MonthlyReport, MonthlySummary};
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Clone, Debug)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Tabled, Serialize)]
struct MonthRow {
    #[tabled(rename = "Month")]
    #[serde(rename = "Month")]
    month: String,
    #[tabled(rename = "Gross")]
    #[serde(rename = "Gross")]
    gross_fee: String,
    #[tabled(rename = "3rd-party WH")]
    #[serde(rename = "3rd-party WH")]
    third_party_withholding: String,
    #[tabled(rename = "Own WH")]
    #[serde(rename = "Own WH")]
    taxpayer_withholding: String,
    #[tabled(rename = "Folios")]
    #[serde(rename = "Folios")]
    folios: String,
    #[tabled(rename = "Issued")]
    #[serde(rename = "Issued")]
    issued: i64,
    #[tabled(rename = "Voided")]
    #[serde(rename = "Voided")]
    voided: i64,
    #[tabled(rename = "Net")]
    #[serde(rename = "Net")]
    net_amount: String,
}

#[derive(Tabled, Serialize)]
struct InvoiceRow {
    #[tabled(rename = "No.")]
    #[serde(rename = "No.")]
    number: i64,
    #[tabled(rename = "Date")]
    #[serde(rename = "Date")]
    issue_date: String,
    #[tabled(rename = "Recipient RUT")]
    #[serde(rename = "Recipient RUT")]
    recipient_rut: String,
    #[tabled(rename = "Recipient")]
    #[serde(rename = "Recipient")]
    recipient_name: String,
    #[tabled(rename = "Fee")]
    #[serde(rename = "Fee")]
    total_fee: String,
    #[tabled(rename = "Withholding")]
    #[serde(rename = "Withholding")]
    withholding: String,
    #[tabled(rename = "Net")]
    #[serde(rename = "Net")]
    net_amount: String,
    #[tabled(rename = "Status")]
    #[serde(rename = "Status")]
    status: String,
    #[tabled(rename = "Barcode")]
    #[serde(rename = "Barcode")]
    barcode: String,
}

// -- Row builders --

fn month_row(m: &MonthlySummary) -> MonthRow {
    MonthRow {
        month: m.month.clone(),
        gross_fee: format_amount(m.gross_fee),
        third_party_withholding: format_amount(m.third_party_withholding),
        taxpayer_withholding: format_amount(m.taxpayer_withholding),
        folios: format_folios(m.start_folio, m.end_folio),
        issued: m.issued_count,
        voided: m.voided_count,
        net_amount: format_amount(m.net_amount),
    }
}

fn build_annual_rows(report: &AnnualReport) -> Vec<MonthRow> {
    let t = &report.totals;
    let mut rows: Vec<MonthRow> = report.months.iter().map(month_row).collect();
    rows.push(MonthRow {
        month: "Total".to_string(),
        gross_fee: format_amount(t.gross_fee),
        third_party_withholding: format_amount(t.third_party_withholding),
        taxpayer_withholding: format_amount(t.taxpayer_withholding),
        folios: format_folios(t.start_folio, t.end_folio),
        issued: t.issued_count,
        voided: t.voided_count,
        net_amount: format_amount(t.net_amount),
    });
    rows
}

fn build_invoice_rows(report: &MonthlyReport) -> Vec<InvoiceRow> {
    report
        .invoices
        .iter()
        .map(|i| InvoiceRow {
            number: i.number,
            issue_date: i.issue_date.clone(),
            recipient_rut: i.recipient_rut.clone(),
            recipient_name: i.recipient_name.clone(),
            total_fee: format_amount(i.total_fee),
            withholding: format_amount(i.issuer_withholding + i.recipient_withholding),
            net_amount: format_amount(i.net_amount),
            status: match &i.void_date {
                Some(date) => format!("{} ({})", i.status, date),
                None => i.status.clone(),
            },
            barcode: i.barcode.clone(),
        })
        .collect()
}

// -- Printers --

pub fn print_annual_table(report: &AnnualReport) {
    let mut table = Table::new(build_annual_rows(report));
    table.with(Style::rounded());
    println!("{}", table);
}

pub fn print_invoices_table(report: &MonthlyReport) {
    let mut table = Table::new(build_invoice_rows(report));
    table.with(Style::rounded());
    println!("{}", table);
}

pub fn print_json<T: serde::Serialize>(data: &T) {
    match serde_json::to_string_pretty(data) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize to JSON: {}", e),
    }
}

/// Chilean peso amount with `.` thousands separators, e.g. `$1.234.567`.
fn format_amount(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }
    if value < 0 {
        format!("-${}", grouped)
    } else {
        format!("${}", grouped)
    }
}

fn format_folios(start: Option<i64>, end: Option<i64>) -> String {
    match (start, end) {
        (Some(s), Some(e)) if s == e => s.to_string(),
        (Some(s), Some(e)) => format!("{}-{}", s, e),
        (Some(s), None) => format!("{}-", s),
        (None, Some(e)) => format!("-{}", e),
        (None, None) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use siibhe_lib::{map_annual_report, map_monthly_report, RawFieldMap, RawValue};

    fn fields(pairs: &[(&str, &str)]) -> RawFieldMap {
        pairs
            .iter()
            .map(|(k, v)| (*k, RawValue::Text(v.to_string())))
            .collect()
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(0), "$0");
        assert_eq!(format_amount(999), "$999");
        assert_eq!(format_amount(1_000), "$1.000");
        assert_eq!(format_amount(123_244), "$123.244");
        assert_eq!(format_amount(1_058_744), "$1.058.744");
        assert_eq!(format_amount(-15_713), "-$15.713");
    }

    #[test]
    fn test_format_folios() {
        assert_eq!(format_folios(Some(1), Some(8)), "1-8");
        assert_eq!(format_folios(Some(3), Some(3)), "3");
        assert_eq!(format_folios(None, None), "");
    }

    #[test]
    fn test_annual_rows_end_with_total() {
        let report = map_annual_report(&fields(&[("tot6", "8"), ("ene6", "1"), ("ene1", "123.244")]));
        let rows = build_annual_rows(&report);
        assert_eq!(rows.len(), 13);
        assert_eq!(rows[0].month, "Ene");
        assert_eq!(rows[0].gross_fee, "$123.244");
        assert_eq!(rows[12].month, "Total");
        assert_eq!(rows[12].issued, 8);
    }

    #[test]
    fn test_invoice_table_headers() {
        let globals = fields(&[("total_boletas", "1")]);
        let invoices = fields(&[
            ("nroboleta_1", "3"),
            ("nombrereceptor_1", "EMPRESA SPA"),
            ("estado_1", "ANULADA"),
            ("fechaanulacion_1", "20/01/2025"),
        ]);
        let report = map_monthly_report(&globals, &invoices, None);
        let rows = build_invoice_rows(&report);
        assert_eq!(rows[0].status, "ANULADA (20/01/2025)");

        let mut table = Table::new(&rows);
        table.with(Style::markdown());
        let md = table.to_string();
        let header = md.lines().next().unwrap();
        assert!(header.contains("Recipient"));
        assert!(header.contains("Barcode"));
        assert!(md.contains("EMPRESA SPA"));
    }
}
