use std::path::PathBuf;

use siibhe_lib::{decode_latin1, parse_annual_report, parse_monthly_report, EvalOptions, ExtractionError};

fn fixture(name: &str) -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name);
    let bytes = std::fs::read(&path).unwrap_or_else(|e| panic!("reading {}: {}", path.display(), e));
    decode_latin1(&bytes)
}

#[test]
fn annual_fixture() {
    let report = parse_annual_report(&fixture("anual.html"), &EvalOptions::default()).unwrap();

    assert_eq!(report.taxpayer_name, "LUIS FRANCISCO BARRA SANDOVAL");
    assert_eq!(report.rut, "12345678-5");
    assert_eq!(report.year, 2025);
    assert!(!report.is_professional_partnership);
    assert_eq!(report.totals.issued_count, 8);
    assert_eq!(report.totals.voided_count, 1);
    assert_eq!(report.totals.gross_fee, 1_058_744);
    assert_eq!(report.totals.third_party_withholding, 134_990);
    assert_eq!(report.totals.net_amount, 923_754);
    assert_eq!(report.totals.start_folio, Some(1));
    assert_eq!(report.totals.end_folio, Some(8));

    assert_eq!(report.months.len(), 12);
    assert_eq!(report.months[0].month, "Ene");
    assert_eq!(report.months[11].month, "Dic");
    assert_eq!(report.months[0].issued_count, 1);
    assert_eq!(report.months[0].gross_fee, 123_244);

    // No invoices in March: folio bounds are blank, not zero.
    let march = &report.months[2];
    assert_eq!(march.issued_count, 0);
    assert_eq!(march.start_folio, None);
    assert_eq!(march.end_folio, None);

    let issued: i64 = report.months.iter().map(|m| m.issued_count).sum();
    assert_eq!(issued, report.totals.issued_count);
}

#[test]
fn monthly_fixture() {
    let report = parse_monthly_report(&fixture("mensual.html"), None, &EvalOptions::default()).unwrap();

    assert_eq!(report.taxpayer_name, "LUIS FRANCISCO BARRA SANDOVAL");
    assert_eq!(report.year, 2025);
    assert_eq!(report.month, 1);
    assert_eq!(report.total_invoices, 1);
    assert_eq!(report.invoices.len(), 1);
    assert_eq!(report.total_fees, 123_244);
    assert_eq!(report.total_recipient_withholding, 15_713);
    assert_eq!(report.total_net_amount, 107_531);

    let invoice = &report.invoices[0];
    assert_eq!(invoice.number, 3);
    assert_eq!(invoice.issuer, "USUARIO");
    assert_eq!(invoice.issue_date, "15/01/2025");
    assert_eq!(invoice.recipient_rut, "76543210-K");
    assert_eq!(invoice.recipient_name, "EMPRESA SPA");
    assert_eq!(invoice.total_fee, 123_244);
    assert_eq!(invoice.net_amount, 107_531);
    assert_eq!(invoice.status, "VIGENTE");
    assert_eq!(invoice.barcode, "12345678AAAAAAAAABB");
    assert_eq!(invoice.void_date, None);
    assert!(!invoice.has_pdf_handle());
}

#[test]
fn parsing_is_deterministic() {
    let html = fixture("anual.html");
    let options = EvalOptions::default();
    let first = parse_annual_report(&html, &options).unwrap();
    let second = parse_annual_report(&html, &options).unwrap();
    assert_eq!(first, second);
}

#[test]
fn wrong_page_is_an_extraction_error() {
    // The annual page has no invoice rows.
    let err = parse_monthly_report(&fixture("anual.html"), None, &EvalOptions::default()).unwrap_err();
    assert!(matches!(err, ExtractionError::ScriptNotFound { .. }));
}

#[test]
fn reports_serialize_to_json() {
    let report = parse_monthly_report(&fixture("mensual.html"), None, &EvalOptions::default()).unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["invoices"][0]["barcode"], "12345678AAAAAAAAABB");
    assert_eq!(json["invoices"][0]["total_fee"], 123_244);
}
