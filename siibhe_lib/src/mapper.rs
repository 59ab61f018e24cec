//! Turns raw script field maps into report entities.
//!
//! Mapping never fails: absent, empty or malformed numeric fields fall back
//! to a default, and folio bounds fall back to `None`.

use crate::error::ExtractionError;
use crate::models::{AnnualReport, AnnualTotals, InvoiceDetail, MonthlyReport, MonthlySummary, PdfHandle};
use crate::raw::{RawFieldMap, RawValue};
use crate::script::{extract_object, EvalOptions};

/// Variable holding annual totals and the monthly report globals.
pub const XML_VALUES: &str = "xml_values";
/// Variable holding the monthly invoice rows.
pub const ARR_INFORME_MENSUAL: &str = "arr_informe_mensual";

/// Field prefixes of the month rows, January first.
pub const MONTH_PREFIXES: [&str; 12] = [
    "ene", "feb", "mar", "abr", "may", "jun", "jul", "ago", "sep", "oct", "nov", "dic",
];

/// Parses a portal number: trimmed, `.` thousands separators removed.
fn parse_int(value: Option<&RawValue>) -> Option<Result<i64, String>> {
    let text = value?.as_text();
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let digits = text.replace('.', "");
    Some(digits.parse::<i64>().map_err(|_| text.to_string()))
}

/// Integer value of a field, or `default` when absent, empty or unparseable.
pub fn coerce_int(value: Option<&RawValue>, default: i64) -> i64 {
    match parse_int(value) {
        Some(Ok(n)) => n,
        Some(Err(text)) => {
            tracing::trace!("Unparseable number {:?}, using {}", text, default);
            default
        }
        None => default,
    }
}

/// Integer value of a field, or `None` when absent, empty or unparseable.
pub fn coerce_opt_int(value: Option<&RawValue>) -> Option<i64> {
    match parse_int(value)? {
        Ok(n) => Some(n),
        Err(text) => {
            tracing::trace!("Unparseable number {:?}, leaving it empty", text);
            None
        }
    }
}

fn int(map: &RawFieldMap, key: &str) -> i64 {
    coerce_int(map.get(key), 0)
}

fn opt_int(map: &RawFieldMap, key: &str) -> Option<i64> {
    coerce_opt_int(map.get(key))
}

fn trimmed(map: &RawFieldMap, key: &str) -> String {
    map.text(key).trim().to_string()
}

fn rut(map: &RawFieldMap, number: &str, dv: &str) -> String {
    format!("{}-{}", map.text(number), map.text(dv))
}

fn capitalize(prefix: &str) -> String {
    let mut chars = prefix.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn month_summary(map: &RawFieldMap, prefix: &str) -> MonthlySummary {
    let field = |n: u8| format!("{}{}", prefix, n);
    MonthlySummary {
        month: capitalize(prefix),
        gross_fee: int(map, &field(1)),
        third_party_withholding: int(map, &field(2)),
        taxpayer_withholding: int(map, &field(3)),
        start_folio: opt_int(map, &field(4)),
        end_folio: opt_int(map, &field(5)),
        issued_count: int(map, &field(6)),
        voided_count: int(map, &field(7)),
        net_amount: int(map, &format!("sum{}", prefix)),
    }
}

pub fn map_annual_report(data: &RawFieldMap) -> AnnualReport {
    let totals = AnnualTotals {
        gross_fee: int(data, "tot1"),
        third_party_withholding: int(data, "tot2"),
        taxpayer_withholding: int(data, "tot3"),
        start_folio: opt_int(data, "tot4"),
        end_folio: opt_int(data, "tot5"),
        issued_count: int(data, "tot6"),
        voided_count: int(data, "tot7"),
        net_amount: int(data, "sumtot"),
    };

    AnnualReport {
        taxpayer_name: trimmed(data, "nombre_contribuyente"),
        rut: rut(data, "rut_arrastre", "dv_arrastre"),
        year: int(data, "anio_consulta"),
        is_professional_partnership: data.text("es_sociedad_profesionales") == "SI",
        totals,
        months: MONTH_PREFIXES
            .iter()
            .map(|prefix| month_summary(data, prefix))
            .collect(),
    }
}

fn invoice(rows: &RawFieldMap, index: i64, pdf: Option<&PdfHandle>) -> InvoiceDetail {
    let field = |name: &str| format!("{}_{}", name, index);
    let void_date = rows.text(&field("fechaanulacion"));
    InvoiceDetail {
        number: int(rows, &field("nroboleta")),
        issuer: trimmed(rows, &field("usuemisor")),
        issue_date: rows.text(&field("fechaemision")),
        recipient_rut: rut(rows, &field("rutreceptor"), &field("dvreceptor")),
        recipient_name: trimmed(rows, &field("nombrereceptor")),
        total_fee: int(rows, &field("totalhonorarios")),
        issuer_withholding: int(rows, &field("retencion_emisor")),
        recipient_withholding: int(rows, &field("retencion_receptor")),
        net_amount: int(rows, &field("honorariosliquidos")),
        status: rows.text(&field("estado")),
        barcode: rows.text(&field("codigobarras")),
        void_date: if void_date.trim().is_empty() {
            None
        } else {
            Some(void_date)
        },
        pdf: pdf.cloned(),
    }
}

/// Builds a monthly report from the globals object and the invoice rows.
///
/// Exactly `total_boletas` invoices are read, indices `1..=total_boletas`;
/// rows past that count are ignored.
pub fn map_monthly_report(
    globals: &RawFieldMap,
    rows: &RawFieldMap,
    pdf: Option<PdfHandle>,
) -> MonthlyReport {
    let total_invoices = int(globals, "total_boletas");
    let present = rows.keys().filter(|k| k.starts_with("nroboleta_")).count();
    if total_invoices > present as i64 {
        tracing::warn!(
            "total_boletas is {} but only {} invoice rows are present; missing rows map to defaults",
            total_invoices,
            present
        );
    }
    let invoices = (1..=total_invoices)
        .map(|index| invoice(rows, index, pdf.as_ref()))
        .collect();

    MonthlyReport {
        taxpayer_name: trimmed(globals, "nombre_contribuyente"),
        rut: rut(globals, "rut_arrastre", "dv_arrastre"),
        year: int(globals, "anio_consulta"),
        month: int(globals, "mes_consulta"),
        total_invoices,
        total_fees: int(globals, "suma_honorarios"),
        total_issuer_withholding: int(globals, "suma_retencion_emisor"),
        total_recipient_withholding: int(globals, "suma_retencion_receptor"),
        total_net_amount: int(globals, "suma_liquido"),
        invoices,
    }
}

/// Parses the annual report page.
pub fn parse_annual_report(html: &str, options: &EvalOptions) -> Result<AnnualReport, ExtractionError> {
    let data = extract_object(html, XML_VALUES, options)?;
    Ok(map_annual_report(&data))
}

/// Parses the monthly report page, attaching `pdf` to every invoice.
pub fn parse_monthly_report(
    html: &str,
    pdf: Option<PdfHandle>,
    options: &EvalOptions,
) -> Result<MonthlyReport, ExtractionError> {
    let globals = extract_object(html, XML_VALUES, options)?;
    let rows = extract_object(html, ARR_INFORME_MENSUAL, options)?;
    Ok(map_monthly_report(&globals, &rows, pdf))
}
