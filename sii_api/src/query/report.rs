//! Query strings of the fee invoice report CGIs.
//!
//! The CGIs take the taxpayer RUT "dragged" along (`rut_arrastre`,
//! `dv_arrastre`) plus the period being asked for.

use url::Url;

use super::Query;
use crate::types::Rut;

/// Annual report of issued fee invoices.
pub struct AnnualReportQuery<'a> {
    pub rut: &'a Rut,
    pub year: i32,
}

impl Query for AnnualReportQuery<'_> {
    fn add_to_url(&self, url: &Url) -> Url {
        let mut url = url.clone();
        url.query_pairs_mut()
            .append_pair("rut_arrastre", self.rut.number())
            .append_pair("dv_arrastre", self.rut.dv())
            .append_pair("cbanoinformeanual", &self.year.to_string());
        url
    }
}

/// Monthly detail report of issued fee invoices. Only the first result page
/// is requested.
pub struct MonthlyReportQuery<'a> {
    pub rut: &'a Rut,
    pub year: i32,
    pub month: u32,
}

impl Query for MonthlyReportQuery<'_> {
    fn add_to_url(&self, url: &Url) -> Url {
        let mut url = url.clone();
        url.query_pairs_mut()
            .append_pair("cbanoinformemensual", &self.year.to_string())
            .append_pair("cbmesinformemensual", &format!("{:02}", self.month))
            .append_pair("dv_arrastre", self.rut.dv())
            .append_pair("pagina_solicitada", "0")
            .append_pair("rut_arrastre", self.rut.number());
        url
    }
}

/// Original rendering of one invoice, keyed by its barcode.
pub struct PdfQuery<'a> {
    pub barcode: &'a str,
}

impl Query for PdfQuery<'_> {
    fn add_to_url(&self, url: &Url) -> Url {
        let mut url = url.clone();
        url.query_pairs_mut()
            .append_pair("txt_codigobarras", self.barcode)
            .append_pair("veroriginal", "si")
            .append_pair("origen", "PROPIOS")
            .append_pair("enviar", "si");
        url
    }
}
