//! Typed report entities.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use sii_api::AuthError;

/// Something that can download an invoice PDF by barcode.
#[async_trait]
pub trait PdfFetcher: Send + Sync {
    async fn fetch_pdf(&self, barcode: &str) -> Result<Vec<u8>, AuthError>;
}

/// Shared handle to a [`PdfFetcher`], attached to every parsed invoice.
#[derive(Clone)]
pub struct PdfHandle(Arc<dyn PdfFetcher>);

impl PdfHandle {
    pub fn new(fetcher: Arc<dyn PdfFetcher>) -> Self {
        Self(fetcher)
    }

    pub async fn fetch(&self, barcode: &str) -> Result<Vec<u8>, AuthError> {
        self.0.fetch_pdf(barcode).await
    }
}

impl fmt::Debug for PdfHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PdfHandle(..)")
    }
}

/// Figures shared by the annual totals row and each month row.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnualTotals {
    pub gross_fee: i64,
    pub third_party_withholding: i64,
    pub taxpayer_withholding: i64,
    /// First invoice number of the period, `None` when the portal left it blank.
    pub start_folio: Option<i64>,
    /// Last invoice number of the period, `None` when the portal left it blank.
    pub end_folio: Option<i64>,
    pub issued_count: i64,
    pub voided_count: i64,
    pub net_amount: i64,
}

/// One month row of the annual report.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlySummary {
    /// Capitalized Spanish month prefix, e.g. `"Ene"`.
    pub month: String,
    pub gross_fee: i64,
    pub third_party_withholding: i64,
    pub taxpayer_withholding: i64,
    pub start_folio: Option<i64>,
    pub end_folio: Option<i64>,
    pub issued_count: i64,
    pub voided_count: i64,
    pub net_amount: i64,
}

/// Annual report of issued fee invoices.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnualReport {
    pub taxpayer_name: String,
    pub rut: String,
    pub year: i64,
    pub is_professional_partnership: bool,
    pub totals: AnnualTotals,
    /// Always twelve entries, January first.
    pub months: Vec<MonthlySummary>,
}

/// Monthly detail report of issued fee invoices.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MonthlyReport {
    pub taxpayer_name: String,
    pub rut: String,
    pub year: i64,
    pub month: i64,
    pub total_invoices: i64,
    pub total_fees: i64,
    pub total_issuer_withholding: i64,
    pub total_recipient_withholding: i64,
    pub total_net_amount: i64,
    pub invoices: Vec<InvoiceDetail>,
}

impl MonthlyReport {
    pub fn invoice_by_barcode(&self, barcode: &str) -> Option<&InvoiceDetail> {
        self.invoices.iter().find(|i| i.barcode == barcode)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InvoiceDetail {
    pub number: i64,
    pub issuer: String,
    pub issue_date: String,
    pub recipient_rut: String,
    pub recipient_name: String,
    pub total_fee: i64,
    pub issuer_withholding: i64,
    pub recipient_withholding: i64,
    pub net_amount: i64,
    pub status: String,
    pub barcode: String,
    pub void_date: Option<String>,
    #[serde(skip)]
    pub(crate) pdf: Option<PdfHandle>,
}

impl InvoiceDetail {
    /// Attaches (or replaces) the PDF fetch capability.
    pub fn with_pdf_handle(mut self, handle: PdfHandle) -> Self {
        self.pdf = Some(handle);
        self
    }

    pub fn has_pdf_handle(&self) -> bool {
        self.pdf.is_some()
    }

    /// Downloads this invoice's PDF through the session it was parsed with.
    pub async fn get_pdf(&self) -> Result<Pdf, AuthError> {
        let handle = self.pdf.as_ref().ok_or(AuthError::NotAvailable)?;
        let bytes = handle.fetch(&self.barcode).await?;
        Ok(Pdf::new(bytes))
    }
}

/// Downloaded invoice document.
#[derive(Clone, PartialEq, Eq)]
pub struct Pdf {
    content: Vec<u8>,
}

impl Pdf {
    pub fn new(content: Vec<u8>) -> Self {
        Self { content }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.content
    }

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.content)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        std::fs::write(path, &self.content)
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.content
    }
}

impl fmt::Debug for Pdf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pdf").field("len", &self.content.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct FakeFetcher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PdfFetcher for FakeFetcher {
        async fn fetch_pdf(&self, barcode: &str) -> Result<Vec<u8>, AuthError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("%PDF {}", barcode).into_bytes())
        }
    }

    fn invoice(barcode: &str) -> InvoiceDetail {
        InvoiceDetail {
            number: 1,
            issuer: "USR".into(),
            issue_date: "02/01/2025".into(),
            recipient_rut: "76123456-7".into(),
            recipient_name: "EMPRESA SPA".into(),
            total_fee: 100,
            issuer_withholding: 0,
            recipient_withholding: 13,
            net_amount: 87,
            status: "VIGENTE".into(),
            barcode: barcode.into(),
            void_date: None,
            pdf: None,
        }
    }

    #[tokio::test]
    async fn get_pdf_uses_the_attached_handle() {
        let fetcher = Arc::new(FakeFetcher {
            calls: AtomicUsize::new(0),
        });
        let handle = PdfHandle::new(fetcher.clone());
        let invoice = invoice("ABC").with_pdf_handle(handle);

        let pdf = invoice.get_pdf().await.unwrap();
        assert_eq!(pdf.bytes(), b"%PDF ABC");
        assert_eq!(pdf.len(), 8);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn get_pdf_without_handle_is_unavailable() {
        let err = invoice("ABC").get_pdf().await.unwrap_err();
        assert!(matches!(err, AuthError::NotAvailable));
        assert_eq!(
            err.to_string(),
            "SII service is not available to download the PDF"
        );
    }

    #[test]
    fn pdf_views() {
        let pdf = Pdf::new(b"hola".to_vec());
        assert_eq!(pdf.to_base64(), "aG9sYQ==");
        assert!(!pdf.is_empty());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("boleta.pdf");
        pdf.save(&path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"hola");
    }

    #[test]
    fn handle_is_not_serialized() {
        let fetcher = Arc::new(FakeFetcher {
            calls: AtomicUsize::new(0),
        });
        let invoice = invoice("ABC").with_pdf_handle(PdfHandle::new(fetcher));
        let json = serde_json::to_value(&invoice).unwrap();
        assert_eq!(json["barcode"], "ABC");
        assert!(json.get("pdf").is_none());
        assert!(json["void_date"].is_null());
    }
}
