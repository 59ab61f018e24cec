//! Logged-in facade over the session client and the report parsers.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use sii_api::types::{Credentials, Rut};
use sii_api::{AuthError, Client, Endpoints};

use crate::error::BheError;
use crate::mapper::{parse_annual_report, parse_monthly_report};
use crate::models::{AnnualReport, MonthlyReport, PdfFetcher, PdfHandle};
use crate::script::EvalOptions;

#[async_trait]
impl PdfFetcher for Client {
    async fn fetch_pdf(&self, barcode: &str) -> Result<Vec<u8>, AuthError> {
        self.download_invoice_pdf(barcode).await
    }
}

/// Result of [`BheClient::issued_invoices`].
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum IssuedInvoices {
    Annual(AnnualReport),
    Monthly(MonthlyReport),
}

/// Authenticated entry point: one taxpayer, one portal session.
///
/// Invoices returned by [`BheClient::monthly_report`] keep a handle on this
/// session, so their PDFs can be fetched after the report is returned.
pub struct BheClient {
    session: Arc<Client>,
    options: EvalOptions,
}

impl BheClient {
    /// Logs in against the production portal. `rut` is `"12.345.678-9"` style text.
    pub async fn login(rut: &str, password: &str) -> Result<Self, BheError> {
        Self::login_with_endpoints(rut, password, Endpoints::production()).await
    }

    /// Logs in against custom endpoints. Used for testing with wiremock.
    pub async fn login_with_endpoints(
        rut: &str,
        password: &str,
        endpoints: Endpoints,
    ) -> Result<Self, BheError> {
        let rut: Rut = rut.parse()?;
        let credentials = Credentials::new(rut, password)?;
        Self::login_with_credentials(credentials, endpoints).await
    }

    /// Logs in with prepared credentials, e.g. carrying initial cookies.
    pub async fn login_with_credentials(
        credentials: Credentials,
        endpoints: Endpoints,
    ) -> Result<Self, BheError> {
        let session = Client::with_endpoints(credentials, endpoints)?;
        session.login().await?;
        Ok(Self {
            session: Arc::new(session),
            options: EvalOptions::from_env(),
        })
    }

    /// Replaces the script evaluation bounds.
    pub fn with_eval_options(mut self, options: EvalOptions) -> Self {
        self.options = options;
        self
    }

    pub fn session(&self) -> &Client {
        &self.session
    }

    fn pdf_handle(&self) -> PdfHandle {
        PdfHandle::new(self.session.clone())
    }

    pub async fn annual_report(&self, year: i32) -> Result<AnnualReport, BheError> {
        let html = self.session.annual_report_html(year).await?;
        let report = parse_annual_report(&html, &self.options)?;
        tracing::info!("Annual report {} parsed for {}", year, report.rut);
        Ok(report)
    }

    pub async fn monthly_report(&self, year: i32, month: u32) -> Result<MonthlyReport, BheError> {
        if !(1..=12).contains(&month) {
            return Err(BheError::InvalidInput(format!(
                "month must be between 1 and 12, got {}",
                month
            )));
        }
        let html = self.session.monthly_report_html(year, month).await?;
        let report = parse_monthly_report(&html, Some(self.pdf_handle()), &self.options)?;
        tracing::info!(
            "Monthly report {}-{:02} parsed: {} invoices",
            year,
            month,
            report.invoices.len()
        );
        Ok(report)
    }

    /// Annual report when `month` is `None`, otherwise that month's detail.
    pub async fn issued_invoices(
        &self,
        year: i32,
        month: Option<u32>,
    ) -> Result<IssuedInvoices, BheError> {
        match month {
            Some(month) => self.monthly_report(year, month).await.map(IssuedInvoices::Monthly),
            None => self.annual_report(year).await.map(IssuedInvoices::Annual),
        }
    }
}
