//! Library layer for the SII fee-invoice reports.
//!
//! Pulls the data objects that the annual and monthly report pages embed as
//! JavaScript, maps them into typed reports, and exposes a logged-in facade
//! built on the `sii_api` session client.

pub mod client;
pub mod error;
pub mod mapper;
pub mod models;
pub mod raw;
pub mod script;

pub use sii_api;
pub use sii_api::types;
pub use sii_api::{decode_latin1, AuthError, Endpoints};

pub use client::{BheClient, IssuedInvoices};
pub use error::{BheError, ExtractionError};
pub use mapper::{
    coerce_int, coerce_opt_int, map_annual_report, map_monthly_report, parse_annual_report,
    parse_monthly_report,
};
pub use models::{
    AnnualReport, AnnualTotals, InvoiceDetail, MonthlyReport, MonthlySummary, Pdf, PdfFetcher,
    PdfHandle,
};
pub use raw::{RawFieldMap, RawValue};
pub use script::{extract_object, EvalOptions};
