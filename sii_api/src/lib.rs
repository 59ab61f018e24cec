mod auth;
mod client;
mod endpoints;
mod errors;
mod query;
pub mod types;
mod user_agent;
pub use self::client::{decode_latin1, Client};
pub use self::endpoints::Endpoints;
pub use self::errors::AuthError;
pub use self::query::{AnnualReportQuery, MonthlyReportQuery, PdfQuery, Query};
