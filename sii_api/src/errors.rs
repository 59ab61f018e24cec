//! Error types for the SII session client.

/// Errors raised while authenticating or while fetching authenticated pages.
#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    /// RUT or password rejected before any request was sent.
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),
    /// A page that needs a session was requested before `login`.
    #[error("Login is required before requesting {0}")]
    NotAuthenticated(&'static str),
    /// Transport-level failure (DNS, TLS, timeout, body read).
    #[error("Network error: {0}")]
    Network(String),
    /// The credentials POST returned a non-success status.
    #[error("SII login failed with status {status}")]
    LoginFailed { status: u16 },
    /// The post-login home page returned a non-success status.
    #[error("Could not load Mi SII home page (status {status})")]
    HomeStatus { status: u16 },
    /// Login went through but the landing page is not the Mi SII home.
    #[error("Could not validate session in SII after login (unexpected home page). URL={url:?} HTML={snippet:?}")]
    UnexpectedHome { url: String, snippet: String },
    /// A report or document request returned a non-success status.
    #[error("Error getting the {context}: status {status}")]
    HttpStatus { status: u16, context: &'static str },
    /// The document endpoint answered with something other than a PDF.
    #[error("The response is not a PDF. The session may have expired.")]
    NotPdf,
    /// No fetch capability is attached to the invoice.
    #[error("SII service is not available to download the PDF")]
    NotAvailable,
}
