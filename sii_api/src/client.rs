//! Authenticated HTTP session against the SII portal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use reqwest::header::{CONTENT_TYPE, ORIGIN, REFERER};
use url::Url;

use crate::{
    auth,
    query::{AnnualReportQuery, MonthlyReportQuery, PdfQuery, Query},
    types::Credentials,
    user_agent::{browser_headers, get_user_agent},
    AuthError, Endpoints,
};

/// Timeout for page requests.
const PAGE_TIMEOUT: Duration = Duration::from_secs(15);
/// Timeout for the login POST and PDF downloads.
const DOCUMENT_TIMEOUT: Duration = Duration::from_secs(20);

/// HTTP session for one taxpayer.
///
/// Owns the cookie jar that carries the session across the three portal
/// hosts. Every report and document request requires a prior successful
/// [`Client::login`]. The client is `Send + Sync` and is meant to be shared
/// behind an `Arc` by everything that needs the session.
pub struct Client {
    endpoints: Endpoints,
    credentials: Credentials,
    http: reqwest::Client,
    jar: Arc<Jar>,
    authenticated: AtomicBool,
}

impl Client {
    /// Creates a session client against the production portal.
    pub fn new(credentials: Credentials) -> Result<Self, AuthError> {
        Self::with_endpoints(credentials, Endpoints::production())
    }

    /// Creates a session client with custom endpoints. Used for testing with wiremock.
    pub fn with_endpoints(
        credentials: Credentials,
        endpoints: Endpoints,
    ) -> Result<Self, AuthError> {
        let jar = Arc::new(Jar::default());
        for (name, value) in &credentials.initial_cookies {
            for base in endpoints.bases() {
                if let Ok(url) = Url::parse(base) {
                    jar.add_cookie_str(&format!("{}={}; Path=/", name, value), &url);
                }
            }
        }

        let http = reqwest::Client::builder()
            .user_agent(get_user_agent())
            .default_headers(browser_headers())
            .cookie_provider(Arc::clone(&jar))
            .timeout(DOCUMENT_TIMEOUT)
            .build()
            .map_err(|e| {
                tracing::error!("Failed to build HTTP client: {}", e);
                AuthError::Network(e.to_string())
            })?;

        Ok(Self {
            endpoints,
            credentials,
            http,
            jar,
            authenticated: AtomicBool::new(false),
        })
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::Acquire)
    }

    /// Runs the password login handshake.
    ///
    /// The referer page is fetched first on a best-effort basis so the portal
    /// hands out its pre-login cookies; failures there are ignored. A failed
    /// credentials POST or a landing page that is not the Mi SII home are fatal.
    pub async fn login(&self) -> Result<(), AuthError> {
        self.authenticated.store(false, Ordering::Release);
        let referer = self.endpoints.referer_url();

        if let Err(e) = self
            .http
            .get(&referer)
            .timeout(PAGE_TIMEOUT)
            .send()
            .await
        {
            tracing::debug!("Referer fetch failed, continuing: {}", e);
        }

        let resp = self
            .http
            .post(self.endpoints.login_url())
            .header(ORIGIN, self.endpoints.auth_origin())
            .header(REFERER, referer.as_str())
            .form(&self.credentials.login_form(&self.endpoints.home_url()))
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Login request failed: {}", e);
                AuthError::Network(format!("network error during SII authentication: {}", e))
            })?;

        let status = resp.status();
        if !status.is_success() {
            tracing::error!("Login rejected with status {}", status);
            return Err(AuthError::LoginFailed {
                status: status.as_u16(),
            });
        }

        let login_url = resp.url().clone();
        let body = read_latin1(resp).await?;
        let home = self.follow_redirect_or_home(&login_url, &body).await?;

        let status = home.status();
        if !status.is_success() {
            return Err(AuthError::HomeStatus {
                status: status.as_u16(),
            });
        }
        let final_url = home.url().to_string();
        let body = read_latin1(home).await?;
        if !auth::looks_like_home(&final_url, &body) {
            return Err(AuthError::UnexpectedHome {
                url: final_url,
                snippet: auth::snippet(&body),
            });
        }

        tracing::info!("Logged in as {}", self.credentials.rut);
        self.authenticated.store(true, Ordering::Release);
        Ok(())
    }

    async fn follow_redirect_or_home(
        &self,
        login_url: &Url,
        body: &str,
    ) -> Result<reqwest::Response, AuthError> {
        let target = match auth::js_redirect_target(body) {
            Some(target) => {
                let url = login_url.join(&target).map_err(|e| {
                    AuthError::Network(format!("invalid redirect target {:?}: {}", target, e))
                })?;
                self.jar.add_cookie_str(&auth::locexp_cookie(), &url);
                tracing::debug!("Following JS redirect to {}", url);
                url.to_string()
            }
            None => self.endpoints.home_url(),
        };

        self.http
            .get(&target)
            .timeout(PAGE_TIMEOUT)
            .send()
            .await
            .map_err(|e| AuthError::Network(format!("error following redirect to home: {}", e)))
    }

    fn ensure_authenticated(&self, what: &'static str) -> Result<(), AuthError> {
        if self.is_authenticated() {
            Ok(())
        } else {
            Err(AuthError::NotAuthenticated(what))
        }
    }

    /// HTML of the Mi SII home page.
    pub async fn home_html(&self) -> Result<String, AuthError> {
        self.ensure_authenticated("the home page")?;
        let url = Url::parse(&self.endpoints.home_url())
            .map_err(|e| AuthError::Network(e.to_string()))?;
        self.get_page(url, "home page").await
    }

    /// HTML of the annual report of issued fee invoices.
    pub async fn annual_report_html(&self, year: i32) -> Result<String, AuthError> {
        self.ensure_authenticated("the annual report")?;
        let query = AnnualReportQuery {
            rut: &self.credentials.rut,
            year,
        };
        let url = query.add_to_url(&self.endpoints.annual_report_url()?);
        self.get_page(url, "annual report").await
    }

    /// HTML of the monthly detail report of issued fee invoices.
    pub async fn monthly_report_html(&self, year: i32, month: u32) -> Result<String, AuthError> {
        self.ensure_authenticated("the monthly report")?;
        let query = MonthlyReportQuery {
            rut: &self.credentials.rut,
            year,
            month,
        };
        let url = query.add_to_url(&self.endpoints.monthly_report_url()?);
        self.get_page(url, "monthly report").await
    }

    /// Downloads the PDF rendering of one invoice.
    ///
    /// An expired session makes the portal answer with an HTML login page,
    /// so anything that is not `application/pdf` is rejected.
    pub async fn download_invoice_pdf(&self, barcode: &str) -> Result<Vec<u8>, AuthError> {
        self.ensure_authenticated("an invoice PDF")?;
        let url = PdfQuery { barcode }.add_to_url(&self.endpoints.pdf_url()?);

        let resp = self
            .http
            .get(url)
            .timeout(DOCUMENT_TIMEOUT)
            .send()
            .await
            .map_err(|e| AuthError::Network(format!("error downloading the invoice PDF: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AuthError::HttpStatus {
                status: status.as_u16(),
                context: "invoice PDF",
            });
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_lowercase();
        if !content_type.contains("application/pdf") {
            tracing::warn!("PDF request for {} returned {:?}", barcode, content_type);
            return Err(AuthError::NotPdf);
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| AuthError::Network(format!("error reading the invoice PDF: {}", e)))?;
        tracing::debug!("Downloaded PDF for {} ({} bytes)", barcode, bytes.len());
        Ok(bytes.to_vec())
    }

    async fn get_page(&self, url: Url, context: &'static str) -> Result<String, AuthError> {
        let resp = self
            .http
            .get(url)
            .timeout(PAGE_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to get {}: {}", context, e);
                AuthError::Network(format!("error getting the {}: {}", context, e))
            })?;

        let status = resp.status();
        if !status.is_success() {
            tracing::error!("Request for {} failed with status {}", context, status);
            return Err(AuthError::HttpStatus {
                status: status.as_u16(),
                context,
            });
        }

        read_latin1(resp).await
    }
}

async fn read_latin1(resp: reqwest::Response) -> Result<String, AuthError> {
    let bytes = resp.bytes().await.map_err(|e| {
        tracing::error!("Failed to read response body: {}", e);
        AuthError::Network(format!("error reading response body: {}", e))
    })?;
    Ok(decode_latin1(&bytes))
}

/// Decodes ISO-8859-1 bytes. Every byte maps to the code point of the same value.
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}
