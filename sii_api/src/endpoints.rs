//! Portal hosts and paths.

use url::Url;

use crate::AuthError;

const LOGIN_PATH: &str = "/cgi_AUT2000/CAutInicio.cgi";
const REFERER_PATH: &str = "/AUT2000/InicioAutenticacion/IngresoRutClave.html";
const HOME_PATH: &str = "/cgi_misii/siihome.cgi";
const ANNUAL_REPORT_PATH: &str = "/cgi_IMT/TMBCOC_InformeAnualBhe.cgi";
const MONTHLY_REPORT_PATH: &str = "/cgi_IMT/TMBCOC_InformeMensualBhe.cgi";
const PDF_PATH: &str = "/cgi_IMT/TMBCOT_ConsultaBoletaPdf.cgi";

/// Base URLs of the three portal hosts involved in a session.
///
/// Authentication lives on `zeusr`, the landing page on `misiir` and the fee
/// invoice reports on `loa`. Tests point all three at one mock server.
#[derive(Clone, Debug)]
pub struct Endpoints {
    auth_base: String,
    home_base: String,
    reports_base: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::production()
    }
}

impl Endpoints {
    pub fn production() -> Self {
        Self {
            auth_base: "https://zeusr.sii.cl".to_string(),
            home_base: "https://misiir.sii.cl".to_string(),
            reports_base: "https://loa.sii.cl".to_string(),
        }
    }

    /// Routes every host to the same base URL. Used for testing with wiremock.
    pub fn with_base_url(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/').to_string();
        Self {
            auth_base: base.clone(),
            home_base: base.clone(),
            reports_base: base,
        }
    }

    pub fn auth_origin(&self) -> &str {
        &self.auth_base
    }

    pub fn login_url(&self) -> String {
        format!("{}{}", self.auth_base, LOGIN_PATH)
    }

    /// The credentials form page. Its query string is the post-login target.
    pub fn referer_url(&self) -> String {
        format!("{}{}?{}", self.auth_base, REFERER_PATH, self.home_url())
    }

    pub fn home_url(&self) -> String {
        format!("{}{}", self.home_base, HOME_PATH)
    }

    pub fn annual_report_url(&self) -> Result<Url, AuthError> {
        parse_url(&self.reports_base, ANNUAL_REPORT_PATH)
    }

    pub fn monthly_report_url(&self) -> Result<Url, AuthError> {
        parse_url(&self.reports_base, MONTHLY_REPORT_PATH)
    }

    pub fn pdf_url(&self) -> Result<Url, AuthError> {
        parse_url(&self.reports_base, PDF_PATH)
    }

    /// Every base URL, used to seed cookies for each host.
    pub(crate) fn bases(&self) -> [&str; 3] {
        [&self.auth_base, &self.home_base, &self.reports_base]
    }
}

fn parse_url(base: &str, path: &str) -> Result<Url, AuthError> {
    Url::parse(&format!("{}{}", base, path)).map_err(|e| {
        tracing::error!("Invalid URL constructed: {}", e);
        AuthError::Network(format!("invalid URL {}{}: {}", base, path, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_hosts() {
        let endpoints = Endpoints::production();
        assert_eq!(
            endpoints.login_url(),
            "https://zeusr.sii.cl/cgi_AUT2000/CAutInicio.cgi"
        );
        assert_eq!(
            endpoints.home_url(),
            "https://misiir.sii.cl/cgi_misii/siihome.cgi"
        );
        assert_eq!(
            endpoints.referer_url(),
            "https://zeusr.sii.cl/AUT2000/InicioAutenticacion/IngresoRutClave.html?https://misiir.sii.cl/cgi_misii/siihome.cgi"
        );
        assert_eq!(
            endpoints.pdf_url().unwrap().as_str(),
            "https://loa.sii.cl/cgi_IMT/TMBCOT_ConsultaBoletaPdf.cgi"
        );
    }

    #[test]
    fn base_url_override_strips_trailing_slash() {
        let endpoints = Endpoints::with_base_url("http://127.0.0.1:9000/");
        assert_eq!(
            endpoints.annual_report_url().unwrap().as_str(),
            "http://127.0.0.1:9000/cgi_IMT/TMBCOC_InformeAnualBhe.cgi"
        );
        assert!(endpoints.bases().iter().all(|b| *b == "http://127.0.0.1:9000"));
    }
}
