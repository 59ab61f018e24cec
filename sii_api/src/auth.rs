//! Pieces of the password login handshake that do not touch the network.

use std::sync::OnceLock;

use chrono::{Duration, Utc};
use regex::Regex;

/// Cookie the login page sets from JavaScript before redirecting.
pub const LOCEXP_COOKIE: &str = "NETSCAPE_LIVEWIRE.locexp";

const HOME_MARKERS: [&str; 4] = [
    "mi sii",
    "servicios online",
    "situación tributaria",
    "clave tributaria",
];

const SNIPPET_LEN: usize = 600;

fn redirect_regex() -> Result<&'static Regex, regex::Error> {
    static RE: OnceLock<Regex> = OnceLock::new();
    if let Some(re) = RE.get() {
        return Ok(re);
    }
    let re = Regex::new(r#"(?i)location\.replace\(\s*["']([^"']+)["']\s*\)"#)?;
    Ok(RE.get_or_init(|| re))
}

/// Target of a `location.replace("...")` redirect in the login response, if any.
pub fn js_redirect_target(body: &str) -> Option<String> {
    let re = match redirect_regex() {
        Ok(re) => re,
        Err(e) => {
            tracing::error!("regex compile error: {}", e);
            return None;
        }
    };
    re.captures(body)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().to_string())
}

/// `Set-Cookie` text for the expiry cookie, two hours ahead.
pub fn locexp_cookie() -> String {
    let expires = Utc::now() + Duration::hours(2);
    format!(
        "{}={}; Path=/",
        LOCEXP_COOKIE,
        expires.format("%a, %d %b %Y %H:%M:%S GMT")
    )
}

/// Whether the page reached after login is the Mi SII landing page.
pub fn looks_like_home(url: &str, body: &str) -> bool {
    if url.contains("siihome.cgi") {
        return true;
    }
    let text = body.to_lowercase();
    HOME_MARKERS.iter().any(|m| text.contains(m))
}

/// First characters of a page on a single line, for error messages.
pub fn snippet(body: &str) -> String {
    body.chars()
        .take(SNIPPET_LEN)
        .map(|c| if c == '\n' { ' ' } else { c })
        .collect()
}
