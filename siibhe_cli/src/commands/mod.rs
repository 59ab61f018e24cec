//! CLI subcommand implementations.

pub mod annual;
pub mod monthly;
pub mod pdf;

use anyhow::{Context, Result};
use chrono::Datelike;
use siibhe_lib::types::{Credentials, Rut};
use siibhe_lib::{BheClient, Endpoints};

/// Reads credentials from the environment and logs in.
///
/// `SII_RUT_NUM`, `SII_RUT_DV` and `SII_CLAVE` are required;
/// `SIIBHE_BASE_URL` points every portal host at one base URL.
pub async fn connect() -> Result<BheClient> {
    let number = require_env("SII_RUT_NUM")?;
    let dv = require_env("SII_RUT_DV")?;
    let password = require_env("SII_CLAVE")?;

    let rut = Rut::new(&number, &dv)?;
    let credentials = Credentials::new(rut, &password)?;
    let endpoints = match std::env::var("SIIBHE_BASE_URL").ok() {
        Some(url) => Endpoints::with_base_url(&url),
        None => Endpoints::production(),
    };

    eprintln!("Logging in to SII as {}", credentials.rut.dotted());
    let client = BheClient::login_with_credentials(credentials, endpoints).await?;
    Ok(client)
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name).with_context(|| format!("{} is not set (add it to the environment or .env)", name))
}

/// Year to query when `--year` is omitted.
pub fn current_year() -> i32 {
    chrono::Local::now().year()
}

/// Validates a `--month` value.
pub fn validate_month(month: u32) -> Result<u32> {
    if (1..=12).contains(&month) {
        Ok(month)
    } else {
        anyhow::bail!("--month must be between 1 and 12, got {}", month)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_bounds() {
        assert_eq!(validate_month(1).unwrap(), 1);
        assert_eq!(validate_month(12).unwrap(), 12);
        assert!(validate_month(0).is_err());
        assert!(validate_month(13).is_err());
    }

    #[test]
    fn current_year_is_plausible() {
        assert!(current_year() >= 2024);
    }
}
