use std::fmt;

use super::Rut;
use crate::AuthError;

/// Login material for the password flow.
#[derive(Clone)]
pub struct Credentials {
    pub rut: Rut,
    password: String,
    /// Cookies seeded into the jar before the first request, as `(name, value)`.
    pub initial_cookies: Vec<(String, String)>,
}

impl Credentials {
    pub fn new(rut: Rut, password: &str) -> Result<Self, AuthError> {
        if password.is_empty() {
            return Err(AuthError::InvalidCredentials(
                "Password cannot be empty.".into(),
            ));
        }
        Ok(Self {
            rut,
            password: password.to_string(),
            initial_cookies: Vec::new(),
        })
    }

    pub fn with_initial_cookie(mut self, name: &str, value: &str) -> Self {
        self.initial_cookies
            .push((name.to_string(), value.to_string()));
        self
    }

    /// Form fields posted to the authentication CGI.
    pub(crate) fn login_form(&self, home_url: &str) -> Vec<(&'static str, String)> {
        vec![
            ("rut", self.rut.number().to_string()),
            ("dv", self.rut.dv().to_string()),
            ("referencia", home_url.to_string()),
            ("411", String::new()),
            ("rutcntr", self.rut.dotted()),
            ("clave", self.password.clone()),
        ]
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("rut", &self.rut)
            .field("password", &"***")
            .field("initial_cookies", &self.initial_cookies.len())
            .finish()
    }
}
