use serde::Serialize;
use std::fmt;

/// Providers whose addresses count as personal unless the model says otherwise
pub const DEFAULT_PERSONAL_PROVIDERS: &[&str] = &["gmail.com", "yahoo.com", "hotmail.com"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EmailCategory {
    Personal,
    Organisational,
}

impl EmailCategory {
    /// Spelling the encoder was fitted on
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailCategory::Personal => "Personal",
            EmailCategory::Organisational => "Organisational",
        }
    }
}

impl fmt::Display for EmailCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain part of an address: whatever follows the last `@`, lowercased
pub fn email_domain(email: &str) -> String {
    let email = email.trim();
    email.rsplit('@').next().unwrap_or(email).to_lowercase()
}

pub fn derive_email_category<S: AsRef<str>>(email: &str, personal_providers: &[S]) -> EmailCategory {
    let domain = email_domain(email);
    if personal_providers
        .iter()
        .any(|p| p.as_ref().eq_ignore_ascii_case(&domain))
    {
        EmailCategory::Personal
    } else {
        EmailCategory::Organisational
    }
}

/// The three categorical inputs of the trust model
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrustFeatures {
    pub email_category: EmailCategory,
    pub domain: String,
    pub purpose: String,
}

impl TrustFeatures {
    /// Domain and purpose are kept verbatim; only the email is reduced.
    pub fn derive<S: AsRef<str>>(
        email: &str,
        domain: &str,
        purpose: &str,
        personal_providers: &[S],
    ) -> Self {
        Self {
            email_category: derive_email_category(email, personal_providers),
            domain: domain.to_string(),
            purpose: purpose.to_string(),
        }
    }
}
