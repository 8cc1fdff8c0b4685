//! Shared DTO types used across multiple endpoints.

use serde::Deserialize;
use utoipa::IntoParams;

use crate::service::report_service::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

/// Pagination and filter query parameters for `GET /reports`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ReportListParams {
    /// Page number (0-indexed). Defaults to 0.
    #[serde(default)]
    pub page: usize,
    /// Items per page (max 100). Defaults to 20.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Optional status filter. Blank means no filter.
    #[serde(default)]
    pub status: Option<String>,
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl ReportListParams {
    /// Caps `page_size` at 100; zero falls back to the default.
    #[must_use]
    pub fn clamped(&self) -> Self {
        Self {
            page: self.page,
            page_size: match self.page_size {
                0 => DEFAULT_PAGE_SIZE,
                n => n.min(MAX_PAGE_SIZE),
            },
            status: self.status.clone(),
        }
    }
}

/// Loose shape check for an email address: `local@domain.tld`.
pub(crate) fn looks_like_email(email: &str) -> bool {
    let email = email.trim();
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && domain.contains('.')
        && !email.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shape() {
        assert!(looks_like_email("vecina@example.mx"));
        assert!(looks_like_email("  Vecina@Example.mx "));
        assert!(!looks_like_email("vecina"));
        assert!(!looks_like_email("@example.mx"));
        assert!(!looks_like_email("vecina@localhost"));
        assert!(!looks_like_email("vecina@.mx"));
        assert!(!looks_like_email("ve cina@example.mx"));
    }

    #[test]
    fn page_size_is_clamped() {
        let params = ReportListParams {
            page: 2,
            page_size: 500,
            status: None,
        };
        assert_eq!(params.clamped().page_size, MAX_PAGE_SIZE);

        let params = ReportListParams {
            page: 0,
            page_size: 0,
            status: None,
        };
        assert_eq!(params.clamped().page_size, DEFAULT_PAGE_SIZE);
    }
}
