//! Service layer: business operations built on dispatcher pools.
//!
//! Each service owns one or more [`crate::dispatch::Dispatcher`]s for its
//! hot paths and talks to storage only through the repository traits in
//! [`crate::domain`].

pub mod auth_service;
pub mod catalog_service;
pub mod report_service;

pub use auth_service::{AuthResponse, AuthService};
pub use catalog_service::CatalogService;
pub use report_service::ReportService;
