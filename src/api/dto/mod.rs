//! Data Transfer Objects for REST request/response serialization.
//!
//! Field names are camelCase on the wire. Request bodies expose a
//! `validate` method that handlers call before reaching a service.

pub mod auth_dto;
pub mod common_dto;
pub mod report_dto;

pub use auth_dto::*;
pub use common_dto::*;
pub use report_dto::*;
