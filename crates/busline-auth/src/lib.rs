//! Authentication collaborator for Busline
//!
//! Token issuance belongs to a separate identity service. This crate
//! validates the JWTs it issues and turns them into request extractors
//! carrying the authenticated user id.
//!
//! # Features
//!
//! - JWT signing (for tooling and tests) and validation
//! - `AuthenticatedUser` extractor reading a Bearer header or `token` cookie
//! - `AdminUser` extractor for the administrative routes
//!
//! # Examples
//!
//! ```no_run
//! use actix_web::HttpResponse;
//! use busline_auth::{AdminUser, AuthenticatedUser};
//!
//! async fn my_route(user: AuthenticatedUser) -> HttpResponse {
//!     HttpResponse::Ok().json(serde_json::json!({ "user_id": user.user_id }))
//! }
//!
//! async fn admin_route(_admin: AdminUser) -> HttpResponse {
//!     HttpResponse::Ok().finish()
//! }
//! ```

pub mod claims;
pub mod jwt;
pub mod middleware;

pub use claims::Claims;
pub use jwt::JwtService;
pub use middleware::{AdminUser, AuthenticatedUser};
