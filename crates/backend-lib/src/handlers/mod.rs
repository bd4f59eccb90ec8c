//! HTTP handlers for the `/api/v1` surface.

pub mod applications;
pub mod auth;
pub mod health;
