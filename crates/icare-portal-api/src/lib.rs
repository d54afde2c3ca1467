//! REST API and command-line front end for the iCare property portal engine.

pub mod config;
pub mod rest;
pub mod types;

pub use config::{resolve_listen_addr, resolve_portal_config};
pub use rest::{router, serve};
pub use types::ApiError;
