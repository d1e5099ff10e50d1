//! Core types shared across the AGRO BOOST backend.
//!
//! This crate carries the error taxonomy and the runtime configuration.
//! Everything domain-specific (kits, readings, notifications) lives in
//! `agroboost-storage`; everything transport-specific lives in
//! `agroboost-devices` and `agroboost-api`.

pub mod config;
pub mod error;

pub use config::AppConfig;
pub use error::{Error, Result};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
