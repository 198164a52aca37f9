mod config;
pub mod db;
pub mod retry;
pub mod validation;

pub use config::{AppConfig, Environment};

#[cfg(test)]
pub(crate) use config::test_config;
