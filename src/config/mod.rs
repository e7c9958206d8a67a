//! Configuration
//!
//! Layered configuration in the figment style: built-in defaults, an
//! optional `geolens.toml`, then `GEOLENS_`-prefixed environment variables.

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::{Config, EnrichmentConfig, EvaluationConfig, ProviderSettings, ProvidersConfig};
