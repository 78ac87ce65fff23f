//! Binder configuration loading.
//!
//! Sources, lowest priority first:
//! 1. Default values (hardcoded)
//! 2. Optional config file (TOML)
//! 3. Environment variables, `KVBIND__` prefixed
//!

mod binder;
pub use binder::*;


//---
use config::Config;
use config::Environment;
use config::File;
use tracing::debug;

use crate::Result;

impl BinderConfig {
    /// Loads and validates configuration.
    ///
    /// # Arguments
    /// * `path` - Optional config file; must exist when given
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(p) = path {
            debug!("loading binder config from: {}", p);
            builder = builder.add_source(File::with_name(p).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("KVBIND")
                .separator("__")
                .ignore_empty(true)
                .try_parsing(true),
        );

        let config: BinderConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}
