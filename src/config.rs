use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Runtime configuration: where templates and the index file live by
/// default, and the default logging level. Scoped to this crate's own
/// needs — it does not pull in configuration sections belonging to
/// other parts of a larger workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub template_dir: String,
    pub index_filename: String,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            template_dir: "templates".to_string(),
            index_filename: "index".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Loads configuration layered as: built-in defaults, an optional
    /// `path` TOML file (if it exists), then `FSMTPL_*` environment
    /// variables. Works with no file or environment present.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let defaults = Self::default();

        let mut builder = config::Config::builder()
            .set_default("template_dir", defaults.template_dir.clone())
            .map_err(|e| Error::Config(e.to_string()))?
            .set_default("index_filename", defaults.index_filename.clone())
            .map_err(|e| Error::Config(e.to_string()))?
            .set_default("log_level", defaults.log_level.clone())
            .map_err(|e| Error::Config(e.to_string()))?;

        if let Some(path) = path {
            if std::path::Path::new(path).exists() {
                builder = builder.add_source(config::File::with_name(path));
            }
        }

        builder = builder.add_source(config::Environment::with_prefix("FSMTPL"));

        let built = builder.build().map_err(|e| Error::Config(e.to_string()))?;
        built.try_deserialize().map_err(|e| Error::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_needs_no_file_or_env() {
        let cfg = Config::default();
        assert_eq!(cfg.template_dir, "templates");
        assert_eq!(cfg.log_level, "info");
    }

    #[test]
    fn load_with_no_file_falls_back_to_defaults() {
        let cfg = Config::load(Some("/nonexistent/path.toml")).unwrap();
        assert_eq!(cfg.index_filename, "index");
    }
}
