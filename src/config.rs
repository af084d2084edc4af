//! Pipeline configuration.
//!
//! ```toml
//! strategy = "parallel"
//! border = "reflect"          # or { constant = 0.5 }
//! extremum = "absolute"
//! separable = true
//! ```
//!
//! Every field is optional and falls back to [`PipelineConfig::default`].

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::execution::ExecutionStrategy;
use crate::filters::border::BorderPolicy;
use crate::filters::sobel::{ExtremumMode, GradientOptions};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub strategy: ExecutionStrategy,
    /// Border policy for both gradient convolutions.
    pub border: BorderPolicy,
    /// Extremum used to normalize the gradient pair.
    pub extremum: ExtremumMode,
    /// Run the gradients as two 1D passes.
    pub separable: bool,
}

impl PipelineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| Error::invalid(format!("invalid pipeline config: {e}")))
    }

    /// Load the configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let buf = fs::read_to_string(path)
            .map_err(|e| Error::invalid(format!("failed to read {}: {e}", path.display())))?;
        Self::from_toml_str(&buf)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::invalid(format!("cannot serialize pipeline config: {e}")))
    }

    pub fn gradient_options(&self) -> GradientOptions {
        GradientOptions {
            border: self.border,
            separable: self.separable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_is_default() {
        let config = PipelineConfig::from_toml_str("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.strategy, ExecutionStrategy::Sequential);
        assert_eq!(config.border, BorderPolicy::Clamp);
        assert_eq!(config.extremum, ExtremumMode::Absolute);
        assert!(!config.separable);
    }

    #[test]
    fn test_parse_full_config() {
        let config = PipelineConfig::from_toml_str(
            r#"
            strategy = "parallel"
            border = "mirror"
            extremum = "signed"
            separable = true
            "#,
        )
        .unwrap();
        assert_eq!(config.strategy, ExecutionStrategy::Parallel);
        assert_eq!(config.border, BorderPolicy::Mirror);
        assert_eq!(config.extremum, ExtremumMode::Signed);
        assert!(config.separable);
        assert_eq!(
            config.gradient_options(),
            GradientOptions {
                border: BorderPolicy::Mirror,
                separable: true,
            }
        );
    }

    #[test]
    fn test_parse_constant_border() {
        let config = PipelineConfig::from_toml_str("border = { constant = 0.25 }").unwrap();
        assert_eq!(config.border, BorderPolicy::Constant(0.25));
    }

    #[test]
    fn test_invalid_config() {
        for bad in [
            "strategy = \"gpu\"",
            "border = 3",
            "separable = \"yes\"",
            "unknown_key = 1",
            "strategy = ",
        ] {
            let err = PipelineConfig::from_toml_str(bad).unwrap_err();
            assert!(matches!(err, Error::InvalidArgument(_)), "{bad}: {err:?}");
        }
    }

    #[test]
    fn test_toml_round_trip() {
        let config = PipelineConfig {
            strategy: ExecutionStrategy::Parallel,
            separable: true,
            ..PipelineConfig::default()
        };
        let text = config.to_toml_string().unwrap();
        assert_eq!(PipelineConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_load_missing_file() {
        let err = PipelineConfig::load("/nonexistent/edgemap.toml").unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}
