//! Loading of the guard configuration table.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use spawn_guard_core::GuardConfig;

/// Loads and validates the configuration at `path`, or the defaults when absent.
pub(crate) fn load(path: Option<&Path>) -> Result<GuardConfig> {
    let config = match path {
        Some(path) => {
            let contents = fs::read_to_string(path).with_context(|| {
                format!("failed to read guard configuration at {}", path.display())
            })?;
            parse(&contents)
                .with_context(|| format!("invalid guard configuration in {}", path.display()))?
        }
        None => GuardConfig::default(),
    };

    config
        .validate()
        .context("guard configuration failed validation")?;
    Ok(config)
}

fn parse(contents: &str) -> Result<GuardConfig> {
    toml::from_str(contents).context("failed to parse guard configuration toml contents")
}

/// Renders the configuration as TOML.
pub(crate) fn render(config: &GuardConfig) -> Result<String> {
    toml::to_string_pretty(config).context("failed to serialise guard configuration")
}
