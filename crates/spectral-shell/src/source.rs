//! Loading specs, blueprints and config from disk

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use spectral_core::{UiSpec, parse_blueprint};
use spectral_runtime::RuntimeConfig;

/// A spec ready to open, with the app id it declares (if any)
#[derive(Debug)]
pub struct LoadedSpec {
    pub spec: UiSpec,
    pub app_id: Option<String>,
}

/// Read a UI spec, or a blueprint when `blueprint` is set
pub fn load_spec(path: &Path, blueprint: bool) -> Result<LoadedSpec> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    if blueprint {
        let package = parse_blueprint(&content)
            .with_context(|| format!("Invalid blueprint in {}", path.display()))?;
        tracing::info!(app_id = %package.id, version = %package.version, "Loaded blueprint");
        return Ok(LoadedSpec {
            spec: package.ui_spec,
            app_id: Some(package.id),
        });
    }

    let spec = UiSpec::from_json_str(&content)
        .with_context(|| format!("Invalid spec in {}", path.display()))?;
    Ok(LoadedSpec { spec, app_id: None })
}

/// Read a TOML runtime config, or use defaults
pub fn load_config(path: Option<&Path>) -> Result<RuntimeConfig> {
    let Some(path) = path else {
        return Ok(RuntimeConfig::default());
    };
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    RuntimeConfig::from_toml_str(&content)
        .with_context(|| format!("Invalid config in {}", path.display()))
}
