//! OpenXR loader API-layer manifest (`XrApiLayer_*.json`).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use xrsplice_layer::LAYER_NAME;

pub const FILE_FORMAT_VERSION: &str = "1.0.0";
pub const DEFAULT_DISABLE_ENV: &str = "DISABLE_XRSPLICE_PASSTHROUGH";
pub const NEGOTIATE_FUNCTION: &str = "xrNegotiateLoaderApiLayerInterface";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerManifest {
    pub file_format_version: String,
    pub api_layer: ApiLayer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiLayer {
    pub name: String,
    pub library_path: String,
    pub api_version: String,
    pub implementation_version: String,
    pub description: String,
    pub functions: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_environment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_environment: Option<String>,
}

/// Options for [`LayerManifest::new`].
#[derive(Debug, Clone, Default)]
pub struct ManifestOptions {
    pub library_path: PathBuf,
    pub implicit: bool,
    pub disable_env: Option<String>,
    pub enable_env: Option<String>,
}

impl LayerManifest {
    pub fn new(options: &ManifestOptions) -> Self {
        let mut functions = BTreeMap::new();
        functions.insert(
            NEGOTIATE_FUNCTION.to_string(),
            NEGOTIATE_FUNCTION.to_string(),
        );

        // Explicit layers are enabled by the application and ignore both.
        let (disable_environment, enable_environment) = if options.implicit {
            (
                Some(
                    options
                        .disable_env
                        .clone()
                        .unwrap_or_else(|| DEFAULT_DISABLE_ENV.to_string()),
                ),
                options.enable_env.clone(),
            )
        } else {
            (None, None)
        };

        Self {
            file_format_version: FILE_FORMAT_VERSION.to_string(),
            api_layer: ApiLayer {
                name: LAYER_NAME.to_string(),
                library_path: options.library_path.to_string_lossy().into_owned(),
                api_version: "1.0".to_string(),
                implementation_version: env!("CARGO_PKG_VERSION_MAJOR").to_string(),
                description: "xrsplice interception layer".to_string(),
                functions,
                disable_environment,
                enable_environment,
            },
        }
    }

    pub fn to_json(&self) -> Result<String> {
        let mut json =
            serde_json::to_string_pretty(self).context("Failed to serialize layer manifest")?;
        json.push('\n');
        Ok(json)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(path, self.to_json()?)
            .with_context(|| format!("Failed to write manifest: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(implicit: bool) -> ManifestOptions {
        ManifestOptions {
            library_path: PathBuf::from("./libxrsplice_layer.so"),
            implicit,
            ..ManifestOptions::default()
        }
    }

    #[test]
    fn test_explicit_manifest_has_no_environment_keys() {
        let manifest = LayerManifest::new(&options(false));
        let json: serde_json::Value = serde_json::from_str(&manifest.to_json().unwrap()).unwrap();

        assert_eq!(json["file_format_version"], "1.0.0");
        assert_eq!(json["api_layer"]["name"], LAYER_NAME);
        assert_eq!(json["api_layer"]["library_path"], "./libxrsplice_layer.so");
        assert_eq!(json["api_layer"]["api_version"], "1.0");
        assert_eq!(
            json["api_layer"]["functions"][NEGOTIATE_FUNCTION],
            NEGOTIATE_FUNCTION
        );
        assert!(json["api_layer"].get("disable_environment").is_none());
        assert!(json["api_layer"].get("enable_environment").is_none());
    }

    #[test]
    fn test_implicit_manifest_defaults_disable_env() {
        let manifest = LayerManifest::new(&options(true));
        assert_eq!(
            manifest.api_layer.disable_environment.as_deref(),
            Some(DEFAULT_DISABLE_ENV)
        );
        assert!(manifest.api_layer.enable_environment.is_none());
    }

    #[test]
    fn test_implicit_manifest_custom_env() {
        let manifest = LayerManifest::new(&ManifestOptions {
            disable_env: Some("NO_SPLICE".to_string()),
            enable_env: Some("SPLICE".to_string()),
            ..options(true)
        });
        assert_eq!(manifest.api_layer.disable_environment.as_deref(), Some("NO_SPLICE"));
        assert_eq!(manifest.api_layer.enable_environment.as_deref(), Some("SPLICE"));
    }

    #[test]
    fn test_write_creates_parent_and_parses_back() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("layers/XrApiLayer_xrsplice.json");
        let manifest = LayerManifest::new(&options(true));

        manifest.write(&path).unwrap();
        let parsed: LayerManifest =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed, manifest);
    }
}
