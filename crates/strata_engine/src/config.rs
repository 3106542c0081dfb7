//! Engine configuration
//!
//! Read from TOML. Every section and key is optional:
//!
//! ```toml
//! [binaries]
//! config_file = "assets/binaries.cfg"  # one .kzb path per line
//! files = ["assets/patch.kzb"]
//! access = "mapped"                    # mapped, streamed, memory
//!
//! [properties]
//! lock_registry_on_start = true
//!
//! [resources]
//! unload_unused_each_frame = false
//! allowed_prefixes = ["project/", "CoreAssets/"]
//!
//! [render]
//! width = 800
//! height = 480
//! root_composer = "kzb://project/composers/main"
//! camera = "/Root/Camera"
//!
//! [logging]
//! level = "info"
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use strata_binary::{BinaryConfig, SourceMode};
use strata_core::{Error, Result};

/// Binary containers opened at startup
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BinariesConfig {
    /// Binary config file listing containers to merge in order
    pub config_file: Option<PathBuf>,
    /// Containers merged after those of `config_file`
    pub files: Vec<PathBuf>,
    pub access: SourceMode,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PropertiesConfig {
    pub lock_registry_on_start: bool,
}

impl Default for PropertiesConfig {
    fn default() -> Self {
        Self {
            lock_registry_on_start: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ResourcesConfig {
    pub unload_unused_each_frame: bool,
    /// Directory key prefixes resources may be loaded from; empty allows all
    pub allowed_prefixes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    /// Composer description rendered every frame; draws every model when unset
    pub root_composer: Option<String>,
    /// Default camera node path; the first camera in the scene when unset
    pub camera: Option<String>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 480,
            root_composer: None,
            camera: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter; `RUST_LOG` takes precedence
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub binaries: BinariesConfig,
    pub properties: PropertiesConfig,
    pub resources: ResourcesConfig,
    pub render: RenderConfig,
    pub logging: LoggingConfig,
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load a TOML file. Relative container paths are resolved against the
    /// file's directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        let mut config: Self = toml::from_str(&text)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

        if let Some(base) = path.parent() {
            let rebase = |p: &mut PathBuf| {
                if p.is_relative() {
                    *p = base.join(&*p);
                }
            };
            if let Some(file) = config.binaries.config_file.as_mut() {
                rebase(file);
            }
            config.binaries.files.iter_mut().for_each(rebase);
        }
        log::info!("Loaded engine config from {}", path.display());
        Ok(config)
    }

    /// Containers to open, in merge order
    pub fn binary_paths(&self) -> Result<Vec<PathBuf>> {
        let mut paths = match &self.binaries.config_file {
            Some(file) => BinaryConfig::load(file)?.paths().to_vec(),
            None => Vec::new(),
        };
        paths.extend(self.binaries.files.iter().cloned());
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_document() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert!(config.properties.lock_registry_on_start);
        assert!(!config.resources.unload_unused_each_frame);
        assert_eq!((config.render.width, config.render.height), (800, 480));
        assert_eq!(config.binaries.access, SourceMode::Mapped);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_sections_override_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            [binaries]
            files = ["a.kzb", "b.kzb"]
            access = "streamed"

            [properties]
            lock_registry_on_start = false

            [resources]
            allowed_prefixes = ["project/"]

            [render]
            width = 1280
            root_composer = "kzb://project/composers/main"
            "#,
        )
        .unwrap();
        assert_eq!(config.binaries.files, vec![PathBuf::from("a.kzb"), PathBuf::from("b.kzb")]);
        assert_eq!(config.binaries.access, SourceMode::Streamed);
        assert!(!config.properties.lock_registry_on_start);
        assert_eq!(config.resources.allowed_prefixes, vec!["project/".to_string()]);
        assert_eq!(config.render.width, 1280);
        assert_eq!(config.render.height, 480);
        assert_eq!(config.render.root_composer.as_deref(), Some("kzb://project/composers/main"));
    }

    #[test]
    fn test_parse_errors_are_config_errors() {
        let err = EngineConfig::from_toml_str("[render]\nwidth = \"wide\"").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(matches!(
            EngineConfig::load("/definitely/not/here.toml"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_load_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("binaries.cfg"), "base.kzb\n").unwrap();
        let path = dir.path().join("engine.toml");
        std::fs::write(
            &path,
            "[binaries]\nconfig_file = \"binaries.cfg\"\nfiles = [\"patch.kzb\"]\n",
        )
        .unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(
            config.binary_paths().unwrap(),
            vec![dir.path().join("base.kzb"), dir.path().join("patch.kzb")]
        );
    }
}
