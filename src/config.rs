use log::warn;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_SLICE_MS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FrontendConfig {
    /// Directory holding `obj_lu.bin`, `nc1020.fls` and `nc1020.sts`.
    pub storage_dir: Option<PathBuf>,
    pub slice_ms: u64,
    pub speed_up: bool,
    pub sync_time: bool,
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            storage_dir: None,
            slice_ms: DEFAULT_SLICE_MS,
            speed_up: false,
            sync_time: false,
        }
    }
}

pub fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("nc1020").join("frontend.toml");
        }
    }

    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("nc1020").join("frontend.toml");
    }

    if let Some(home) = std::env::var_os("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join("nc1020")
            .join("frontend.toml");
    }

    PathBuf::from("frontend.toml")
}

pub fn load_from_file(path: &Path) -> FrontendConfig {
    let text = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(_) => return FrontendConfig::default(),
    };

    match toml::from_str::<FrontendConfig>(&text) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(
                "Failed to parse frontend config {}: {e}; using defaults",
                path.display()
            );
            FrontendConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let cfg = load_from_file(&dir.path().join("absent.toml"));
        assert_eq!(cfg, FrontendConfig::default());
        assert_eq!(cfg.slice_ms, DEFAULT_SLICE_MS);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("frontend.toml");
        std::fs::write(&path, "speed_up = true\nstorage_dir = \"/data/wqx\"\n").unwrap();
        let cfg = load_from_file(&path);
        assert!(cfg.speed_up);
        assert_eq!(cfg.storage_dir, Some(PathBuf::from("/data/wqx")));
        assert_eq!(cfg.slice_ms, DEFAULT_SLICE_MS);
        assert!(!cfg.sync_time);
    }

    #[test]
    fn malformed_file_falls_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("frontend.toml");
        std::fs::write(&path, "slice_ms = \"fast\"").unwrap();
        assert_eq!(load_from_file(&path), FrontendConfig::default());
    }
}
