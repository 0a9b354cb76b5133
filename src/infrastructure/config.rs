use crate::domain::{config::DmmConfig, error::{DmmError, DmmResult}};
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "dmm6500";
const PROJECT_DIR: &str = ".dmm6500";
const CONFIG_FILE: &str = "config.toml";

/// Configuration manager
pub struct ConfigManager {
    global_config_path: PathBuf,
    project_config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Create new configuration manager
    pub fn new() -> DmmResult<Self> {
        let global_config_path = Self::get_global_config_path()?;
        let project_config_path = Self::find_project_config_path();

        Ok(Self {
            global_config_path,
            project_config_path,
        })
    }

    /// Manager with explicit locations, bypassing home and cwd lookup
    pub fn with_paths(global_config_path: PathBuf, project_config_path: Option<PathBuf>) -> Self {
        Self {
            global_config_path,
            project_config_path,
        }
    }

    /// Load configuration from files.
    ///
    /// A project file replaces the global file wholesale; sections it does
    /// not mention fall back to defaults.
    pub fn load_config(&self) -> DmmResult<DmmConfig> {
        if let Some(project_path) = &self.project_config_path {
            if project_path.exists() {
                return self.load_config_from_path(project_path);
            }
        }

        if self.global_config_path.exists() {
            return self.load_config_from_path(&self.global_config_path);
        }

        Ok(DmmConfig::default())
    }

    /// Get global configuration path
    fn get_global_config_path() -> DmmResult<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| DmmError::Config {
            message: "Could not determine home directory".to_string(),
        })?;

        Ok(home.join(".config").join(APP_DIR).join(CONFIG_FILE))
    }

    /// Find project configuration path by walking up directory tree
    fn find_project_config_path() -> Option<PathBuf> {
        let current_dir = std::env::current_dir().ok()?;
        let mut path = current_dir.as_path();

        loop {
            let config_path = path.join(PROJECT_DIR).join(CONFIG_FILE);
            if config_path.exists() {
                return Some(config_path);
            }

            path = path.parent()?;
        }
    }

    /// Load configuration from specific path
    pub fn load_config_from_path(&self, path: &Path) -> DmmResult<DmmConfig> {
        let content = fs::read_to_string(path).map_err(|e| DmmError::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        toml::from_str(&content).map_err(|e| DmmError::Config {
            message: format!("Failed to parse config file {}: {}", path.display(), e),
        })
    }

    /// Save configuration to specific path, creating parent directories
    pub fn save_config_to_path(&self, path: &Path, config: &DmmConfig) -> DmmResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| DmmError::Config {
                message: format!("Failed to create config directory: {}", e),
            })?;
        }

        let content = toml::to_string_pretty(config).map_err(|e| DmmError::Config {
            message: format!("Failed to serialize config: {}", e),
        })?;

        fs::write(path, content).map_err(|e| DmmError::Config {
            message: format!("Failed to write config file {}: {}", path.display(), e),
        })
    }

    /// Write a default project configuration under `path/.dmm6500/`
    pub fn init_project_config(&self, path: &Path) -> DmmResult<PathBuf> {
        let config_file = path.join(PROJECT_DIR).join(CONFIG_FILE);
        self.init_at(&config_file)?;
        Ok(config_file)
    }

    /// Write a default global configuration
    pub fn init_global_config(&self) -> DmmResult<PathBuf> {
        let path = self.global_config_path.clone();
        self.init_at(&path)?;
        Ok(path)
    }

    fn init_at(&self, config_file: &Path) -> DmmResult<()> {
        if config_file.exists() {
            return Err(DmmError::Config {
                message: format!("Configuration already exists at {}", config_file.display()),
            });
        }
        self.save_config_to_path(config_file, &DmmConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_files_yield_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_paths(temp_dir.path().join("absent.toml"), None);
        let config = manager.load_config().unwrap();

        assert_eq!(config.global.log_level, "info");
        assert_eq!(config.settings.voltage_range, 10);
        assert_eq!(config.instrument.address, "127.0.0.1:5025");
    }

    #[test]
    fn test_project_config_wins_over_global() {
        let temp_dir = TempDir::new().unwrap();
        let global = temp_dir.path().join("global.toml");
        let project = temp_dir.path().join("project.toml");
        fs::write(&global, "[instrument]\naddress = \"10.0.0.1:5025\"\n").unwrap();
        fs::write(&project, "[instrument]\naddress = \"10.0.0.2:5025\"\n").unwrap();

        let manager = ConfigManager::with_paths(global, Some(project));
        let config = manager.load_config().unwrap();
        assert_eq!(config.instrument.address, "10.0.0.2:5025");
    }

    #[test]
    fn test_init_project_config() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_paths(temp_dir.path().join("global.toml"), None);

        let config_file = manager.init_project_config(temp_dir.path()).unwrap();
        assert!(config_file.exists());

        let loaded = manager.load_config_from_path(&config_file).unwrap();
        assert_eq!(loaded.settings, crate::domain::config::Settings::default());

        // A second init must not overwrite
        assert!(manager.init_project_config(temp_dir.path()).is_err());
    }

    #[test]
    fn test_parse_error_names_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.toml");
        fs::write(&path, "[settings\nvoltage_range = ").unwrap();

        let manager = ConfigManager::with_paths(temp_dir.path().join("global.toml"), None);
        let err = manager.load_config_from_path(&path).unwrap_err();
        assert!(err.to_string().contains("broken.toml"));
    }
}
