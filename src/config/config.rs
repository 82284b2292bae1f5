use home_dir::HomeDirExt;
use std::{io::Write, path::PathBuf, time::Duration};

use anyhow::{anyhow, Result};

use crate::downloader::CollisionPolicy;
use crate::library::{BookmarkRoot, FolderLocator};
use crate::resolver::TitlePattern;

use super::app_config::AppConfig;

pub struct Config {
    config_file: PathBuf,
    app_config: AppConfig,
}

impl Config {
    pub fn new_from_file(config_path: Option<String>) -> Result<Config> {
        if let Some(config_path) = config_path {
            Config::new(PathBuf::from(config_path))
        } else {
            Config::new_default()
        }
    }

    pub fn new_default() -> Result<Config> {
        let config_directory_root =
            std::env::var("XDG_CONFIG_HOME").unwrap_or("~/.config".to_string());

        let config_directory = PathBuf::from(config_directory_root)
            .expand_home()
            .map_err(|e| anyhow!("cannot expand the config directory path: {}", e))?
            .join("tunemark");
        let config_file = config_directory.join("config.toml");

        Config::new(config_file)
    }

    fn new(config_file: PathBuf) -> Result<Config> {
        let parent = config_file
            .parent()
            .ok_or_else(|| anyhow!("config file path \"{}\" has no parent directory", config_file.display()))?;

        ensure_dir(&PathBuf::from(parent))?;

        let app_config: AppConfig = {
            let file_content = ensure_file(
                &config_file,
                toml::to_string_pretty(&AppConfig::new_default())?,
            )?;

            toml::from_str(&file_content)?
        };

        let config = Config {
            config_file,
            app_config,
        };

        config.validate().and(Ok(config))
    }

    pub fn get_bookmark_file(&self) -> Result<PathBuf> {
        expand(&self.app_config.bookmark_file)
    }

    pub fn get_output_dir(&self) -> Result<PathBuf> {
        expand(&self.app_config.output_dir)
    }

    pub fn get_root(&self) -> BookmarkRoot {
        self.app_config.root
    }

    pub fn get_locator(&self) -> FolderLocator {
        match (&self.app_config.folder_name, self.app_config.folder_position) {
            (Some(name), _) => FolderLocator::Name(name.clone()),
            (None, Some(position)) => FolderLocator::Position(position),
            (None, None) => FolderLocator::Position(0),
        }
    }

    pub fn get_pattern(&self) -> TitlePattern {
        TitlePattern {
            separator: self.app_config.separator.clone(),
            artist_position: self.app_config.artist_position,
            title_position: self.app_config.title_position,
        }
    }

    pub fn get_collision_policy(&self) -> CollisionPolicy {
        self.app_config.on_collision
    }

    pub fn get_timeout(&self) -> Duration {
        Duration::from_secs(self.app_config.timeout_secs)
    }

    pub fn get_workers(&self) -> usize {
        self.app_config.workers
    }

    /// Environment variables win over the config file, so credentials can be
    /// kept out of it entirely.
    pub fn get_spotify_credentials(&self) -> Option<(String, String)> {
        let client_id = std::env::var("SPOTIFY_CLIENT_ID")
            .ok()
            .or_else(|| self.app_config.spotify_client_id.clone())?;
        let client_secret = std::env::var("SPOTIFY_CLIENT_SECRET")
            .ok()
            .or_else(|| self.app_config.spotify_client_secret.clone())?;

        Some((client_id, client_secret))
    }

    pub fn validate(&self) -> Result<()> {
        if self.app_config.bookmark_file.trim().is_empty() {
            return Err(anyhow!(
                "bookmark_file is not set (config file path: \"{}\")",
                self.config_file.display()
            ));
        }

        let bookmark_file = self.get_bookmark_file()?;

        if !bookmark_file.exists() {
            return Err(anyhow!(
                "Given bookmark_file (\"{}\") doesn't exist (config file path: \"{}\")",
                bookmark_file.display(),
                self.config_file.display()
            ));
        }

        if self.app_config.separator.is_empty() {
            return Err(anyhow!(
                "separator must not be empty (config file path: \"{}\")",
                self.config_file.display()
            ));
        }

        if self.app_config.artist_position > 1 || self.app_config.title_position > 1 {
            return Err(anyhow!(
                "artist_position and title_position index a two-field split and must be 0 or 1 (config file path: \"{}\")",
                self.config_file.display()
            ));
        }

        if self.app_config.artist_position == self.app_config.title_position {
            return Err(anyhow!(
                "artist_position and title_position must differ (config file path: \"{}\")",
                self.config_file.display()
            ));
        }

        if self.app_config.workers == 0 {
            return Err(anyhow!(
                "workers must be at least 1 (config file path: \"{}\")",
                self.config_file.display()
            ));
        }

        Ok(())
    }
}

fn expand(path: &str) -> Result<PathBuf> {
    path.expand_home()
        .map_err(|e| anyhow!("cannot expand home directory in \"{}\": {}", path, e))
}

fn ensure_dir(dir: &PathBuf) -> Result<()> {
    std::fs::create_dir_all(dir)?;

    Ok(())
}

fn ensure_file(file_path: &PathBuf, default: String) -> Result<String> {
    if !file_path.exists() {
        let mut file = std::fs::File::create(file_path)?;
        file.write_all(default.as_bytes())?;
        Ok(default)
    } else {
        Ok(std::fs::read_to_string(file_path)?)
    }
}
