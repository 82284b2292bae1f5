use serde::{Deserialize, Serialize};

use crate::downloader::CollisionPolicy;
use crate::library::BookmarkRoot;

#[derive(Debug, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub(super) bookmark_file: String,
    #[serde(default = "default_output_dir")]
    pub(super) output_dir: String,
    #[serde(default)]
    pub(super) root: BookmarkRoot,
    #[serde(default)]
    pub(super) folder_name: Option<String>,
    #[serde(default)]
    pub(super) folder_position: Option<usize>,
    #[serde(default = "default_separator")]
    pub(super) separator: String,
    #[serde(default)]
    pub(super) artist_position: usize,
    #[serde(default = "default_title_position")]
    pub(super) title_position: usize,
    #[serde(default)]
    pub(super) on_collision: CollisionPolicy,
    #[serde(default = "default_timeout_secs")]
    pub(super) timeout_secs: u64,
    #[serde(default = "default_workers")]
    pub(super) workers: usize,
    #[serde(default)]
    pub(super) spotify_client_id: Option<String>,
    #[serde(default)]
    pub(super) spotify_client_secret: Option<String>,
}

impl AppConfig {
    pub fn new_default() -> AppConfig {
        AppConfig {
            bookmark_file: "".to_string(),
            output_dir: default_output_dir(),
            root: BookmarkRoot::default(),
            folder_name: None,
            folder_position: None,
            separator: default_separator(),
            artist_position: 0,
            title_position: default_title_position(),
            on_collision: CollisionPolicy::default(),
            timeout_secs: default_timeout_secs(),
            workers: default_workers(),
            spotify_client_id: None,
            spotify_client_secret: None,
        }
    }
}

fn default_output_dir() -> String {
    "downloaded_musics".to_string()
}

fn default_separator() -> String {
    " - ".to_string()
}

fn default_title_position() -> usize {
    1
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_workers() -> usize {
    1
}
