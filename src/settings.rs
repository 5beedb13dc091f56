use crate::api::DEFAULT_BASE_URL;
use crate::error::ClientError;
use serde::Deserialize;
use std::{fs, io, path::Path};

pub const SETTINGS_FILENAME: &str = "settings.json";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_base_url: String,
    pub credential_file: String,
    pub log_filter: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            api_base_url: DEFAULT_BASE_URL.to_string(),
            credential_file: "taskdeck.redb".to_string(),
            log_filter: None,
        }
    }
}

impl Settings {
    /// Read `settings.json` from the working directory.
    pub fn load() -> Result<Settings, ClientError> {
        Settings::from_path(SETTINGS_FILENAME)
    }

    /// A missing file means defaults; a malformed one is an error.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Settings, ClientError> {
        let path = path.as_ref();
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Settings::default()),
            Err(e) => {
                return Err(ClientError::Settings(format!("cannot read {}: {e}", path.display())))
            }
        };
        serde_json::from_str(&content)
            .map_err(|e| ClientError::Settings(format!("cannot parse {}: {e}", path.display())))
    }
}
