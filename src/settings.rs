use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const SETTINGS_FILE: &str = ".meshlog.json";

/// Values remembered between runs.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub serial_port: Option<String>,
}

impl Settings {
	pub fn default_path() -> PathBuf {
		PathBuf::from(SETTINGS_FILE)
	}

	/// Missing or unreadable settings fall back to defaults.
	pub fn load(path: &Path) -> Self {
		let text = match std::fs::read_to_string(path) {
			Ok(text) => text,
			Err(_) => return Self::default(),
		};
		serde_json::from_str(&text).unwrap_or_else(|e| {
			log::warn!("ignoring {}: {e}", path.display());
			Self::default()
		})
	}

	pub fn save(&self, path: &Path) -> Result<()> {
		let json = serde_json::to_string_pretty(self)?;
		std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
		Ok(())
	}
}
