//! Run configuration.
//!
//! Stored as JSON. Every field has a default, so a config file only needs the
//! keys it changes.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use data::{DedupMode, Language};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory of captured stills, read in file name order.
    pub input_dir: PathBuf,

    /// Where the unique frames are written.
    pub frame_dir: PathBuf,

    /// Charm list JSON, rewritten on every run.
    pub charm_json: PathBuf,

    /// Encoded export of the charm list.
    pub charm_encoded: PathBuf,

    /// Game client language; picks the OCR model and skill names.
    pub language: Language,

    /// Two frames are the same when their fingerprints differ by at most this many bits.
    pub similarity_threshold: u32,

    /// Automated re-reads per invalid record before asking for help.
    pub repair_attempts: u32,

    pub dedup_mode: DedupMode,

    /// Reuse the frames already in `frame_dir`.
    pub skip_frames: bool,

    /// Reuse the charm list already at `charm_json`; only encode it.
    pub skip_charms: bool,

    /// Localized skill names and OCR corrections.
    pub skills_dir: Option<PathBuf>,

    /// Screen anchors of the charm detail panel.
    pub layout: ie::CharmLayout,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("inputs"),
            frame_dir: PathBuf::from("frames"),
            charm_json: PathBuf::from("charms.json"),
            charm_encoded: PathBuf::from("charms.encoded.txt"),
            language: Language::default(),
            similarity_threshold: 12,
            repair_attempts: 3,
            dedup_mode: DedupMode::default(),
            skip_frames: false,
            skip_charms: false,
            skills_dir: dirs::data_dir().map(|d| d.join("charmex").join("skills")),
            layout: ie::CharmLayout::default(),
        }
    }
}

impl Config {
    /// Load configuration, falling back to defaults when the file is broken.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "failed to load config; using defaults");
                Self::default()
            }
        }
    }

    /// Load configuration; a missing file yields the defaults.
    pub fn try_load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let json = fs::read_to_string(path).with_context(|| format!("read {:?}", path))?;
        let cfg = serde_json::from_str(&json).with_context(|| format!("parse {:?}", path))?;
        Ok(cfg)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| format!("create {:?}", parent))?;
        }
        let json = serde_json::to_string_pretty(self).context("serialize config")?;
        fs::write(path, json).with_context(|| format!("write {:?}", path))?;
        Ok(())
    }
}
