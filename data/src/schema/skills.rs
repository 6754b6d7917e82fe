use std::collections::HashMap;

/// Built-in skill table; the order of `skills` is the wire index.
pub const BUILTIN: &str = include_str!("../../skills.json");

#[derive(Debug, serde::Deserialize)]
pub struct SkillTable {
	pub version: u8,
	pub skills: Vec<SkillEntry>,
}

#[derive(Debug, serde::Deserialize)]
pub struct SkillEntry {
	pub name: String,
	pub max_level: u8,
}

/// `skills_<code>.json`: canonical (English) name to localized name.
#[derive(Debug, serde::Deserialize)]
pub struct LocalizedNames {
	pub version: u8,
	pub names: HashMap<String, String>,
}

/// `corrections_<code>.json`: frequent OCR misreads to the localized name.
pub type Corrections = HashMap<String, String>;
