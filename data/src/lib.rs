use std::{
	collections::HashMap,
	fs::File,
	io::BufReader,
	path::Path,
};

use anyhow::{Context, Result, bail};

mod charm;
pub use charm::*;
pub mod dedup;
pub use dedup::DedupMode;
pub mod encoding;
mod schema;
mod set;
pub use set::CharmSet;
mod structs;
pub use structs::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skill {
	/// English name from the built-in table.
	pub canonical: String,
	/// Name as shown by the game client in the vocabulary's language.
	pub name: String,
	pub max_level: u8,
}

/// Skill names and level caps for one language.
///
/// The position of a skill in the table is its wire index, so the table is
/// append-only and versioned: a blob encoded against version N only decodes
/// against version N.
#[derive(Debug, Clone)]
pub struct Vocabulary {
	version: u8,
	lang: Language,
	skills: Vec<Skill>,
	by_name: HashMap<String, usize>,
	corrections: HashMap<String, usize>,
}

impl Vocabulary {
	/// Build a vocabulary from `(name, max_level)` pairs in wire order.
	pub fn from_skills<'a>(version: u8, lang: Language, skills: impl IntoIterator<Item = (&'a str, u8)>) -> Self {
		let skills = skills
			.into_iter()
			.map(|(name, max_level)| Skill {
				canonical: name.to_owned(),
				name: name.to_owned(),
				max_level,
			})
			.collect::<Vec<_>>();
		Self::from_table(version, lang, skills)
	}

	fn from_table(version: u8, lang: Language, skills: Vec<Skill>) -> Self {
		let by_name = skills
			.iter()
			.enumerate()
			.map(|(i, s)| (s.name.clone(), i))
			.collect();
		Self {
			version,
			lang,
			skills,
			by_name,
			corrections: HashMap::new(),
		}
	}

	/// The built-in English table.
	pub fn builtin() -> Result<Self> {
		let table: schema::skills::SkillTable =
			serde_json::from_str(schema::skills::BUILTIN).context("Parse built-in skill table")?;
		let skills = table
			.skills
			.into_iter()
			.map(|s| Skill {
				canonical: s.name.clone(),
				name: s.name,
				max_level: s.max_level,
			})
			.collect();
		Ok(Self::from_table(table.version, Language::English, skills))
	}

	/// The built-in table localized for `lang`.
	///
	/// Non-English languages need `skills_<code>.json` in `dir`; a missing
	/// or mismatched name file is an error. `corrections_<code>.json` is
	/// optional for every language.
	pub fn load(lang: Language, dir: Option<&Path>) -> Result<Self> {
		let mut vocab = Self::builtin()?;
		vocab.lang = lang;

		if lang != Language::English {
			let dir = dir.with_context(|| format!("No skill directory configured for language {lang}"))?;
			let path = dir.join(format!("skills_{}.json", lang.code()));
			let names: schema::skills::LocalizedNames = read_json(&path)?;
			if names.version != vocab.version {
				bail!(
					"{} is for skill table v{}, built-in table is v{}",
					path.display(),
					names.version,
					vocab.version
				);
			}
			for skill in &mut vocab.skills {
				if let Some(local) = names.names.get(&skill.canonical) {
					skill.name = local.clone();
				} else {
					tracing::warn!(skill = %skill.canonical, %lang, "no localized name, keeping English");
				}
			}
			vocab = Self::from_table(vocab.version, lang, vocab.skills);
		}

		if let Some(dir) = dir {
			let path = dir.join(format!("corrections_{}.json", lang.code()));
			if path.is_file() {
				let corrections: schema::skills::Corrections = read_json(&path)?;
				vocab.add_corrections(corrections);
			}
		}

		Ok(vocab)
	}

	/// Map frequent OCR misreads straight to a skill.
	///
	/// Entries whose target is not a skill of this vocabulary are ignored.
	pub fn add_corrections(&mut self, corrections: impl IntoIterator<Item = (String, String)>) {
		for (misread, correct) in corrections {
			match self.by_name.get(&correct) {
				Some(&index) => {
					self.corrections.insert(misread, index);
				}
				None => tracing::warn!(%misread, %correct, "correction targets an unknown skill"),
			}
		}
	}

	pub fn version(&self) -> u8 {
		self.version
	}

	pub fn language(&self) -> Language {
		self.lang
	}

	pub fn len(&self) -> usize {
		self.skills.len()
	}

	pub fn is_empty(&self) -> bool {
		self.skills.is_empty()
	}

	pub fn skills(&self) -> &[Skill] {
		&self.skills
	}

	/// Wire index of a skill, by localized or canonical name.
	pub fn index_of(&self, name: &str) -> Option<usize> {
		self.by_name
			.get(name)
			.copied()
			.or_else(|| self.skills.iter().position(|s| s.canonical == name))
	}

	pub fn name_at(&self, index: usize) -> Option<&str> {
		self.skills.get(index).map(|s| s.name.as_str())
	}

	pub fn contains(&self, name: &str) -> bool {
		self.by_name.contains_key(name)
	}

	pub fn max_level(&self, name: &str) -> Option<u8> {
		self.by_name.get(name).map(|&i| self.skills[i].max_level)
	}

	/// Tag a record as valid or invalid.
	pub fn check(&self, mut record: CharmRecord) -> CharmRecord {
		record.validity = match self.validate(&record.name, record.skill_level, &record.slot_levels) {
			Ok(()) => Validity::Valid,
			Err(reason) => Validity::Invalid(reason),
		};
		record
	}

	pub fn validate(&self, name: &str, skill_level: u8, slot_levels: &[u8]) -> Result<(), InvalidReason> {
		let max = self.max_level(name).ok_or(InvalidReason::UnknownName)?;
		if !(1..=max).contains(&skill_level) {
			return Err(InvalidReason::LevelOutOfRange { max });
		}
		charm::check_slots(slot_levels)
	}

	/// Attempts to find the closest skill name from a dirty OCR string.
	///
	/// Deterministic: ties go to the skill listed first in the table.
	/// Returns `None` when nothing is close enough to be a guess worth making.
	pub fn find_skill_name(&self, name: &str) -> Option<&str> {
		let name = name.trim();
		if let Some(&i) = self.by_name.get(name).or_else(|| self.corrections.get(name)) {
			return Some(&self.skills[i].name);
		}

		let lower = name.to_lowercase();
		if let Some(skill) = self.skills.iter().find(|s| s.name.to_lowercase() == lower) {
			return Some(&skill.name);
		}

		// Leading noise ("x Attack Boost", a stray icon read as a letter).
		let mut start = 0;
		while let Some(index) = name[start..].find(' ') {
			start += index + 1;
			if let Some(&i) = self.by_name.get(&name[start..]) {
				return Some(&self.skills[i].name);
			}
		}

		// Very short readings are close to everything by edit distance.
		if name.chars().count() < 3 {
			return None;
		}

		let mut best: Option<(&Skill, usize)> = None;
		for skill in &self.skills {
			let lev = levenshtein::levenshtein(&lower, &skill.name.to_lowercase());
			if best.is_none_or(|(_, min)| lev < min) {
				best = Some((skill, lev));
			}
		}

		let (skill, min) = best?;
		let max_len = lower.chars().count().max(skill.name.chars().count());
		if min > (max_len / 3).max(2) {
			return None;
		}
		Some(&skill.name)
	}

	/// Best-effort automated fix of a record.
	///
	/// Snaps the name to the closest skill, clamps the level into the skill's
	/// range, clamps slot levels, keeps the first three slots and orders them
	/// descending. The result is re-validated; provenance is kept.
	pub fn correct(&self, record: &CharmRecord) -> CharmRecord {
		let name = self
			.find_skill_name(&record.name)
			.map(str::to_owned)
			.unwrap_or_else(|| record.name.clone());

		let skill_level = match self.max_level(&name) {
			Some(max) => record.skill_level.clamp(1, max),
			None => record.skill_level,
		};

		let mut slot_levels = record
			.slot_levels
			.iter()
			.take(MAX_SLOTS)
			.map(|&s| s.min(MAX_SLOT_LEVEL))
			.collect::<Vec<_>>();
		slot_levels.sort_unstable_by(|a, b| b.cmp(a));

		self.check(CharmRecord {
			name,
			skill_level,
			slot_levels,
			source_frame_id: record.source_frame_id.clone(),
			source_region: record.source_region,
			validity: record.validity.clone(),
		})
	}
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
	let file = File::open(path).with_context(|| format!("Open {}", path.display()))?;
	serde_json::from_reader(BufReader::new(file)).with_context(|| format!("Parse {}", path.display()))
}
