//! Record deduplication.
//!
//! Each mode maps a record to a key; two valid records collide when their keys
//! are equal. The first record with a given key is kept untouched and later
//! ones are dropped. Invalid records never collide and always pass through.

use std::{collections::HashSet, fmt, str::FromStr};

use anyhow::bail;

use crate::{CharmRecord, CharmSet};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize)]
pub enum DedupMode {
	/// Name, level and slot sequence must match exactly.
	#[serde(rename = "exact")]
	Exact,
	/// Slot order is ignored, since OCR can misorder the slot icons of a charm.
	#[default]
	#[serde(rename = "a")]
	Approximate,
}

/// Collision key of a record under some mode.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
	name: String,
	skill_level: u8,
	slot_levels: Vec<u8>,
}

impl DedupMode {
	pub const ALL: [DedupMode; 2] = [Self::Exact, Self::Approximate];

	pub fn token(&self) -> &'static str {
		match self {
			Self::Exact => "exact",
			Self::Approximate => "a",
		}
	}

	pub fn key(&self, record: &CharmRecord) -> DedupKey {
		let id = record.identity();
		let mut slot_levels = id.slot_levels.to_vec();
		match self {
			Self::Exact => {}
			Self::Approximate => slot_levels.sort_unstable(),
		}
		DedupKey {
			name: id.name.to_owned(),
			skill_level: id.skill_level,
			slot_levels,
		}
	}

	pub fn collides(&self, a: &CharmRecord, b: &CharmRecord) -> bool {
		a.is_valid() && b.is_valid() && self.key(a) == self.key(b)
	}
}

impl FromStr for DedupMode {
	type Err = anyhow::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim() {
			"exact" | "e" => Ok(Self::Exact),
			"a" | "approximate" => Ok(Self::Approximate),
			other => bail!(
				"unknown dedup mode {other:?}, expected one of: {}",
				Self::ALL.map(|m| m.token()).join(", ")
			),
		}
	}
}

impl fmt::Display for DedupMode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.token())
	}
}

/// Drop later valid duplicates, keeping first-seen order.
pub fn remove_duplicates(set: CharmSet, mode: DedupMode) -> CharmSet {
	let before = set.len();
	let mut seen = HashSet::new();
	let out = set
		.into_iter()
		.filter(|record| !record.is_valid() || seen.insert(mode.key(record)))
		.collect::<CharmSet>();

	tracing::debug!(%mode, before, after = out.len(), "removed duplicate charms");
	out
}
