use std::{
	fs::File,
	io::{BufReader, BufWriter, Write},
	path::Path,
};

use anyhow::{Context, Result};

use crate::CharmRecord;

/// Ordered collection of charm records, in extraction order.
///
/// Repair and deduplication consume a set and return a new one.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct CharmSet {
	records: Vec<CharmRecord>,
}

impl CharmSet {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn push(&mut self, record: CharmRecord) {
		self.records.push(record);
	}

	pub fn len(&self) -> usize {
		self.records.len()
	}

	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}

	pub fn records(&self) -> &[CharmRecord] {
		&self.records
	}

	pub fn iter(&self) -> std::slice::Iter<'_, CharmRecord> {
		self.records.iter()
	}

	pub fn has_invalids(&self) -> bool {
		self.records.iter().any(|r| !r.is_valid())
	}

	pub fn invalid_count(&self) -> usize {
		self.records.iter().filter(|r| !r.is_valid()).count()
	}

	pub fn load(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let file = File::open(path).with_context(|| format!("Open charm list {}", path.display()))?;
		serde_json::from_reader(BufReader::new(file))
			.with_context(|| format!("Parse charm list {}", path.display()))
	}

	/// Write the set as pretty JSON, replacing `path` only once fully written.
	pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
		let path = path.as_ref();
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			std::fs::create_dir_all(parent).with_context(|| format!("Create dir {}", parent.display()))?;
		}

		let tmp = path.with_extension("json.tmp");
		let file = File::create(&tmp).with_context(|| format!("Write temp {}", tmp.display()))?;
		let mut writer = BufWriter::new(file);
		serde_json::to_writer_pretty(&mut writer, self).context("Serialize charm list")?;
		writer.flush().context("Flush charm list")?;
		drop(writer);

		// Replace existing file (Windows-friendly).
		if std::fs::rename(&tmp, path).is_err() {
			let _ = std::fs::remove_file(path);
			std::fs::rename(&tmp, path).with_context(|| format!("Persist charm list {}", path.display()))?;
		}
		Ok(())
	}
}

impl FromIterator<CharmRecord> for CharmSet {
	fn from_iter<T: IntoIterator<Item = CharmRecord>>(iter: T) -> Self {
		Self {
			records: iter.into_iter().collect(),
		}
	}
}

impl Extend<CharmRecord> for CharmSet {
	fn extend<T: IntoIterator<Item = CharmRecord>>(&mut self, iter: T) {
		self.records.extend(iter);
	}
}

impl IntoIterator for CharmSet {
	type Item = CharmRecord;
	type IntoIter = std::vec::IntoIter<CharmRecord>;

	fn into_iter(self) -> Self::IntoIter {
		self.records.into_iter()
	}
}

impl<'a> IntoIterator for &'a CharmSet {
	type Item = &'a CharmRecord;
	type IntoIter = std::slice::Iter<'a, CharmRecord>;

	fn into_iter(self) -> Self::IntoIter {
		self.records.iter()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{InvalidReason, Validity};

	fn sample() -> CharmSet {
		let mut valid = CharmRecord::unchecked("Guard", 2, vec![2, 1]).with_source("frame_00000.png", Some(0));
		valid.validity = Validity::Valid;
		let invalid = CharmRecord::unchecked("Gard", 2, vec![]).with_source("frame_00001.png", Some(1));
		[valid, invalid].into_iter().collect()
	}

	#[test]
	fn invalid_tracking() {
		let set = sample();
		assert!(set.has_invalids());
		assert_eq!(set.invalid_count(), 1);
		assert_eq!(set.records()[1].invalid_reason(), Some(InvalidReason::Unchecked));

		let only_valid = set.into_iter().filter(|r| r.is_valid()).collect::<CharmSet>();
		assert!(!only_valid.has_invalids());
		assert!(!CharmSet::new().has_invalids());
	}

	#[test]
	fn save_then_load_keeps_order_and_tags() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("out").join("charms.json");

		let set = sample();
		set.save(&path).unwrap();
		assert!(!path.with_extension("json.tmp").exists());
		assert_eq!(CharmSet::load(&path).unwrap(), set);

		// Overwrite an existing file.
		CharmSet::new().save(&path).unwrap();
		assert!(CharmSet::load(&path).unwrap().is_empty());
	}

	#[test]
	fn loads_records_without_provenance() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("charms.json");
		std::fs::write(
			&path,
			r#"[{"name": "Focus", "skill_level": 1, "slot_levels": [1], "validity": "valid"}]"#,
		)
		.unwrap();

		let set = CharmSet::load(&path).unwrap();
		assert_eq!(set.len(), 1);
		assert_eq!(set.records()[0].source_frame_id, "");
		assert_eq!(set.records()[0].source_region, None);
	}

	#[test]
	fn corrupt_files_are_errors() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("charms.json");
		std::fs::write(&path, "{not json").unwrap();
		assert!(CharmSet::load(&path).is_err());
		assert!(CharmSet::load(dir.path().join("missing.json")).is_err());
	}
}
