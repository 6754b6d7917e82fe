//! Charm list wire format for the web set builder.
//!
//! Layout (all big-endian):
//!
//! ```text
//! byte 0      format version (FORMAT_VERSION)
//! byte 1      skill table version
//! then per charm, one 32-bit word:
//!   31..22    skill index in the table      (10 bits)
//!   21..18    skill level                   (4 bits)
//!   17..16    slot count                    (2 bits)
//!   15..13    slot 1 level                  (3 bits)
//!   12..10    slot 2 level                  (3 bits)
//!    9..7     slot 3 level                  (3 bits)
//!    6..0     reserved, zero
//! ```
//!
//! The bytes are written as URL-safe base64 without padding.

use std::path::Path;

use anyhow::Context;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use thiserror::Error;

use crate::{CharmSet, Vocabulary};

pub const FORMAT_VERSION: u8 = 1;
pub const NAME_BITS: u32 = 10;
pub const LEVEL_BITS: u32 = 4;
pub const SLOT_BITS: u32 = 3;
const COUNT_BITS: u32 = 2;
const HEADER_LEN: usize = 2;
const WORD_LEN: usize = 4;

const NAME_SHIFT: u32 = 32 - NAME_BITS;
const LEVEL_SHIFT: u32 = NAME_SHIFT - LEVEL_BITS;
const COUNT_SHIFT: u32 = LEVEL_SHIFT - COUNT_BITS;
const SLOTS_SHIFT: u32 = COUNT_SHIFT - SLOT_BITS;
const RESERVED_MASK: u32 = (1 << (SLOTS_SHIFT - 2 * SLOT_BITS)) - 1;
const MAX_WIRE_SLOTS: usize = (1 << COUNT_BITS) - 1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
	#[error("charm {index} names {name:?}, which is not in skill table v{version}")]
	UnknownSkill { index: usize, name: String, version: u8 },
	#[error("skill table has {len} entries, the wire format indexes at most {}", 1u32 << NAME_BITS)]
	TableTooLarge { len: usize },
	#[error("charm {index} has skill level {level}, the wire format holds at most {}", (1u32 << LEVEL_BITS) - 1)]
	LevelTooLarge { index: usize, level: u8 },
	#[error("charm {index} has {count} slots, the wire format holds at most {}", MAX_WIRE_SLOTS)]
	TooManySlots { index: usize, count: usize },
	#[error("charm {index} has slot level {level}, the wire format holds at most {}", (1u32 << SLOT_BITS) - 1)]
	SlotTooLarge { index: usize, level: u8 },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
	#[error("not base64: {0}")]
	Base64(#[from] base64::DecodeError),
	#[error("missing header")]
	MissingHeader,
	#[error("format version {found}, expected {}", FORMAT_VERSION)]
	FormatVersion { found: u8 },
	#[error("encoded against skill table v{found}, this table is v{expected}")]
	TableVersion { found: u8, expected: u8 },
	#[error("{len} trailing bytes do not form a charm")]
	Truncated { len: usize },
	#[error("charm {index} has reserved bits set")]
	ReservedBits { index: usize },
	#[error("charm {index} references skill index {skill}, which is not in the table")]
	UnknownSkill { index: usize, skill: usize },
}

/// One charm as read back from the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedCharm {
	pub name: String,
	pub skill_level: u8,
	pub slot_levels: Vec<u8>,
}

/// Encode every valid record of `set`, in order.
///
/// Invalid records are left out. A valid record that the table cannot index,
/// or that does not fit the field widths, fails the whole batch.
pub fn encode(set: &CharmSet, vocab: &Vocabulary) -> Result<String, EncodeError> {
	if vocab.len() > 1 << NAME_BITS {
		return Err(EncodeError::TableTooLarge { len: vocab.len() });
	}

	let skipped = set.invalid_count();
	if skipped > 0 {
		tracing::warn!(skipped, "invalid charms left out of the encoded list");
	}

	let mut bytes = Vec::with_capacity(HEADER_LEN + set.len() * WORD_LEN);
	bytes.extend_from_slice(&[FORMAT_VERSION, vocab.version()]);

	for (index, record) in set.iter().enumerate().filter(|(_, r)| r.is_valid()) {
		let skill = vocab.index_of(&record.name).ok_or_else(|| EncodeError::UnknownSkill {
			index,
			name: record.name.clone(),
			version: vocab.version(),
		})?;
		if record.skill_level as u32 >= 1 << LEVEL_BITS {
			return Err(EncodeError::LevelTooLarge { index, level: record.skill_level });
		}
		if record.slot_levels.len() > MAX_WIRE_SLOTS {
			return Err(EncodeError::TooManySlots { index, count: record.slot_levels.len() });
		}

		let mut word = (skill as u32) << NAME_SHIFT
			| (record.skill_level as u32) << LEVEL_SHIFT
			| (record.slot_levels.len() as u32) << COUNT_SHIFT;
		for (i, &level) in record.slot_levels.iter().enumerate() {
			if level as u32 >= 1 << SLOT_BITS {
				return Err(EncodeError::SlotTooLarge { index, level });
			}
			word |= (level as u32) << (SLOTS_SHIFT - i as u32 * SLOT_BITS);
		}
		bytes.extend_from_slice(&word.to_be_bytes());
	}

	Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Read an encoded list back against the same table version.
pub fn decode(text: &str, vocab: &Vocabulary) -> Result<Vec<DecodedCharm>, DecodeError> {
	let bytes = URL_SAFE_NO_PAD.decode(text.trim())?;
	let (header, body) = bytes.split_at_checked(HEADER_LEN).ok_or(DecodeError::MissingHeader)?;
	if header[0] != FORMAT_VERSION {
		return Err(DecodeError::FormatVersion { found: header[0] });
	}
	if header[1] != vocab.version() {
		return Err(DecodeError::TableVersion {
			found: header[1],
			expected: vocab.version(),
		});
	}

	let words = body.chunks_exact(WORD_LEN);
	if !words.remainder().is_empty() {
		return Err(DecodeError::Truncated { len: words.remainder().len() });
	}

	words
		.enumerate()
		.map(|(index, chunk)| {
			let word = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
			if word & RESERVED_MASK != 0 {
				return Err(DecodeError::ReservedBits { index });
			}

			let skill = (word >> NAME_SHIFT) as usize;
			let name = vocab
				.name_at(skill)
				.ok_or(DecodeError::UnknownSkill { index, skill })?;
			let skill_level = field(word, LEVEL_SHIFT, LEVEL_BITS);
			let count = field(word, COUNT_SHIFT, COUNT_BITS) as u32;
			let slot_levels = (0..count)
				.map(|i| field(word, SLOTS_SHIFT - i * SLOT_BITS, SLOT_BITS))
				.collect();

			Ok(DecodedCharm {
				name: name.to_owned(),
				skill_level,
				slot_levels,
			})
		})
		.collect()
}

fn field(word: u32, shift: u32, bits: u32) -> u8 {
	((word >> shift) & ((1 << bits) - 1)) as u8
}

/// Encode a persisted charm list into a text file. Returns the number of
/// charms written.
pub fn encode_file(charm_json: &Path, encoded: &Path, vocab: &Vocabulary) -> anyhow::Result<usize> {
	let set = CharmSet::load(charm_json)?;
	let text = encode(&set, vocab).with_context(|| format!("Encode {}", charm_json.display()))?;
	if let Some(parent) = encoded.parent().filter(|p| !p.as_os_str().is_empty()) {
		std::fs::create_dir_all(parent).with_context(|| format!("Create dir {}", parent.display()))?;
	}
	std::fs::write(encoded, &text).with_context(|| format!("Write {}", encoded.display()))?;
	Ok(set.len() - set.invalid_count())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{CharmRecord, Language, Validity};

	fn vocab() -> Vocabulary {
		Vocabulary::from_skills(1, Language::English, [("Attack", 7), ("Guard", 5), ("Focus", 3)])
	}

	fn valid(name: &str, level: u8, slots: &[u8]) -> CharmRecord {
		let mut r = CharmRecord::unchecked(name, level, slots.to_vec());
		r.validity = Validity::Valid;
		r
	}

	fn tuples(decoded: &[DecodedCharm]) -> Vec<(&str, u8, &[u8])> {
		decoded
			.iter()
			.map(|d| (d.name.as_str(), d.skill_level, d.slot_levels.as_slice()))
			.collect()
	}

	#[test]
	fn single_charm_round_trip() {
		let v = vocab();
		let set = CharmSet::from_iter([valid("Attack", 1, &[2, 0, 0])]);
		let text = encode(&set, &v).unwrap();
		let decoded = decode(&text, &v).unwrap();
		assert_eq!(tuples(&decoded), vec![("Attack", 1, &[2u8, 0, 0][..])]);
	}

	#[test]
	fn order_and_slot_counts_survive() {
		let v = vocab();
		let set = CharmSet::from_iter([
			valid("Focus", 3, &[]),
			valid("Guard", 5, &[4]),
			valid("Attack", 7, &[3, 3]),
			valid("Focus", 3, &[]),
		]);
		let decoded = decode(&encode(&set, &v).unwrap(), &v).unwrap();
		assert_eq!(
			tuples(&decoded),
			vec![
				("Focus", 3, &[][..]),
				("Guard", 5, &[4][..]),
				("Attack", 7, &[3, 3][..]),
				("Focus", 3, &[][..]),
			]
		);
	}

	#[test]
	fn known_bytes() {
		let v = vocab();
		let set = CharmSet::from_iter([valid("Guard", 2, &[2, 1])]);
		let text = encode(&set, &v).unwrap();
		let bytes = URL_SAFE_NO_PAD.decode(&text).unwrap();
		// index 1, level 2, two slots: 2 then 1.
		let word: u32 = 1 << 22 | 2 << 18 | 2 << 16 | 2 << 13 | 1 << 10;
		let mut expected = vec![FORMAT_VERSION, 1];
		expected.extend_from_slice(&word.to_be_bytes());
		assert_eq!(bytes, expected);
	}

	#[test]
	fn unknown_names_fail_the_batch() {
		let v = vocab();
		let set = CharmSet::from_iter([valid("Guard", 1, &[]), valid("Attack Boost", 1, &[])]);
		assert_eq!(
			encode(&set, &v),
			Err(EncodeError::UnknownSkill {
				index: 1,
				name: "Attack Boost".into(),
				version: 1,
			})
		);
	}

	#[test]
	fn oversized_fields_fail_the_batch() {
		let v = vocab();
		let level = CharmSet::from_iter([valid("Guard", 16, &[])]);
		assert!(matches!(encode(&level, &v), Err(EncodeError::LevelTooLarge { .. })));
		let slots = CharmSet::from_iter([valid("Guard", 1, &[1, 1, 1, 1])]);
		assert!(matches!(encode(&slots, &v), Err(EncodeError::TooManySlots { .. })));
		let slot = CharmSet::from_iter([valid("Guard", 1, &[8])]);
		assert!(matches!(encode(&slot, &v), Err(EncodeError::SlotTooLarge { .. })));
	}

	#[test]
	fn invalid_records_are_left_out() {
		let v = vocab();
		let set = CharmSet::from_iter([
			valid("Guard", 1, &[]),
			CharmRecord::unchecked("Nonsense", 1, vec![]),
		]);
		let decoded = decode(&encode(&set, &v).unwrap(), &v).unwrap();
		assert_eq!(decoded.len(), 1);
	}

	#[test]
	fn decode_rejects_foreign_input() {
		let v = vocab();
		let other = Vocabulary::from_skills(2, Language::English, [("Attack", 7)]);
		let text = encode(&CharmSet::from_iter([valid("Attack", 1, &[])]), &v).unwrap();

		assert_eq!(decode(&text, &other), Err(DecodeError::TableVersion { found: 1, expected: 2 }));
		assert_eq!(decode("", &v), Err(DecodeError::MissingHeader));
		assert!(matches!(decode("***", &v), Err(DecodeError::Base64(_))));

		let truncated = URL_SAFE_NO_PAD.encode([FORMAT_VERSION, 1, 0, 0]);
		assert_eq!(decode(&truncated, &v), Err(DecodeError::Truncated { len: 2 }));

		let reserved = URL_SAFE_NO_PAD.encode([FORMAT_VERSION, 1, 0, 0, 0, 1]);
		assert_eq!(decode(&reserved, &v), Err(DecodeError::ReservedBits { index: 0 }));

		let missing = URL_SAFE_NO_PAD.encode([FORMAT_VERSION, 1, 0xFF, 0xC0, 0, 0]);
		assert_eq!(decode(&missing, &v), Err(DecodeError::UnknownSkill { index: 0, skill: 1023 }));
	}

	#[test]
	fn encode_file_reads_a_saved_list() {
		let dir = tempfile::tempdir().unwrap();
		let json = dir.path().join("charms.json");
		let out = dir.path().join("charms.encoded.txt");
		let v = vocab();
		let set = CharmSet::from_iter([valid("Focus", 2, &[1])]);
		set.save(&json).unwrap();

		assert_eq!(encode_file(&json, &out, &v).unwrap(), 1);
		let text = std::fs::read_to_string(&out).unwrap();
		assert_eq!(text, encode(&set, &v).unwrap());
	}
}
