use std::fmt;

/// Highest decoration slot level.
pub const MAX_SLOT_LEVEL: u8 = 4;
/// Most decoration slots a charm can carry.
pub const MAX_SLOTS: usize = 3;

/// One charm skill as read from a frame.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct CharmRecord {
	pub name: String,
	pub skill_level: u8,
	pub slot_levels: Vec<u8>,
	/// File name of the unique frame the record was read from.
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub source_frame_id: String,
	/// Layout region inside that frame.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub source_region: Option<u32>,
	pub validity: Validity,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Validity {
	Valid,
	Invalid(InvalidReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidReason {
	/// Not checked against a vocabulary yet.
	Unchecked,
	UnknownName,
	LevelOutOfRange { max: u8 },
	TooManySlots,
	SlotOutOfRange,
	SlotsNotDescending,
}

impl fmt::Display for InvalidReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Unchecked => write!(f, "not validated"),
			Self::UnknownName => write!(f, "unknown skill name"),
			Self::LevelOutOfRange { max } => write!(f, "skill level outside 1..={max}"),
			Self::TooManySlots => write!(f, "more than {MAX_SLOTS} slots"),
			Self::SlotOutOfRange => write!(f, "slot level above {MAX_SLOT_LEVEL}"),
			Self::SlotsNotDescending => write!(f, "slot levels not in descending order"),
		}
	}
}

/// The part of a record that decides whether two records are the same charm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Identity<'a> {
	pub name: &'a str,
	pub skill_level: u8,
	pub slot_levels: &'a [u8],
}

impl CharmRecord {
	/// A record that has not been validated yet.
	pub fn unchecked(name: impl Into<String>, skill_level: u8, slot_levels: Vec<u8>) -> Self {
		Self {
			name: name.into(),
			skill_level,
			slot_levels,
			source_frame_id: String::new(),
			source_region: None,
			validity: Validity::Invalid(InvalidReason::Unchecked),
		}
	}

	pub fn with_source(mut self, frame_id: impl Into<String>, region: Option<u32>) -> Self {
		self.source_frame_id = frame_id.into();
		self.source_region = region;
		self
	}

	pub fn is_valid(&self) -> bool {
		self.validity == Validity::Valid
	}

	pub fn invalid_reason(&self) -> Option<InvalidReason> {
		match self.validity {
			Validity::Valid => None,
			Validity::Invalid(reason) => Some(reason),
		}
	}

	pub fn identity(&self) -> Identity<'_> {
		Identity {
			name: &self.name,
			skill_level: self.skill_level,
			slot_levels: &self.slot_levels,
		}
	}
}

impl fmt::Display for CharmRecord {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} Lv{} {:?}", self.name, self.skill_level, self.slot_levels)
	}
}

/// Check the slot rules that do not depend on the vocabulary.
pub fn check_slots(slots: &[u8]) -> Result<(), InvalidReason> {
	if slots.len() > MAX_SLOTS {
		return Err(InvalidReason::TooManySlots);
	}
	if slots.iter().any(|&s| s > MAX_SLOT_LEVEL) {
		return Err(InvalidReason::SlotOutOfRange);
	}
	if slots.windows(2).any(|w| w[0] < w[1]) {
		return Err(InvalidReason::SlotsNotDescending);
	}
	Ok(())
}
