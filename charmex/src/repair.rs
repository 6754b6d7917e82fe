//! Repair of records that failed validation.
//!
//! Each invalid record gets a bounded number of automated attempts: re-read
//! the region with looser bounds, then snap the reading to the vocabulary. A
//! record still invalid after that goes to a [`RepairCollaborator`], which
//! may supply a replacement or decline.

use std::{
	collections::HashMap,
	io::{BufRead, Write},
	path::PathBuf,
};

use data::{CharmRecord, CharmSet, Vocabulary};
use ie::{Ie, Image, OwnedImage};

use crate::{extract::record_from_reading, frames::FrameStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairDecision {
	Replace {
		name: String,
		skill_level: u8,
		slot_levels: Vec<u8>,
	},
	Decline,
}

/// Last-resort source of corrections, typically a human.
pub trait RepairCollaborator {
	/// `crop` shows the region the record was read from, when the frame is still available.
	fn repair(&mut self, record: &CharmRecord, crop: Option<Image<'_>>) -> RepairDecision;
}

/// Declines everything; for unattended runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoDecline;

impl RepairCollaborator for AutoDecline {
	fn repair(&mut self, _record: &CharmRecord, _crop: Option<Image<'_>>) -> RepairDecision {
		RepairDecision::Decline
	}
}

/// Asks on a line-based console.
///
/// The crop is written to `crop_path` for the user to look at. A reply is
/// `<name> <level> [slot ...]`; an empty line or end of input declines.
pub struct ConsoleRepair<R, W> {
	input: R,
	output: W,
	crop_path: Option<PathBuf>,
}

impl<R: BufRead, W: Write> ConsoleRepair<R, W> {
	pub fn new(input: R, output: W, crop_path: Option<PathBuf>) -> Self {
		Self {
			input,
			output,
			crop_path,
		}
	}

	fn ask(&mut self, record: &CharmRecord, crop: Option<Image<'_>>) -> std::io::Result<RepairDecision> {
		writeln!(self.output)?;
		writeln!(self.output, "Invalid charm: {record}")?;
		if let Some(reason) = record.invalid_reason() {
			writeln!(self.output, "  reason: {reason}")?;
		}
		if !record.source_frame_id.is_empty() {
			writeln!(self.output, "  frame:  {}", record.source_frame_id)?;
		}
		if let (Some(crop), Some(path)) = (crop, &self.crop_path) {
			match crop.save_png(path) {
				Ok(()) => writeln!(self.output, "  image:  {}", path.display())?,
				Err(err) => tracing::warn!(error = %format!("{err:#}"), "could not write repair crop"),
			}
		}

		loop {
			write!(self.output, "Correct as `<name> <level> [slots]` (empty to skip): ")?;
			self.output.flush()?;

			let mut line = String::new();
			if self.input.read_line(&mut line)? == 0 {
				return Ok(RepairDecision::Decline);
			}
			match parse_reply(&line) {
				Some(decision) => return Ok(decision),
				None => writeln!(self.output, "Could not read that, try again.")?,
			}
		}
	}
}

impl<R: BufRead, W: Write> RepairCollaborator for ConsoleRepair<R, W> {
	fn repair(&mut self, record: &CharmRecord, crop: Option<Image<'_>>) -> RepairDecision {
		match self.ask(record, crop) {
			Ok(decision) => decision,
			Err(err) => {
				tracing::warn!(error = %err, "console unavailable; declining repair");
				RepairDecision::Decline
			}
		}
	}
}

/// Parse `<name> <level> [slot ...]`. The name is everything before the first
/// numeric token. `None` for malformed input.
pub fn parse_reply(line: &str) -> Option<RepairDecision> {
	let line = line.trim();
	if line.is_empty() {
		return Some(RepairDecision::Decline);
	}

	let tokens = line.split_whitespace().collect::<Vec<_>>();
	let split = tokens.iter().position(|t| t.parse::<u8>().is_ok())?;
	if split == 0 {
		return None;
	}
	let name = tokens[..split].join(" ");
	let skill_level = tokens[split].parse().ok()?;
	let slot_levels = tokens[split + 1..]
		.iter()
		.map(|t| t.parse::<u8>().ok())
		.collect::<Option<Vec<_>>>()?;

	Some(RepairDecision::Replace {
		name,
		skill_level,
		slot_levels,
	})
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairReport {
	pub invalid: usize,
	pub fixed_automatically: usize,
	pub fixed_by_collaborator: usize,
	pub declined: usize,
}

impl RepairReport {
	pub fn remaining(&self) -> usize {
		self.invalid - self.fixed_automatically - self.fixed_by_collaborator
	}
}

/// Frames looked up by id, decoded at most once.
struct FrameCache<'a> {
	store: Option<&'a FrameStore>,
	frames: HashMap<String, Option<OwnedImage>>,
}

impl FrameCache<'_> {
	fn get(&mut self, id: &str) -> Option<&OwnedImage> {
		let store = self.store?;
		self.frames
			.entry(id.to_owned())
			.or_insert_with(|| match store.load_id(id)? {
				Ok(frame) => Some(frame.image),
				Err(err) => {
					tracing::warn!(frame = %id, error = %format!("{err:#}"), "repair frame unreadable");
					None
				}
			})
			.as_ref()
	}
}

pub struct RecordRepairer<'a> {
	ie: Option<&'a Ie>,
	vocab: &'a Vocabulary,
	frames: Option<&'a FrameStore>,
	attempts: u32,
}

impl<'a> RecordRepairer<'a> {
	/// Without an engine or frames, automated attempts can only snap the
	/// existing reading to the vocabulary.
	pub fn new(ie: Option<&'a Ie>, vocab: &'a Vocabulary, frames: Option<&'a FrameStore>, attempts: u32) -> Self {
		Self {
			ie,
			vocab,
			frames,
			attempts,
		}
	}

	/// Repair every invalid record of `set`.
	///
	/// Valid records pass through untouched. Order, count and provenance of
	/// the records never change.
	pub fn repair(&self, set: CharmSet, collaborator: &mut dyn RepairCollaborator) -> (CharmSet, RepairReport) {
		let mut cache = FrameCache {
			store: self.frames,
			frames: HashMap::new(),
		};
		let mut report = RepairReport::default();

		let out = set
			.into_iter()
			.map(|record| {
				if record.is_valid() {
					return record;
				}
				report.invalid += 1;

				let frame = cache.get(&record.source_frame_id);
				let candidate = self.auto_repair(&record, frame);
				if candidate.is_valid() {
					tracing::debug!(from = %record, to = %candidate, "repaired automatically");
					report.fixed_automatically += 1;
					return candidate;
				}

				let crop = match (self.ie, frame, record.source_region) {
					(Some(ie), Some(frame), Some(region)) => ie.charm_region_crop(frame.as_image(), region),
					_ => None,
				};
				match collaborator.repair(&candidate, crop) {
					RepairDecision::Replace {
						name,
						skill_level,
						slot_levels,
					} => {
						let replaced = self.vocab.check(CharmRecord {
							name,
							skill_level,
							slot_levels,
							source_frame_id: record.source_frame_id.clone(),
							source_region: record.source_region,
							validity: record.validity.clone(),
						});
						if replaced.is_valid() {
							report.fixed_by_collaborator += 1;
						} else {
							tracing::warn!(record = %replaced, "replacement is still invalid");
						}
						replaced
					}
					RepairDecision::Decline => {
						report.declined += 1;
						candidate
					}
				}
			})
			.collect::<CharmSet>();

		tracing::info!(
			invalid = report.invalid,
			auto = report.fixed_automatically,
			manual = report.fixed_by_collaborator,
			remaining = report.remaining(),
			"repair finished"
		);
		(out, report)
	}

	/// Up to `attempts` re-reads with growing bounds, each snapped to the
	/// vocabulary. Returns the last candidate when none is valid.
	fn auto_repair(&self, record: &CharmRecord, frame: Option<&OwnedImage>) -> CharmRecord {
		let mut candidate = self.vocab.correct(record);
		for attempt in 1..=self.attempts {
			if candidate.is_valid() {
				break;
			}
			let (Some(ie), Some(frame), Some(region)) = (self.ie, frame, record.source_region) else {
				break;
			};
			let Some(reading) = ie.charm_read_region(frame.as_image(), region, attempt) else {
				continue;
			};
			let reread = record_from_reading(reading, &record.source_frame_id);
			candidate = self.vocab.correct(&reread);
			tracing::trace!(attempt, record = %candidate, "re-read region");
		}
		candidate
	}
}
