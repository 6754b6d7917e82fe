//! Charm records from unique frames.

use data::{CharmRecord, CharmSet, Vocabulary};
use ie::{Ie, RegionReading};
use rayon::prelude::*;

use crate::frames::{Frame, FrameStore};

/// Reads every anchor region of a frame and tags the result.
pub struct RecordExtractor<'a> {
	ie: &'a Ie,
	vocab: &'a Vocabulary,
}

impl<'a> RecordExtractor<'a> {
	pub fn new(ie: &'a Ie, vocab: &'a Vocabulary) -> Self {
		Self { ie, vocab }
	}

	/// Records of one frame, in region order. A frame with no readable
	/// region yields nothing.
	pub fn extract_frame(&self, frame: &Frame) -> Vec<CharmRecord> {
		self.ie
			.charm_read_regions(frame.image.as_image())
			.into_iter()
			.map(|reading| self.vocab.check(record_from_reading(reading, &frame.id)))
			.collect()
	}

	/// Records of every frame in `store`, in frame order then region order.
	///
	/// Frames that fail to decode are skipped with a warning.
	pub fn extract_all(&self, store: &FrameStore) -> CharmSet {
		let per_frame = store
			.frames()
			.par_iter()
			.map(|frame_ref| match store.load(frame_ref) {
				Ok(frame) => self.extract_frame(&frame),
				Err(err) => {
					tracing::warn!(frame = %frame_ref.id, error = %format!("{err:#}"), "skipping unreadable frame");
					Vec::new()
				}
			})
			.collect::<Vec<_>>();

		let set = per_frame.into_iter().flatten().collect::<CharmSet>();
		tracing::info!(
			frames = store.len(),
			charms = set.len(),
			invalid = set.invalid_count(),
			"charms extracted"
		);
		set
	}
}

/// Raw record of a region reading. A missing level becomes 0, which no skill
/// accepts, so the record is flagged for repair.
pub(crate) fn record_from_reading(reading: RegionReading, frame_id: &str) -> CharmRecord {
	let level = reading.level.map_or(0, |l| u8::try_from(l).unwrap_or(u8::MAX));
	CharmRecord::unchecked(reading.name, level, reading.slots).with_source(frame_id, Some(reading.region))
}
