//! One batch run: frames, records, repair, dedup, persistence, encoding.

use std::path::PathBuf;

use anyhow::{Context, Result};
use data::{CharmSet, Vocabulary, dedup, encoding};
use ie::Ie;

use crate::{
	config::Config,
	extract::RecordExtractor,
	frames::{FrameDedupReport, FrameDeduplicator, FrameStore},
	repair::{RecordRepairer, RepairCollaborator, RepairReport},
};

#[derive(Debug, Clone, Default)]
pub struct Summary {
	/// `None` when frame extraction was skipped.
	pub frames: Option<FrameDedupReport>,
	/// Records written to the charm list; `None` when extraction was skipped.
	pub charms_saved: Option<usize>,
	pub repair: Option<RepairReport>,
	/// Invalid records in the final charm list.
	pub invalid_remaining: usize,
	/// Records in the encoded export.
	pub encoded: usize,
	pub encoded_path: PathBuf,
}

/// Run the pipeline as configured.
///
/// `ie` is only needed when charms are extracted. Per-frame and per-record
/// problems are logged and skipped; unreadable directories, a missing
/// vocabulary or a broken charm list abort the run.
pub fn run(config: &Config, ie: Option<&Ie>, collaborator: &mut dyn RepairCollaborator) -> Result<Summary> {
	let vocab = Vocabulary::load(config.language, config.skills_dir.as_deref())?;
	let mut summary = Summary {
		encoded_path: config.charm_encoded.clone(),
		..Default::default()
	};

	if !config.skip_frames {
		let input = FrameStore::open(&config.input_dir)?;
		if input.is_empty() {
			tracing::warn!(dir = %config.input_dir.display(), "no frames in input directory");
		}
		let report = FrameDeduplicator::new(config.similarity_threshold).run(&input, &config.frame_dir)?;
		summary.frames = Some(report);
	}

	let set = if config.skip_charms {
		CharmSet::load(&config.charm_json)?
	} else {
		let ie = ie.context("Charm extraction needs an image engine")?;
		let frames = FrameStore::open(&config.frame_dir)?;
		let mut set = RecordExtractor::new(ie, &vocab).extract_all(&frames);

		if set.has_invalids() {
			let repairer = RecordRepairer::new(Some(ie), &vocab, Some(&frames), config.repair_attempts);
			let (repaired, report) = repairer.repair(set, collaborator);
			set = repaired;
			summary.repair = Some(report);
		}

		let set = dedup::remove_duplicates(set, config.dedup_mode);
		set.save(&config.charm_json)?;
		summary.charms_saved = Some(set.len());
		set
	};
	summary.invalid_remaining = set.invalid_count();

	summary.encoded = encoding::encode_file(&config.charm_json, &config.charm_encoded, &vocab)?;
	Ok(summary)
}
