//! Frame source and near-duplicate frame removal.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use ie::{Fingerprint, OwnedImage};
use rayon::prelude::*;

const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "bmp", "webp", "tiff"];

/// A frame on disk, identified by its file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameRef {
	pub id: String,
	pub path: PathBuf,
}

/// A decoded frame.
pub struct Frame {
	pub id: String,
	pub image: OwnedImage,
}

/// Still images of a directory in lexicographic file name order.
#[derive(Debug, Clone)]
pub struct FrameStore {
	dir: PathBuf,
	frames: Vec<FrameRef>,
}

impl FrameStore {
	/// List the image files of `dir`. An unreadable directory is an error;
	/// an empty one is not.
	pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
		let dir = dir.as_ref();
		let mut frames = Vec::new();
		for entry in std::fs::read_dir(dir).with_context(|| format!("Read frame dir {}", dir.display()))? {
			let entry = entry.with_context(|| format!("Read frame dir {}", dir.display()))?;
			let path = entry.path();
			if !path.is_file() || !has_image_extension(&path) {
				continue;
			}
			let id = entry.file_name().to_string_lossy().into_owned();
			frames.push(FrameRef { id, path });
		}
		frames.sort_by(|a, b| a.id.cmp(&b.id));

		Ok(Self {
			dir: dir.to_path_buf(),
			frames,
		})
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	pub fn frames(&self) -> &[FrameRef] {
		&self.frames
	}

	pub fn len(&self) -> usize {
		self.frames.len()
	}

	pub fn is_empty(&self) -> bool {
		self.frames.is_empty()
	}

	pub fn load(&self, frame: &FrameRef) -> Result<Frame> {
		Ok(Frame {
			id: frame.id.clone(),
			image: OwnedImage::open(&frame.path)?,
		})
	}

	/// Load a frame by id, if the store has it.
	pub fn load_id(&self, id: &str) -> Option<Result<Frame>> {
		self.frames.iter().find(|f| f.id == id).map(|f| self.load(f))
	}
}

fn has_image_extension(path: &Path) -> bool {
	path.extension()
		.and_then(|e| e.to_str())
		.is_some_and(|e| IMAGE_EXTENSIONS.iter().any(|x| e.eq_ignore_ascii_case(x)))
}

/// Output name of the `index`-th kept frame.
pub fn frame_file_name(index: usize) -> String {
	format!("frame_{index:05}.png")
}

fn is_frame_file_name(name: &str) -> bool {
	name.strip_prefix("frame_")
		.and_then(|rest| rest.strip_suffix(".png"))
		.is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

#[derive(Debug, Clone, Default)]
pub struct FrameDedupReport {
	pub seen: usize,
	/// `(source id, written file)` of every kept frame, in input order.
	pub kept: Vec<(String, PathBuf)>,
	/// `(source id, error)` of frames that could not be decoded.
	pub unreadable: Vec<(String, String)>,
}

/// Greedy single-pass clustering of frames by fingerprint distance.
///
/// A frame is kept when its distance to every previously kept frame exceeds
/// the threshold. The decision for a frame depends on all earlier kept
/// frames, so this pass stays sequential.
#[derive(Debug, Clone, Copy)]
pub struct FrameDeduplicator {
	threshold: u32,
}

impl FrameDeduplicator {
	pub fn new(threshold: u32) -> Self {
		Self { threshold }
	}

	pub fn threshold(&self) -> u32 {
		self.threshold
	}

	/// Indices of the fingerprints to keep, ascending.
	pub fn select(&self, fingerprints: &[Fingerprint]) -> Vec<usize> {
		let mut kept: Vec<(usize, Fingerprint)> = Vec::new();
		for (i, fp) in fingerprints.iter().enumerate() {
			let min = kept.iter().map(|(_, k)| k.distance(fp)).min();
			if min.is_none_or(|d| d > self.threshold) {
				kept.push((i, *fp));
			}
		}
		kept.into_iter().map(|(i, _)| i).collect()
	}

	/// Fingerprint every frame of `store`, keep the unique ones and write them
	/// to `out_dir` as `frame_00000.png`, `frame_00001.png`, ...
	///
	/// Frames written by an earlier run are removed first. Frames that fail
	/// to decode are skipped and reported.
	pub fn run(&self, store: &FrameStore, out_dir: &Path) -> Result<FrameDedupReport> {
		std::fs::create_dir_all(out_dir).with_context(|| format!("Create frame dir {}", out_dir.display()))?;
		if same_dir(store.dir(), out_dir) {
			bail!("Frame dir {} is also the input dir", out_dir.display());
		}
		clear_previous_output(out_dir)?;

		let fingerprints = store
			.frames()
			.par_iter()
			.map(|frame| OwnedImage::open(&frame.path).map(|img| Fingerprint::of(img.as_image())))
			.collect::<Vec<_>>();

		let mut report = FrameDedupReport {
			seen: store.len(),
			..Default::default()
		};
		let mut readable = Vec::with_capacity(fingerprints.len());
		for (frame, fp) in store.frames().iter().zip(fingerprints) {
			match fp {
				Ok(fp) => readable.push((frame, fp)),
				Err(err) => {
					tracing::warn!(frame = %frame.id, error = %format!("{err:#}"), "skipping unreadable frame");
					report.unreadable.push((frame.id.clone(), format!("{err:#}")));
				}
			}
		}

		let prints = readable.iter().map(|(_, fp)| *fp).collect::<Vec<_>>();
		let kept = self.select(&prints).into_iter().map(|i| readable[i].0).collect::<Vec<_>>();
		write_kept(store, &kept, out_dir, &mut report)?;

		tracing::info!(seen = report.seen, kept = report.kept.len(), "unique frames extracted");
		Ok(report)
	}
}

/// Copy kept frames to `out_dir` in order. A frame that no longer decodes is
/// reported as unreadable and numbering continues without a gap.
fn write_kept(store: &FrameStore, kept: &[&FrameRef], out_dir: &Path, report: &mut FrameDedupReport) -> Result<()> {
	for frame in kept {
		let image = match store.load(frame) {
			Ok(image) => image,
			Err(err) => {
				tracing::warn!(frame = %frame.id, error = %format!("{err:#}"), "kept frame became unreadable");
				report.unreadable.push((frame.id.clone(), format!("{err:#}")));
				continue;
			}
		};
		let out = out_dir.join(frame_file_name(report.kept.len()));
		image.image.as_image().save_png(&out)?;
		tracing::debug!(frame = %frame.id, out = %out.display(), "kept frame");
		report.kept.push((frame.id.clone(), out));
	}
	Ok(())
}

fn same_dir(a: &Path, b: &Path) -> bool {
	match (a.canonicalize(), b.canonicalize()) {
		(Ok(a), Ok(b)) => a == b,
		_ => a == b,
	}
}

fn clear_previous_output(out_dir: &Path) -> Result<()> {
	for entry in std::fs::read_dir(out_dir).with_context(|| format!("Read frame dir {}", out_dir.display()))? {
		let entry = entry?;
		if is_frame_file_name(&entry.file_name().to_string_lossy()) {
			std::fs::remove_file(entry.path())
				.with_context(|| format!("Remove stale frame {}", entry.path().display()))?;
		}
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	/// Grayscale test frame; `f` gives the luma of each pixel.
	fn write_frame(path: &Path, f: impl Fn(u32, u32) -> u8) {
		let img = image::RgbImage::from_fn(64, 48, |x, y| {
			let v = f(x, y);
			image::Rgb([v, v, v])
		});
		img.save(path).unwrap();
	}

	fn vertical_split(x: u32, _: u32) -> u8 {
		if x < 32 { 30 } else { 220 }
	}

	fn horizontal_split(_: u32, y: u32) -> u8 {
		if y < 24 { 30 } else { 220 }
	}

	fn kept_ids(report: &FrameDedupReport) -> Vec<&str> {
		report.kept.iter().map(|(id, _)| id.as_str()).collect()
	}

	#[test]
	fn store_lists_images_in_name_order() {
		let dir = tempfile::tempdir().unwrap();
		write_frame(&dir.path().join("b.png"), vertical_split);
		write_frame(&dir.path().join("a.PNG"), vertical_split);
		std::fs::write(dir.path().join("notes.txt"), "x").unwrap();
		std::fs::create_dir(dir.path().join("sub.png")).unwrap();

		let store = FrameStore::open(dir.path()).unwrap();
		let ids = store.frames().iter().map(|f| f.id.as_str()).collect::<Vec<_>>();
		assert_eq!(ids, ["a.PNG", "b.png"]);
		assert!(store.load_id("b.png").unwrap().is_ok());
		assert!(store.load_id("c.png").is_none());

		assert!(FrameStore::open(dir.path().join("missing")).is_err());
	}

	#[test]
	fn greedy_selection_keeps_first_of_each_cluster() {
		let a = Fingerprint::of(
			OwnedImage::from_rgb_image(&image::RgbImage::from_fn(32, 32, |x, _| {
				image::Rgb([if x < 16 { 0 } else { 255 }; 3])
			}))
			.as_image(),
		);
		let b = Fingerprint::of(
			OwnedImage::from_rgb_image(&image::RgbImage::from_fn(32, 32, |_, y| {
				image::Rgb([if y < 16 { 0 } else { 255 }; 3])
			}))
			.as_image(),
		);

		let dedup = FrameDeduplicator::new(10);
		assert_eq!(dedup.select(&[a, a, b, a, b]), vec![0, 2]);
		assert_eq!(dedup.select(&[b, a]), vec![0, 1]);
		assert!(dedup.select(&[]).is_empty());

		// Everything is within a threshold of the full width.
		assert_eq!(FrameDeduplicator::new(Fingerprint::BITS).select(&[a, b]), vec![0]);
	}

	#[test]
	fn near_identical_frames_collapse_in_order() {
		let input = tempfile::tempdir().unwrap();
		let output = tempfile::tempdir().unwrap();
		write_frame(&input.path().join("000.png"), vertical_split);
		write_frame(&input.path().join("001.png"), vertical_split);
		write_frame(&input.path().join("002.png"), |x, y| {
			// Same layout with a little noise.
			vertical_split(x, y).saturating_add(((x + y) % 3) as u8)
		});
		write_frame(&input.path().join("003.png"), horizontal_split);

		let store = FrameStore::open(input.path()).unwrap();
		let report = FrameDeduplicator::new(12).run(&store, output.path()).unwrap();
		assert_eq!(report.seen, 4);
		assert_eq!(kept_ids(&report), ["000.png", "003.png"]);

		let written = FrameStore::open(output.path()).unwrap();
		let names = written.frames().iter().map(|f| f.id.as_str()).collect::<Vec<_>>();
		assert_eq!(names, ["frame_00000.png", "frame_00001.png"]);
	}

	#[test]
	fn rerunning_on_the_output_changes_nothing() {
		let input = tempfile::tempdir().unwrap();
		let first = tempfile::tempdir().unwrap();
		let second = tempfile::tempdir().unwrap();
		write_frame(&input.path().join("0.png"), vertical_split);
		write_frame(&input.path().join("1.png"), horizontal_split);
		write_frame(&input.path().join("2.png"), vertical_split);
		write_frame(&input.path().join("3.png"), |x, y| if (x / 16 + y / 16) % 2 == 0 { 30 } else { 220 });

		let dedup = FrameDeduplicator::new(12);
		let once = dedup.run(&FrameStore::open(input.path()).unwrap(), first.path()).unwrap();
		let once_store = FrameStore::open(first.path()).unwrap();
		let twice = dedup.run(&once_store, second.path()).unwrap();

		assert_eq!(once.kept.len(), 3);
		assert_eq!(twice.kept.len(), once.kept.len());
		for ((_, a), (_, b)) in once.kept.iter().zip(&twice.kept) {
			assert_eq!(OwnedImage::open(a).unwrap(), OwnedImage::open(b).unwrap());
		}
	}

	#[test]
	fn unreadable_frames_are_skipped_and_stale_output_cleared() {
		let input = tempfile::tempdir().unwrap();
		let output = tempfile::tempdir().unwrap();
		write_frame(&input.path().join("0.png"), vertical_split);
		std::fs::write(input.path().join("1.png"), b"not a png").unwrap();
		write_frame(&output.path().join("frame_00007.png"), horizontal_split);
		std::fs::write(output.path().join("keep.txt"), "mine").unwrap();

		let store = FrameStore::open(input.path()).unwrap();
		let report = FrameDeduplicator::new(12).run(&store, output.path()).unwrap();
		assert_eq!(kept_ids(&report), ["0.png"]);
		assert_eq!(report.unreadable.len(), 1);
		assert_eq!(report.unreadable[0].0, "1.png");

		assert!(!output.path().join("frame_00007.png").exists());
		assert!(output.path().join("keep.txt").exists());
	}

	#[test]
	fn frames_unreadable_at_write_time_are_skipped() {
		let input = tempfile::tempdir().unwrap();
		let output = tempfile::tempdir().unwrap();
		write_frame(&input.path().join("0.png"), vertical_split);
		write_frame(&input.path().join("1.png"), horizontal_split);
		write_frame(&input.path().join("2.png"), |x, y| if (x / 16 + y / 16) % 2 == 0 { 30 } else { 220 });
		let store = FrameStore::open(input.path()).unwrap();

		// Replaced after fingerprinting.
		std::fs::write(input.path().join("1.png"), b"truncated").unwrap();

		let kept = store.frames().iter().collect::<Vec<_>>();
		let mut report = FrameDedupReport::default();
		write_kept(&store, &kept, output.path(), &mut report).unwrap();

		assert_eq!(kept_ids(&report), ["0.png", "2.png"]);
		assert_eq!(report.unreadable.len(), 1);
		assert_eq!(report.unreadable[0].0, "1.png");
		assert_eq!(report.kept[1].1, output.path().join("frame_00001.png"));
		assert!(!output.path().join("frame_00002.png").exists());
	}

	#[test]
	fn input_dir_cannot_be_the_frame_dir() {
		let dir = tempfile::tempdir().unwrap();
		write_frame(&dir.path().join("frame_00000.png"), vertical_split);
		write_frame(&dir.path().join("frame_00001.png"), horizontal_split);

		let store = FrameStore::open(dir.path()).unwrap();
		assert!(FrameDeduplicator::new(12).run(&store, dir.path()).is_err());
		// Same directory spelled differently.
		assert!(FrameDeduplicator::new(12).run(&store, &dir.path().join(".")).is_err());

		assert!(dir.path().join("frame_00000.png").exists());
		assert!(dir.path().join("frame_00001.png").exists());
	}

	#[test]
	fn frame_names() {
		assert_eq!(frame_file_name(3), "frame_00003.png");
		assert!(is_frame_file_name("frame_00003.png"));
		assert!(!is_frame_file_name("frame_.png"));
		assert!(!is_frame_file_name("frame_0a.png"));
	}
}
