//! Charm detail panel reading.
//!
//! The charm box shows the selected charm in a detail panel: one row per skill
//! ("Attack Boost Lv2") and a decoration slot row above them. Each skill row is
//! a record region; the slot row is shared by every region of the frame.
//!
//! Regions are fixed layout anchors in reference coordinates and scale with
//! the capture resolution. A region whose text has no letters yields nothing.

use std::sync::LazyLock;

use regex::Regex;

use crate::{Image, ocr::TextRecognizer, util::Rect};

/// Reference pixels added on every side of a region per relax step.
pub const RELAX_STEP: u32 = 6;

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct CharmLayout {
	/// Decoration slot row.
	pub slots: Rect,
	/// Skill rows, top to bottom. Their index is the record region id.
	pub skill_rows: Vec<Rect>,
}

impl Default for CharmLayout {
	fn default() -> Self {
		Self {
			slots: Rect::new(1452, 318, 240, 40),
			skill_rows: vec![
				Rect::new(1452, 384, 420, 40),
				Rect::new(1452, 430, 420, 40),
			],
		}
	}
}

/// Text recognized for one record region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionReading {
	pub region: u32,
	pub name: String,
	/// `None` when no level could be read.
	pub level: Option<u32>,
	pub slots: Vec<u8>,
}

impl CharmLayout {
	fn row(&self, region: u32, relax: u32) -> Option<Rect> {
		self.skill_rows
			.get(region as usize)
			.map(|r| r.grown(relax * RELAX_STEP))
	}

	/// Crop covering a region and the slot row, for showing to a human.
	pub fn region_crop<'a>(&self, image: Image<'a>, region: u32) -> Option<Image<'a>> {
		let row = self.row(region, 0)?;
		Some(row.union(&self.slots).crop(image))
	}
}

/// Read every record region of a frame.
pub fn read_regions(image: Image, layout: &CharmLayout, ocr: &dyn TextRecognizer) -> Vec<RegionReading> {
	let rows = (0..layout.skill_rows.len() as u32)
		.filter_map(|region| read_row(image, layout, ocr, region, 0).map(|row| (region, row)))
		.collect::<Vec<_>>();
	if rows.is_empty() {
		return Vec::new();
	}

	let slots = read_slots(image, layout, ocr, 0);
	rows.into_iter()
		.map(|(region, (name, level))| RegionReading {
			region,
			name,
			level,
			slots: slots.clone(),
		})
		.collect()
}

/// Read a single region with its bounds grown by `relax` steps.
pub fn read_region(
	image: Image,
	layout: &CharmLayout,
	ocr: &dyn TextRecognizer,
	region: u32,
	relax: u32,
) -> Option<RegionReading> {
	let (name, level) = read_row(image, layout, ocr, region, relax)?;
	Some(RegionReading {
		region,
		name,
		level,
		slots: read_slots(image, layout, ocr, relax),
	})
}

fn read_row(
	image: Image,
	layout: &CharmLayout,
	ocr: &dyn TextRecognizer,
	region: u32,
	relax: u32,
) -> Option<(String, Option<u32>)> {
	let crop = layout.row(region, relax)?.crop(image);
	if crop.is_empty() {
		return None;
	}
	parse_skill_row(&ocr.get_text(crop))
}

fn read_slots(image: Image, layout: &CharmLayout, ocr: &dyn TextRecognizer, relax: u32) -> Vec<u8> {
	let crop = layout.slots.grown(relax * RELAX_STEP).crop(image);
	if crop.is_empty() {
		return Vec::new();
	}
	parse_slots(&ocr.get_text(crop))
}

pub fn normalize_name(raw: &str) -> String {
	raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split a skill row into its name and level.
///
/// Accepts "Name Lv3", "Name Lv. 3", "Name Level 3" and a bare trailing
/// number. Returns `None` when the row holds no letters at all.
pub fn parse_skill_row(text: &str) -> Option<(String, Option<u32>)> {
	static LEVEL_RE: LazyLock<Regex> = LazyLock::new(|| {
		Regex::new(r"(?i)^(?<name>.*?)[\s:]*\b(?:lv|lvl|level)\s*\.?\s*(?<level>\d+)\s*$").expect("regex")
	});
	static TRAILING_RE: LazyLock<Regex> =
		LazyLock::new(|| Regex::new(r"^(?<name>.*\D)\s+(?<level>\d+)$").expect("regex"));

	let text = normalize_name(text);
	if !text.chars().any(char::is_alphabetic) {
		return None;
	}

	let caps = LEVEL_RE.captures(&text).or_else(|| TRAILING_RE.captures(&text));
	let Some(caps) = caps else {
		return Some((text, None));
	};

	let name = caps["name"].trim().to_string();
	if !name.chars().any(char::is_alphabetic) {
		return Some((text, None));
	}
	let level = caps["level"].parse::<u32>().ok();
	Some((name, level))
}

/// Read decoration slot levels, left to right.
///
/// Digits are slot levels and dashes are empty slots.
pub fn parse_slots(text: &str) -> Vec<u8> {
	text.chars()
		.filter_map(|ch| match ch {
			'-' | '–' | '—' => Some(0),
			_ => ch.to_digit(10).map(|d| d as u8),
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{Color, OwnedImage};

	#[test]
	fn skill_rows_split_name_and_level() {
		assert_eq!(parse_skill_row("Attack Boost Lv3"), Some(("Attack Boost".into(), Some(3))));
		assert_eq!(parse_skill_row("  Weakness  Exploit lv. 2 "), Some(("Weakness Exploit".into(), Some(2))));
		assert_eq!(parse_skill_row("Critical Eye Level 7"), Some(("Critical Eye".into(), Some(7))));
		assert_eq!(parse_skill_row("Guard 4"), Some(("Guard".into(), Some(4))));
		assert_eq!(parse_skill_row("Evade Window"), Some(("Evade Window".into(), None)));
	}

	#[test]
	fn rows_without_letters_are_not_records() {
		assert_eq!(parse_skill_row(""), None);
		assert_eq!(parse_skill_row("  3 ~ "), None);
	}

	#[test]
	fn slots_read_digits_and_dashes() {
		assert_eq!(parse_slots("2 1 -"), vec![2, 1, 0]);
		assert_eq!(parse_slots("[3][-][-]"), vec![3, 0, 0]);
		assert_eq!(parse_slots("none"), Vec::<u8>::new());
	}

	/// Answers with a fixed text per crop background color.
	struct ColorKeyed(Vec<(Color, &'static str)>);

	impl TextRecognizer for ColorKeyed {
		fn get_text(&self, image: Image) -> String {
			if image.is_empty() {
				return String::new();
			}
			let center = image.pixel_at(image.width() / 2, image.height() / 2);
			self.0
				.iter()
				.find(|(c, _)| *c == center)
				.map(|(_, t)| t.to_string())
				.unwrap_or_default()
		}
	}

	fn painted(colors: &[(Rect, Color)]) -> OwnedImage {
		let img = image::RgbImage::from_fn(1920, 1080, |x, y| {
			colors
				.iter()
				.find(|(r, _)| x >= r.x && x < r.right() && y >= r.y && y < r.bottom())
				.map(|(_, c)| image::Rgb([c.r, c.g, c.b]))
				.unwrap_or(image::Rgb([0, 0, 0]))
		});
		OwnedImage::from_rgb_image(&img)
	}

	#[test]
	fn every_readable_row_becomes_a_reading() {
		let layout = CharmLayout::default();
		let slots_c = Color::new(10, 10, 200);
		let row0_c = Color::new(200, 10, 10);
		let frame = painted(&[(layout.slots, slots_c), (layout.skill_rows[0], row0_c)]);
		let ocr = ColorKeyed(vec![(slots_c, "2 1 -"), (row0_c, "Attack Boost Lv2")]);

		let readings = read_regions(frame.as_image(), &layout, &ocr);
		assert_eq!(
			readings,
			vec![RegionReading {
				region: 0,
				name: "Attack Boost".into(),
				level: Some(2),
				slots: vec![2, 1, 0],
			}]
		);
	}

	#[test]
	fn frames_without_rows_skip_the_slot_read() {
		let layout = CharmLayout::default();
		let frame = painted(&[]);
		let ocr = ColorKeyed(vec![(Color::BLACK, "")]);
		assert!(read_regions(frame.as_image(), &layout, &ocr).is_empty());
		assert_eq!(read_region(frame.as_image(), &layout, &ocr, 5, 1), None);
	}

	#[test]
	fn captures_too_small_for_the_layout_read_nothing() {
		let layout = CharmLayout::default();
		let ocr = ColorKeyed(vec![(Color::BLACK, "Guard Lv1")]);
		let empty = OwnedImage::from_rgb_image(&image::RgbImage::new(0, 0));
		assert_eq!(ocr.get_text(empty.as_image()), "");
		assert!(read_regions(empty.as_image(), &layout, &ocr).is_empty());
		assert_eq!(read_region(empty.as_image(), &layout, &ocr, 0, 2), None);
	}

	#[test]
	fn region_crop_includes_slots() {
		let layout = CharmLayout::default();
		let frame = painted(&[]);
		let crop = layout.region_crop(frame.as_image(), 1).unwrap();
		assert_eq!(crop.height(), layout.skill_rows[1].bottom() - layout.slots.y);
		assert!(layout.region_crop(frame.as_image(), 9).is_none());
	}
}
