mod fingerprint;
pub use fingerprint::Fingerprint;
mod image;
pub use self::image::*;
mod ocr;
pub use ocr::{Ocr, TextRecognizer};
mod util;
pub use util::Rect;

pub mod screen;
pub use screen::charm::{CharmLayout, RegionReading};

pub struct Ie {
	layout: CharmLayout,
	ocr: Box<dyn TextRecognizer + Send>,
}

impl Ie {
	pub fn try_new(
		layout: CharmLayout,
		ocr_detection: impl AsRef<std::path::Path>,
		ocr_recognition: impl AsRef<std::path::Path>,
		ocr_charsset: impl AsRef<std::path::Path>,
	) -> anyhow::Result<Self> {
		Ok(Self::with_recognizer(
			layout,
			Ocr::try_new(ocr_detection, ocr_recognition, ocr_charsset)?,
		))
	}

	/// Use any recognizer instead of the OCR engine.
	pub fn with_recognizer(layout: CharmLayout, ocr: impl TextRecognizer + Send + 'static) -> Self {
		Self {
			layout,
			ocr: Box::new(ocr),
		}
	}

	pub fn layout(&self) -> &CharmLayout {
		&self.layout
	}

	pub fn charm_read_regions(&self, image: Image) -> Vec<RegionReading> {
		screen::charm::read_regions(image, &self.layout, self.ocr.as_ref())
	}

	/// Re-read one region with its bounds grown by `relax` steps.
	pub fn charm_read_region(&self, image: Image, region: u32, relax: u32) -> Option<RegionReading> {
		screen::charm::read_region(image, &self.layout, self.ocr.as_ref(), region, relax)
	}

	pub fn charm_region_crop<'a>(&self, image: Image<'a>, region: u32) -> Option<Image<'a>> {
		self.layout.region_crop(image, region)
	}
}
