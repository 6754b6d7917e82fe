use crate::Image;

/// Layouts are authored against a 1920x1080 capture.
pub const BASE_WIDTH: f32 = 1920.0;
pub const BASE_HEIGHT: f32 = 1080.0;

/// Axis-aligned rectangle in reference (1920x1080) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct Rect {
	pub x: u32,
	pub y: u32,
	pub w: u32,
	pub h: u32,
}

impl Rect {
	pub const fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
		Self { x, y, w, h }
	}

	pub fn right(&self) -> u32 {
		self.x + self.w
	}

	pub fn bottom(&self) -> u32 {
		self.y + self.h
	}

	/// Grow on every side by `pad`, saturating at the origin.
	pub fn grown(&self, pad: u32) -> Self {
		let x = self.x.saturating_sub(pad);
		let y = self.y.saturating_sub(pad);
		Self {
			x,
			y,
			w: self.right() + pad - x,
			h: self.bottom() + pad - y,
		}
	}

	/// Smallest rectangle containing both.
	pub fn union(&self, other: &Rect) -> Self {
		let x = self.x.min(other.x);
		let y = self.y.min(other.y);
		Self {
			x,
			y,
			w: self.right().max(other.right()) - x,
			h: self.bottom().max(other.bottom()) - y,
		}
	}

	/// Crop the rectangle out of a capture of any resolution.
	pub fn crop<'a>(&self, image: Image<'a>) -> Image<'a> {
		let sx = image.width() as f32 / BASE_WIDTH;
		let sy = image.height() as f32 / BASE_HEIGHT;
		image.sub_image(
			px(self.x, sx),
			px(self.y, sy),
			px(self.w, sx),
			px(self.h, sy),
		)
	}
}

#[inline]
fn px(base: u32, s: f32) -> u32 {
	if base == 0 {
		0
	} else {
		((base as f32) * s).round().max(1.0) as u32
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::OwnedImage;

	#[test]
	fn grown_saturates_at_origin() {
		let r = Rect::new(2, 10, 5, 5).grown(4);
		assert_eq!(r, Rect::new(0, 6, 11, 13));
	}

	#[test]
	fn union_covers_both() {
		let r = Rect::new(10, 10, 5, 5).union(&Rect::new(0, 20, 4, 2));
		assert_eq!(r, Rect::new(0, 10, 15, 12));
	}

	#[test]
	fn crop_scales_with_resolution() {
		let owned = OwnedImage::from_rgb_image(&image::RgbImage::new(960, 540));
		let crop = Rect::new(100, 200, 300, 40).crop(owned.as_image());
		assert_eq!(crop.width(), 150);
		assert_eq!(crop.height(), 20);
	}
}
