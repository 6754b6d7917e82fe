//! OCR wrapper.
//!
//! The project primarily relies on `ocr-rs` (Rust PaddleOCR bindings).
//! OCR engines are sensitive to input quality, so every crop goes through a
//! small set of preprocessing candidates and the most plausible reading wins.

use std::path::Path;

use anyhow::Context;

use crate::{Image, OwnedImage};

/// Anything that turns an image crop into text.
///
/// Implemented by [`Ocr`]; tests substitute deterministic fakes.
pub trait TextRecognizer: Sync {
    fn get_text(&self, image: Image) -> String;
}

impl<F> TextRecognizer for F
where
    F: Fn(Image) -> String + Sync,
{
    fn get_text(&self, image: Image) -> String {
        self(image)
    }
}

pub struct Ocr {
    engine: ocr_rs::OcrEngine,
}

impl Ocr {
    /// Initialize the OCR engine with the given model paths.
    pub fn try_new(
        detection: impl AsRef<Path>,
        recognition: impl AsRef<Path>,
        charsset: impl AsRef<Path>,
    ) -> anyhow::Result<Self> {
        let thread_count = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        let engine = ocr_rs::OcrEngine::new(
            detection,
            recognition,
            charsset,
            Some(ocr_rs::OcrEngineConfig {
                backend: ocr_rs::Backend::CPU,
                thread_count: thread_count as i32,
                // Charm panels use a small stylized font.
                precision_mode: ocr_rs::PrecisionMode::High,
                enable_parallel: thread_count > 1,
                min_result_confidence: 0.5,
                ..Default::default()
            }),
        )
        .context("failed to initialize OCR engine")?;

        Ok(Self { engine })
    }

    /// Recognize text from an RGB image view without preprocessing.
    fn recognize_raw(&self, image: Image) -> String {
        let image = ocr_rs::preprocess::rgb_to_image(&image.get_bytes(), image.width(), image.height());

        match self.engine.recognize(&image) {
            Ok(results) => results
                .into_iter()
                .map(|v| v.text)
                .collect::<Vec<_>>()
                .join(" "),
            Err(err) => {
                tracing::debug!(error = ?err, "ocr recognize failed");
                String::new()
            }
        }
    }
}

impl TextRecognizer for Ocr {
    /// Extract text with preprocessing (upscale, equalize, threshold).
    ///
    /// Tries adaptive and Otsu thresholding plus the untouched crop and keeps
    /// the reading with the best [`score_ocr_text`].
    fn get_text(&self, image: Image) -> String {
        if image.is_empty() {
            return String::new();
        }
        let candidates = preprocess_candidates(image);

        let mut best = String::new();
        let mut best_score = i64::MIN;
        for cand in &candidates {
            let text = self.recognize_raw(cand.as_image());
            let score = score_ocr_text(&text);
            if score > best_score {
                best_score = score;
                best = text;
            }
        }
        best
    }
}

/// Preprocessed variants of a crop, in preference order.
pub(crate) fn preprocess_candidates(image: Image) -> Vec<OwnedImage> {
    use imageproc::contrast::{ThresholdType, adaptive_threshold, equalize_histogram, otsu_level, threshold};

    // OCR generally performs better on larger glyphs.
    const MIN_H: u32 = 80;
    let mut base = image.to_owned_image();
    if base.height() < MIN_H {
        if let Err(err) = base.resize_h(MIN_H) {
            tracing::debug!(error = %err, "upscale before ocr failed");
        }
    }

    let gray = equalize_histogram(&base.to_gray_image());

    // Handles gradients behind the charm panel.
    let adaptive = {
        let bin = adaptive_threshold(&gray, 7, 10);
        OwnedImage::from_gray_as_rgb(&ensure_dark_text_on_light(bin))
    };

    let otsu = {
        let level = otsu_level(&gray);
        let bin = threshold(&gray, level, ThresholdType::Binary);
        OwnedImage::from_gray_as_rgb(&ensure_dark_text_on_light(bin))
    };

    vec![adaptive, otsu, base]
}

/// Invert a binarized crop when it is mostly dark so the background is light.
pub(crate) fn ensure_dark_text_on_light(mut bin: image::GrayImage) -> image::GrayImage {
    let mut white = 0u64;
    let mut black = 0u64;
    for p in bin.pixels() {
        if p.0[0] > 0 {
            white += 1;
        } else {
            black += 1;
        }
    }
    if black > white {
        for p in bin.pixels_mut() {
            p.0[0] = 255u8.saturating_sub(p.0[0]);
        }
    }
    bin
}

/// Prefer strings with more alphanumerics (less noise) and slightly longer length.
pub(crate) fn score_ocr_text(text: &str) -> i64 {
    let mut score = 0i64;
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            score += 3;
        } else if !ch.is_whitespace() {
            score += 1;
        }
    }
    score + text.chars().count() as i64
}
