//! Perceptual frame fingerprints.
//!
//! A fingerprint is a 16x16 average hash: the frame is split into a grid of
//! blocks, each block's mean luma is compared against the mean of all blocks
//! and the comparison results form a 256-bit digest. Recording artifacts
//! (compression noise, cursor blinking) flip few bits, while a different charm
//! panel flips many.

use crate::Image;

const GRID: u32 = 16;
const WORDS: usize = (GRID * GRID / 64) as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u64; WORDS]);

impl Fingerprint {
    /// Number of bits in a fingerprint; the largest possible distance.
    pub const BITS: u32 = GRID * GRID;

    pub fn of(image: Image) -> Self {
        let mut bits = [0u64; WORDS];
        if image.is_empty() {
            return Self(bits);
        }

        let w = image.width();
        let h = image.height();
        let mut samples = [0u32; (GRID * GRID) as usize];
        for by in 0..GRID {
            let (y1, y2) = block_span(by, h);
            for bx in 0..GRID {
                let (x1, x2) = block_span(bx, w);
                samples[(by * GRID + bx) as usize] = image.mean_luma(x1, y1, x2, y2);
            }
        }

        let mean = samples.iter().sum::<u32>() / samples.len() as u32;
        for (i, &val) in samples.iter().enumerate() {
            if val > mean {
                bits[i / 64] |= 1 << (i % 64);
            }
        }
        Self(bits)
    }

    /// Hamming distance between two fingerprints.
    pub fn distance(&self, other: &Self) -> u32 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum()
    }
}

/// Pixel span `[start, end)` of grid cell `i` along an axis of length `len`.
/// Cells always cover at least one pixel, so small images repeat pixels.
fn block_span(i: u32, len: u32) -> (u32, u32) {
    let start = (i * len / GRID).min(len - 1);
    let end = ((i + 1) * len / GRID).max(start + 1);
    (start, end)
}
