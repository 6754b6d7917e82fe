use std::path::{Path, PathBuf};

use anyhow::{Result, bail};

pub const ASSETS_ENV: &str = "CHARMEX_ASSETS_DIR";

#[derive(Debug, Clone)]
pub struct OcrAssets {
	pub detection: PathBuf,
	pub recognition: PathBuf,
	pub charset: PathBuf,
}

fn normalize_ocr_dir(dir: PathBuf) -> PathBuf {
	// Either the app root (containing `ocr/`) or the `ocr/` folder itself.
	if dir.join("detection.mnn").is_file() {
		dir
	} else {
		dir.join("ocr")
	}
}

fn find_in(candidates: Vec<PathBuf>, lang_code: &str) -> Result<OcrAssets> {
	let recognition_name = format!("{lang_code}_recognition.mnn");
	let charset_name = format!("{lang_code}_charset.txt");

	let mut tried = Vec::new();
	for base in candidates {
		let ocr_dir = normalize_ocr_dir(base);
		let detection = ocr_dir.join("detection.mnn");
		let recognition = ocr_dir.join(&recognition_name);
		let charset = ocr_dir.join(&charset_name);

		if detection.is_file() && recognition.is_file() && charset.is_file() {
			return Ok(OcrAssets { detection, recognition, charset });
		}

		tried.push(ocr_dir);
	}

	bail!(
		"OCR model files not found. Expected these files:\n  - ocr/detection.mnn\n  - ocr/{recognition_name}\n  - ocr/{charset_name}\n\nSearched in:\n{}\n\nFix: copy the 'ocr/' folder next to the executable (or set {ASSETS_ENV} to the folder that contains it).",
		tried
			.into_iter()
			.map(|p| format!("  - {}", p.display()))
			.collect::<Vec<_>>()
			.join("\n")
	)
}

/// Locate the OCR models for `lang_code` (see [`data::Language::ocr_code`]).
///
/// Looks in `$CHARMEX_ASSETS_DIR`, next to the executable and in the working
/// directory, in that order.
pub fn resolve_ocr_assets(lang_code: &str) -> Result<OcrAssets> {
	let mut candidates: Vec<PathBuf> = Vec::new();
	if let Some(dir) = std::env::var_os(ASSETS_ENV) {
		candidates.push(PathBuf::from(dir));
	}
	if let Ok(exe) = std::env::current_exe()
		&& let Some(dir) = exe.parent()
	{
		candidates.push(dir.to_path_buf());
	}
	if let Ok(cwd) = std::env::current_dir() {
		candidates.push(cwd);
	}
	#[cfg(debug_assertions)]
	candidates.push(Path::new(env!("CARGO_MANIFEST_DIR")).join(".."));

	find_in(candidates, lang_code)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn touch(dir: &Path, names: &[&str]) {
		std::fs::create_dir_all(dir).unwrap();
		for name in names {
			std::fs::write(dir.join(name), b"").unwrap();
		}
	}

	#[test]
	fn finds_root_or_ocr_folder() {
		let root = tempfile::tempdir().unwrap();
		touch(
			&root.path().join("ocr"),
			&["detection.mnn", "latin_recognition.mnn", "latin_charset.txt"],
		);

		let assets = find_in(vec![root.path().to_path_buf()], "latin").unwrap();
		assert_eq!(assets.detection, root.path().join("ocr").join("detection.mnn"));

		let assets = find_in(vec![root.path().join("ocr")], "latin").unwrap();
		assert_eq!(assets.charset, root.path().join("ocr").join("latin_charset.txt"));
	}

	#[test]
	fn missing_language_lists_searched_dirs() {
		let empty = tempfile::tempdir().unwrap();
		let root = tempfile::tempdir().unwrap();
		touch(root.path(), &["detection.mnn", "latin_recognition.mnn", "latin_charset.txt"]);

		let err = find_in(vec![empty.path().to_path_buf(), root.path().to_path_buf()], "japan").unwrap_err();
		let msg = err.to_string();
		assert!(msg.contains("japan_recognition.mnn"), "{msg}");
		assert!(msg.contains(&empty.path().join("ocr").display().to_string()), "{msg}");
	}
}
