use std::{fmt, str::FromStr};

use anyhow::bail;

/// Language of the recorded game client.
///
/// Selects the OCR recognition model and the skill names a charm is matched
/// against. Serialized as its short code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize)]
pub enum Language {
	#[default]
	#[serde(rename = "eng")]
	English,
	#[serde(rename = "fre")]
	French,
	#[serde(rename = "ger")]
	German,
	#[serde(rename = "ita")]
	Italian,
	#[serde(rename = "spa")]
	Spanish,
	#[serde(rename = "jpn")]
	Japanese,
	#[serde(rename = "kor")]
	Korean,
	#[serde(rename = "chi")]
	Chinese,
}

impl Language {
	pub const ALL: [Language; 8] = [
		Self::English,
		Self::French,
		Self::German,
		Self::Italian,
		Self::Spanish,
		Self::Japanese,
		Self::Korean,
		Self::Chinese,
	];

	pub fn code(&self) -> &'static str {
		match self {
			Self::English => "eng",
			Self::French => "fre",
			Self::German => "ger",
			Self::Italian => "ita",
			Self::Spanish => "spa",
			Self::Japanese => "jpn",
			Self::Korean => "kor",
			Self::Chinese => "chi",
		}
	}

	/// Prefix of the OCR recognition model files for this language.
	pub fn ocr_code(&self) -> &'static str {
		match self {
			Self::English | Self::French | Self::German | Self::Italian | Self::Spanish => "latin",
			Self::Japanese => "japan",
			Self::Korean => "korean",
			Self::Chinese => "ch",
		}
	}

	fn english_name(&self) -> &'static str {
		match self {
			Self::English => "english",
			Self::French => "french",
			Self::German => "german",
			Self::Italian => "italian",
			Self::Spanish => "spanish",
			Self::Japanese => "japanese",
			Self::Korean => "korean",
			Self::Chinese => "chinese",
		}
	}
}

impl FromStr for Language {
	type Err = anyhow::Error;

	/// Accepts the short code ("eng") or the English name ("English").
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let s = s.trim().to_ascii_lowercase();
		if let Some(lang) = Self::ALL
			.into_iter()
			.find(|l| l.code() == s || l.english_name() == s)
		{
			return Ok(lang);
		}

		bail!(
			"unknown language {s:?}, expected one of: {}",
			Self::ALL.map(|l| l.code()).join(", ")
		)
	}
}

impl fmt::Display for Language {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.code())
	}
}
