//! charmex console front end.
//!
//! Reads captured stills, writes the charm list and its encoded export.

use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use charmex::{
	Config, assets,
	repair::{AutoDecline, ConsoleRepair, RepairCollaborator},
};
use clap::Parser;
use data::{DedupMode, Language, Vocabulary, encoding};

#[derive(Parser)]
#[command(name = "charmex")]
#[command(about = "Build a charm list from charm box screen captures", long_about = None)]
struct Cli {
	/// JSON config file; flags override its values
	#[arg(short, long, default_value = "charmex.json")]
	config: PathBuf,

	/// Directory of captured stills
	#[arg(short, long)]
	input_dir: Option<PathBuf>,

	/// Where unique frames are written
	#[arg(short, long)]
	frame_dir: Option<PathBuf>,

	/// Charm list JSON
	#[arg(long)]
	charm_json: Option<PathBuf>,

	/// Encoded export
	#[arg(long)]
	charm_encoded: Option<PathBuf>,

	/// Game language code (eng, fre, ger, ita, spa, jpn, kor, chi)
	#[arg(short, long)]
	language: Option<Language>,

	/// Max fingerprint distance for two frames to count as the same
	#[arg(short = 't', long)]
	threshold: Option<u32>,

	/// Record dedup mode: "exact" or "a"
	#[arg(short = 'm', long)]
	dedup_mode: Option<DedupMode>,

	/// Reuse the frames already in the frame dir
	#[arg(long)]
	skip_frames: bool,

	/// Reuse the existing charm list; only encode it
	#[arg(long)]
	skip_charms: bool,

	/// Never ask for corrections
	#[arg(long)]
	no_prompt: bool,

	/// Write the effective config to the config path and exit
	#[arg(long)]
	write_config: bool,

	/// Print the charms of an encoded export and exit
	#[arg(long, value_name = "FILE")]
	decode: Option<PathBuf>,
}

impl Cli {
	fn apply(&self, cfg: &mut Config) {
		if let Some(dir) = &self.input_dir {
			cfg.input_dir = dir.clone();
		}
		if let Some(dir) = &self.frame_dir {
			cfg.frame_dir = dir.clone();
		}
		if let Some(path) = &self.charm_json {
			cfg.charm_json = path.clone();
		}
		if let Some(path) = &self.charm_encoded {
			cfg.charm_encoded = path.clone();
		}
		if let Some(lang) = self.language {
			cfg.language = lang;
		}
		if let Some(threshold) = self.threshold {
			cfg.similarity_threshold = threshold;
		}
		if let Some(mode) = self.dedup_mode {
			cfg.dedup_mode = mode;
		}
		cfg.skip_frames |= self.skip_frames;
		cfg.skip_charms |= self.skip_charms;
	}
}

fn main() -> Result<()> {
	// Structured logging. Use `RUST_LOG=info` etc.
	tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.with_writer(io::stderr)
		.init();

	let cli = Cli::parse();
	let mut cfg = Config::load_or_default(&cli.config);
	cli.apply(&mut cfg);

	if cli.write_config {
		cfg.save(&cli.config)?;
		println!("Wrote {}", cli.config.display());
		return Ok(());
	}

	if let Some(path) = &cli.decode {
		return print_decoded(path, &cfg);
	}

	let ie = if cfg.skip_charms {
		None
	} else {
		let ocr = assets::resolve_ocr_assets(cfg.language.ocr_code())?;
		Some(ie::Ie::try_new(cfg.layout.clone(), ocr.detection, ocr.recognition, ocr.charset)?)
	};

	let mut collaborator: Box<dyn RepairCollaborator> = if cli.no_prompt || !io::stdin().is_terminal() {
		Box::new(AutoDecline)
	} else {
		let crop = std::env::temp_dir().join("charmex_repair.png");
		Box::new(ConsoleRepair::new(io::stdin().lock(), io::stdout(), Some(crop)))
	};

	if !cfg.skip_frames {
		println!("Extracting unique frames from {}", cfg.input_dir.display());
	}
	let summary = charmex::run(&cfg, ie.as_ref(), collaborator.as_mut())?;

	if let Some(frames) = &summary.frames {
		println!(
			"Kept {} of {} frames ({} unreadable)",
			frames.kept.len(),
			frames.seen,
			frames.unreadable.len()
		);
	}
	if let Some(saved) = summary.charms_saved {
		println!("Saved {saved} charms to {}", cfg.charm_json.display());
	}
	if summary.invalid_remaining > 0 {
		println!("{} charms are still invalid and were left out of the export", summary.invalid_remaining);
	}
	println!(
		"Encoded {} charms, see {} for the result",
		summary.encoded,
		summary.encoded_path.display()
	);
	Ok(())
}

fn print_decoded(path: &Path, cfg: &Config) -> Result<()> {
	let vocab = Vocabulary::load(cfg.language, cfg.skills_dir.as_deref())?;
	let text = std::fs::read_to_string(path).with_context(|| format!("Read {}", path.display()))?;
	let charms = encoding::decode(&text, &vocab).with_context(|| format!("Decode {}", path.display()))?;
	for charm in &charms {
		println!("{} Lv{} {:?}", charm.name, charm.skill_level, charm.slot_levels);
	}
	Ok(())
}
