use crate::model::{Battle, Clip};
use anyhow::{Context, Result};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use sha2::{Digest, Sha256};
use std::ffi::OsStr;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "ogg", "flac"];
const NOTES_EXTENSION: &str = "txt";

pub const DEFAULT_SHUFFLE_SEED: &str = "default shuffle order";

/// Every sub-directory of `root` is a battle.
pub fn battle_names(root: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).max_depth(1) {
        let entry =
            entry.with_context(|| format!("failed to list battles in {}", root.display()))?;
        if entry.file_type().is_dir() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    names.sort();
    Ok(names)
}

pub fn scan_battle(root: &Path, name: &str) -> Result<Battle> {
    let dir = root.join(name);
    let read_dir =
        fs::read_dir(&dir).with_context(|| format!("failed to read battle {}", dir.display()))?;

    let mut clips = Vec::new();
    for entry in read_dir.filter_map(Result::ok) {
        if entry.file_type().map(|kind| kind.is_dir()).unwrap_or(true) {
            continue;
        }
        let path = entry.path();
        if !is_audio_file(&path) {
            continue;
        }

        let file_name = entry.file_name().to_string_lossy().to_string();
        let stem = path
            .file_stem()
            .and_then(OsStr::to_str)
            .unwrap_or_default();
        let (author, title) = parse_clip_name(stem);
        let notes = read_notes(&path);
        clips.push(Clip {
            id: file_name,
            author,
            title,
            path,
            notes,
        });
    }

    clips.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(Battle {
        name: name.to_string(),
        clips,
    })
}

/// Splits `author-title` on the first dash. Without a dash the whole stem is
/// the title. Remaining dashes and underscores read as spaces.
pub fn parse_clip_name(stem: &str) -> (String, String) {
    let (author, title) = match stem.split_once('-') {
        Some((author, title)) => (author, title),
        None => ("", stem),
    };
    (clean_name_part(author), clean_name_part(title))
}

fn clean_name_part(raw: &str) -> String {
    raw.replace(['-', '_'], " ").trim().to_string()
}

/// Deterministic display order for a battle page: the same seed always
/// yields the same order, so every listener sees a stable but unbiased list.
pub fn shuffle_clips(clips: &mut [Clip], seed: &str) {
    let digest = Sha256::digest(seed.as_bytes());
    let seed = digest
        .iter()
        .take(8)
        .fold(0_u64, |acc, byte| (acc << 8) | u64::from(*byte));
    let mut rng = SmallRng::seed_from_u64(seed);
    clips.shuffle(&mut rng);
}

fn read_notes(clip: &Path) -> Option<String> {
    let raw = fs::read_to_string(clip.with_extension(NOTES_EXTENSION)).ok()?;
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn is_audio_file(path: &Path) -> bool {
    let ext = path.extension().and_then(OsStr::to_str).unwrap_or_default();
    AUDIO_EXTENSIONS
        .iter()
        .any(|supported| ext.eq_ignore_ascii_case(supported))
}
