use crate::model::Track;
use anyhow::{Context, Result};
use std::ffi::OsStr;
use std::fs::File;
use std::path::{Path, PathBuf};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::{MetadataOptions, StandardTagKey};
use symphonia::core::probe::Hint;
use symphonia::default::get_probe;
use tracing::{debug, info};
use walkdir::WalkDir;

pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "aac", "ogg", "m4a", "opus"];

/// Recursively collects playable files under `root`, ordered by path.
///
/// Titles come from embedded tags when present, otherwise from the file stem.
pub fn scan_folder(root: &Path) -> Result<Vec<Track>> {
    let metadata = std::fs::metadata(root)
        .with_context(|| format!("cannot read music folder {}", root.display()))?;
    if !metadata.is_dir() {
        anyhow::bail!("{} is not a directory", root.display());
    }

    let mut found: Vec<(PathBuf, String)> = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                debug!(%err, "skipping unreadable entry");
                continue;
            }
        };
        let path = entry.path();
        if !entry.file_type().is_file() || !is_audio(path) {
            continue;
        }
        found.push((path.to_path_buf(), title_for(path)));
    }

    found.sort_by(|a, b| a.0.cmp(&b.0));
    info!(folder = %root.display(), tracks = found.len(), "scanned music folder");
    Ok(found
        .into_iter()
        .map(|(path, title)| Track::new(title, path))
        .collect())
}

pub fn is_audio(path: &Path) -> bool {
    let ext = path.extension().and_then(OsStr::to_str).unwrap_or_default();
    AUDIO_EXTENSIONS
        .iter()
        .any(|supported| ext.eq_ignore_ascii_case(supported))
}

fn title_for(path: &Path) -> String {
    embedded_title(path).unwrap_or_else(|| {
        path.file_stem()
            .and_then(OsStr::to_str)
            .unwrap_or("unknown")
            .to_string()
    })
}

fn embedded_title(path: &Path) -> Option<String> {
    let file = File::open(path).ok()?;
    let source = MediaSourceStream::new(Box::new(file), MediaSourceStreamOptions::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(OsStr::to_str) {
        hint.with_extension(extension);
    }

    let mut probed = get_probe()
        .format(
            &hint,
            source,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .ok()?;

    // Container-level tags win; ID3 read during probing is the fallback.
    if let Some(title) = probed
        .format
        .metadata()
        .current()
        .and_then(|revision| tag_value(revision.tags(), StandardTagKey::TrackTitle, "title"))
    {
        return Some(title);
    }
    probed
        .metadata
        .get()
        .as_ref()
        .and_then(|metadata| metadata.current())
        .and_then(|revision| tag_value(revision.tags(), StandardTagKey::TrackTitle, "title"))
}

fn tag_value(
    tags: &[symphonia::core::meta::Tag],
    standard_key: StandardTagKey,
    fallback_key: &str,
) -> Option<String> {
    tags.iter()
        .find(|tag| tag.std_key == Some(standard_key))
        .or_else(|| {
            tags.iter()
                .find(|tag| tag.key.eq_ignore_ascii_case(fallback_key))
        })
        .map(|tag| tag.value.to_string())
        .and_then(|value| {
            let trimmed = value.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
}
