use anyhow::{Context, Result};
use carousel_sync_core::MediaType;
use carousel_sync_core::config::parse_manifest_str;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::serve::MANIFEST_FILE;

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mov", "m4v"];
const MAX_SCAN_DEPTH: usize = 2; // Maximum directory depth for video file scanning

/// Escape a string for safe inclusion in a TOML basic string
fn toml_escape_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\x08', "\\b")
        .replace('\x0C', "\\f")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}

#[derive(Debug)]
struct DetectedVideo {
    /// Path relative to the media directory, `/`-separated
    location: String,
    title: String,
}

/// Initialize a media directory for the carousel.
///
/// Scans for video files (MP4, WebM, MOV, M4V) up to two levels deep and
/// writes a media.toml listing them as slides of `media_type`, with titles
/// derived from filenames. Files are left where they are.
///
/// # Errors
///
/// Returns an error if the directory doesn't exist or media.toml is already
/// there.
pub async fn run(path: PathBuf, media_type: MediaType, title: Option<String>) -> Result<()> {
    println!("Initializing media directory: {}", path.display());

    if !path.exists() {
        anyhow::bail!(
            "Directory '{}' does not exist. Create it first: mkdir {}",
            path.display(),
            path.display()
        );
    }

    let manifest_path = path.join(MANIFEST_FILE);
    if manifest_path.exists() {
        anyhow::bail!(
            "{} already exists at {}\nHint: Delete it first or use a different directory",
            MANIFEST_FILE,
            manifest_path.display()
        );
    }

    println!("\nScanning for videos...");
    let videos = scan_video_files(&path)?;

    if videos.is_empty() {
        println!("⚠ No video files found, writing an empty manifest");
    } else {
        println!("✓ Found {} video file(s)", videos.len());
    }

    let toml = generate_manifest(&videos, media_type, title.as_deref())?;
    fs::write(&manifest_path, toml).context("Failed to write media.toml")?;

    println!("\n✓ Wrote {}", manifest_path.display());
    for video in &videos {
        println!("  • {} ({})", video.title, video.location);
    }

    println!("\nNext steps:");
    println!("  1. Edit media.toml (titles, posters, media types)");
    println!("  2. Serve: carousel-sync serve {}", path.display());

    Ok(())
}

/// Scan directory for supported video files, sorted by path
fn scan_video_files(dir: &Path) -> Result<Vec<DetectedVideo>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir)
        .max_depth(MAX_SCAN_DEPTH)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        if let Some(ext) = entry.path().extension()
            && VIDEO_EXTENSIONS.contains(&ext.to_string_lossy().to_lowercase().as_str())
        {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort();

    files
        .iter()
        .enumerate()
        .map(|(idx, file)| {
            let relative = file
                .strip_prefix(dir)
                .context("Scanned file outside media directory")?;
            let location = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            Ok(DetectedVideo {
                location,
                title: extract_title(file, idx + 1),
            })
        })
        .collect()
}

/// Human-readable title from a filename.
///
/// - `01-intro-reel.mp4` → "Intro Reel"
/// - `clip_02.webm` → "Clip 02"
/// - `03.mov` → "Video 3"
fn extract_title(path: &Path, number: usize) -> String {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");

    let cleaned = stem
        .trim_start_matches(|c: char| c.is_ascii_digit() || c == '-' || c == '_' || c == '.')
        .trim();

    if cleaned.is_empty() {
        return format!("Video {}", number);
    }

    cleaned
        .replace(['_', '-'], " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn generate_manifest(
    videos: &[DetectedVideo],
    media_type: MediaType,
    title: Option<&str>,
) -> Result<String> {
    let player_title = toml_escape_string(title.unwrap_or("Album Player"));

    let mut toml = format!(
        "# Generated by carousel-sync init\n\
# Open /?master=true on the controlling screen and / everywhere else\n\
\n\
[player]\n\
title = \"{player_title}\"\n\
default_media = \"{media_type}\"\n\
reconnect_delay_ms = 2000\n\
\n"
    );

    if videos.is_empty() {
        toml.push_str(
            r##"# Add one [[item]] per slide
# [[item]]
# media_type = "album"   # or "phone"
# video_url = "videos/01-intro.mp4"
# title = "Intro"
# poster = "posters/01.jpg"  # Optional
"##,
        );
    } else {
        for video in videos {
            toml.push_str("[[item]]\n");
            toml.push_str(&format!("media_type = \"{}\"\n", media_type));
            toml.push_str(&format!(
                "video_url = \"{}\"\n",
                toml_escape_string(&video.location)
            ));
            toml.push_str(&format!("title = \"{}\"\n", toml_escape_string(&video.title)));
            toml.push('\n');
        }
    }

    parse_manifest_str(&toml)
        .context("Generated media.toml is invalid - this is a bug in the template generator")?;

    Ok(toml)
}
