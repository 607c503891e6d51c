use anyhow::Context;
use carousel_sync_core::config::MediaManifest;
use carousel_sync_core::{MediaType, parse_manifest};
use std::path::{Path, PathBuf};

use super::serve::MANIFEST_FILE;

pub async fn run(path: PathBuf) -> anyhow::Result<()> {
    println!("Validating media directory: {}", path.display());

    let manifest = parse_manifest(path.join(MANIFEST_FILE)).context("Failed to parse media.toml")?;

    println!("✓ {} valid", MANIFEST_FILE);
    println!("  Title: {}", manifest.player.title);
    println!("  Default media: {}", manifest.player.default_media);
    for media_type in [MediaType::Album, MediaType::Phone] {
        println!("  {}: {}", media_type, manifest.count(media_type));
    }

    let missing = missing_local_files(&path, &manifest);
    if missing.is_empty() {
        println!("✓ All local videos present");
    } else {
        for location in &missing {
            eprintln!("   ⚠ Warning: video not found: {}", location);
        }
    }

    Ok(())
}

/// Relative video locations that do not exist under `dir`
fn missing_local_files(dir: &Path, manifest: &MediaManifest) -> Vec<String> {
    manifest
        .items
        .iter()
        .filter(|item| !item.is_remote() && !dir.join(&item.video_url).exists())
        .map(|item| item.video_url.clone())
        .collect()
}
