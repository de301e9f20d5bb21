use std::path::{Path, PathBuf};

/// Suffixes yt-dlp leaves behind for transfers that never finished.
const PARTIAL_SUFFIXES: &[&str] = &[".part", ".ytdl"];

fn file_name(path: &Path) -> &str {
    path.file_name().and_then(|n| n.to_str()).unwrap_or("")
}

pub fn is_partial(name: &str) -> bool {
    PARTIAL_SUFFIXES.iter().any(|s| name.ends_with(s)) || name.contains(".part-Frag")
}

/// yt-dlp writes post-processor intermediates as `<stem>.temp.<ext>`.
fn is_intermediate(name: &str) -> bool {
    name.contains(".temp.")
}

/// Marker embedded in a unit's scratch file names, e.g. `.video-<token>.`
pub fn scratch_marker(kind: &str, token: &str) -> String {
    format!(".{}-{}.", kind, token)
}

/// Removes every entry of `dir`, leaving the directory itself in place.
pub async fn clear_dir(dir: &Path) -> std::io::Result<usize> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_dir() {
            tokio::fs::remove_dir_all(&path).await?;
        } else {
            tokio::fs::remove_file(&path).await?;
        }
        removed += 1;
    }

    tracing::debug!("Cleared {} entries from {}", removed, dir.display());
    Ok(removed)
}

/// Finds the finished file whose name carries `marker`. Partial transfers are ignored.
pub async fn find_by_marker(dir: &Path, marker: &str) -> std::io::Result<Option<PathBuf>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = file_name(&path);
        if is_partial(name) || is_intermediate(name) {
            continue;
        }
        if name.contains(marker) {
            return Ok(Some(path));
        }
    }

    Ok(None)
}

/// Removes every file carrying `marker`, finished or not.
pub async fn remove_by_marker(dir: &Path, marker: &str) -> usize {
    remove_matching(dir, |name| name.contains(marker)).await
}

/// Finds a finished file named `<stem>.<ext>` for any extension.
pub async fn find_output_file(dir: &Path, stem: &str) -> std::io::Result<Option<PathBuf>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !path.is_file() || is_partial(file_name(&path)) {
            continue;
        }
        if path.file_stem().and_then(|s| s.to_str()) == Some(stem) {
            return Ok(Some(path));
        }
    }

    Ok(None)
}

/// Removes partial transfers and post-processor intermediates belonging to `stem`.
pub async fn remove_partial_downloads(dir: &Path, stem: &str) -> usize {
    let prefix = format!("{}.", stem);
    remove_matching(dir, |name| {
        name.starts_with(&prefix) && (is_partial(name) || is_intermediate(name))
    })
    .await
}

/// Removes every partial transfer and intermediate in `dir`, whoever owns it.
pub async fn remove_stray_byproducts(dir: &Path) -> usize {
    remove_matching(dir, |name| is_partial(name) || is_intermediate(name)).await
}

async fn remove_matching<F>(dir: &Path, matches: F) -> usize
where
    F: Fn(&str) -> bool,
{
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(e) => e,
        Err(_) => return 0,
    };

    let mut removed = 0;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if !path.is_file() || !matches(file_name(&path)) {
            continue;
        }
        match tokio::fs::remove_file(&path).await {
            Ok(()) => removed += 1,
            Err(e) => tracing::warn!("Could not remove {}: {}", path.display(), e),
        }
    }

    removed
}
