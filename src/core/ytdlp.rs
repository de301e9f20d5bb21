use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::anyhow;
use mediabatch_core::fs_paths::{AppPaths, DesktopPaths};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::core::process;

const STDERR_TAIL_LINES: usize = 8;

fn bin_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "yt-dlp.exe"
    } else {
        "yt-dlp"
    }
}

pub async fn find_ytdlp() -> Option<PathBuf> {
    if let Ok(status) = process::command(bin_name())
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
    {
        if status.success() {
            return Some(PathBuf::from(bin_name()));
        }
    }

    let managed = managed_ytdlp_path();
    if managed.exists() {
        return Some(managed);
    }

    None
}

fn managed_ytdlp_path() -> PathBuf {
    DesktopPaths.bin_dir().join(bin_name())
}

pub async fn ensure_ytdlp() -> anyhow::Result<PathBuf> {
    if let Some(path) = find_ytdlp().await {
        return Ok(path);
    }

    tracing::warn!("yt-dlp not found on PATH, fetching a managed copy");
    download_ytdlp_binary().await
}

async fn download_ytdlp_binary() -> anyhow::Result<PathBuf> {
    let target = managed_ytdlp_path();

    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let download_url = if cfg!(target_os = "windows") {
        "https://github.com/yt-dlp/yt-dlp/releases/latest/download/yt-dlp.exe"
    } else if cfg!(target_os = "macos") {
        "https://github.com/yt-dlp/yt-dlp/releases/latest/download/yt-dlp_macos"
    } else {
        "https://github.com/yt-dlp/yt-dlp/releases/latest/download/yt-dlp"
    };

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(120))
        .build()?;

    let response = client.get(download_url).send().await?;

    if !response.status().is_success() {
        return Err(anyhow!("Downloading yt-dlp failed: HTTP {}", response.status()));
    }

    let bytes = response.bytes().await?;
    tokio::fs::write(&target, &bytes).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o755);
        tokio::fs::set_permissions(&target, perms).await?;
    }

    tracing::info!("Installed yt-dlp at {}", target.display());
    Ok(target)
}

/// Resolves `url` without downloading. Playlists come back with every entry
/// resolved; entries that could not be extracted are `null`.
pub async fn dump_info(
    ytdlp: &Path,
    url: &str,
    extra_flags: &[String],
) -> anyhow::Result<serde_json::Value> {
    let output = process::command(ytdlp)
        .args(["--dump-single-json", "--no-warnings", "--ignore-errors"])
        .args(extra_flags)
        .arg(url)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| anyhow!("Failed to run yt-dlp: {}", e))?;

    if output.stdout.is_empty() && !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("yt-dlp failed: {}", stderr.trim()));
    }

    let json: serde_json::Value = serde_json::from_slice(&output.stdout)
        .map_err(|e| anyhow!("yt-dlp returned invalid JSON: {}", e))?;

    if json.is_null() {
        return Err(anyhow!("yt-dlp returned no metadata for {}", url));
    }

    Ok(json)
}

/// Output template for `<dir>/<stem>.<ext>`; `%` in the stem is escaped so
/// yt-dlp does not read it as a template field.
pub fn output_template(dir: &Path, stem: &str) -> String {
    let stem = stem.replace('%', "%%");
    dir.join(format!("{}.%(ext)s", stem))
        .to_string_lossy()
        .to_string()
}

pub struct StreamDownload<'a> {
    pub url: &'a str,
    pub format: &'a str,
    pub output_template: String,
    pub postprocess: Vec<String>,
    pub extra_flags: &'a [String],
}

pub async fn download_stream(
    ytdlp: &Path,
    job: StreamDownload<'_>,
    progress: mpsc::Sender<f64>,
    cancel_token: CancellationToken,
) -> anyhow::Result<()> {
    let mut args = vec![
        "-f".to_string(),
        job.format.to_string(),
        "--no-playlist".to_string(),
        "--no-warnings".to_string(),
        "--newline".to_string(),
        "--progress-template".to_string(),
        "download:%(progress._percent_str)s".to_string(),
        "-o".to_string(),
        job.output_template,
    ];
    args.extend(job.postprocess);
    args.extend(job.extra_flags.iter().cloned());
    args.push(job.url.to_string());

    let mut child = process::command(ytdlp)
        .args(&args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| anyhow!("Failed to start yt-dlp: {}", e))?;

    let stdout = child.stdout.take().ok_or_else(|| anyhow!("yt-dlp has no stdout"))?;
    let stderr = child.stderr.take().ok_or_else(|| anyhow!("yt-dlp has no stderr"))?;

    let progress_tx = progress.clone();
    let line_reader = tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(pct) = parse_progress_line(&line) {
                let _ = progress_tx.send(pct).await;
            }
        }
    });
    let stderr_reader = tokio::spawn(read_tail(stderr));

    let status = tokio::select! {
        status = child.wait() => status.map_err(|e| anyhow!("yt-dlp process failed: {}", e))?,
        _ = cancel_token.cancelled() => {
            let _ = child.kill().await;
            line_reader.abort();
            stderr_reader.abort();
            return Err(anyhow!("Download cancelled"));
        }
    };

    let _ = line_reader.await;
    let stderr_tail = stderr_reader.await.unwrap_or_default();

    if !status.success() {
        return Err(anyhow!("yt-dlp exited with {}: {}", status, stderr_tail.trim()));
    }

    let _ = progress.send(100.0).await;
    Ok(())
}

pub(crate) async fn read_tail<R>(reader: R) -> String
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut tail: std::collections::VecDeque<String> = std::collections::VecDeque::new();
    while let Ok(Some(line)) = lines.next_line().await {
        if tail.len() == STDERR_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    }
    tail.into_iter().collect::<Vec<_>>().join("\n")
}

fn parse_progress_line(line: &str) -> Option<f64> {
    let line = line.trim();
    let pct_str = if let Some(rest) = line.strip_prefix("download:") {
        rest.trim().trim_end_matches('%')
    } else if line.ends_with('%') {
        line.trim_end_matches('%').split_whitespace().last()?
    } else {
        return None;
    };

    pct_str.trim().parse::<f64>().ok()
}
