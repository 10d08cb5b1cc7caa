//! YouTube input acquisition via `yt-dlp`
//!
//! Produces the shared [`DecodedInput`] for a video URL:
//! - metadata (title, description, duration, subtitle tracks): required
//! - video file capped at the configured height: required
//! - WAV audio track: optional
//! - English subtitles flattened to a transcript: optional, the text
//!   modality falls back to the description
//!
//! Every artifact is written inside the request's scratch directory.

use crate::policy::FatalInputError;
use crate::workflow::{DecodedInput, InputAcquirer, ScratchDir, SourceDescriptor};
use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use emofuse_common::config::AcquisitionSection;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Length of a YouTube video id
const VIDEO_ID_LEN: usize = 11;

/// Subtitle language requested from YouTube
const SUBTITLE_LANG: &str = "en";

/// `yt-dlp --dump-single-json` subset
#[derive(Debug, Deserialize)]
struct VideoMetadata {
    id: Option<String>,
    title: Option<String>,
    description: Option<String>,
    duration: Option<f64>,
    #[serde(default)]
    subtitles: HashMap<String, Vec<SubtitleTrack>>,
    #[serde(default)]
    automatic_captions: HashMap<String, Vec<SubtitleTrack>>,
}

#[derive(Debug, Deserialize)]
struct SubtitleTrack {
    url: String,
    ext: Option<String>,
}

impl VideoMetadata {
    /// English subtitle URL, manual tracks before automatic captions, VTT preferred
    fn subtitle_url(&self) -> Option<&str> {
        [&self.subtitles, &self.automatic_captions]
            .into_iter()
            .filter_map(|tracks| tracks.get(SUBTITLE_LANG))
            .find_map(|tracks| {
                tracks
                    .iter()
                    .find(|t| t.ext.as_deref() == Some("vtt"))
                    .or_else(|| tracks.first())
                    .map(|t| t.url.as_str())
            })
    }
}

/// `yt-dlp` backed [`InputAcquirer`]
pub struct YtDlpAcquirer {
    yt_dlp_path: PathBuf,
    timeout: Duration,
    max_height: u32,
    temp_base: Option<PathBuf>,
    http_client: reqwest::Client,
}

impl YtDlpAcquirer {
    /// # Arguments
    /// * `config` - `[acquisition]` section
    /// * `temp_base` - parent directory for scratch directories (system temp when `None`)
    pub fn new(config: &AcquisitionSection, temp_base: Option<PathBuf>) -> anyhow::Result<Self> {
        let timeout = Duration::from_secs(config.timeout_seconds);
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            yt_dlp_path: PathBuf::from(&config.yt_dlp_path),
            timeout,
            max_height: config.max_height,
            temp_base,
            http_client,
        })
    }

    /// Run yt-dlp with `args`, returning stdout
    async fn run(&self, args: &[String]) -> anyhow::Result<Vec<u8>> {
        debug!(command = %self.yt_dlp_path.display(), ?args, "Running yt-dlp");

        let child = Command::new(&self.yt_dlp_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| anyhow!("yt-dlp timed out after {}s", self.timeout.as_secs()))?
            .with_context(|| format!("Failed to execute {}", self.yt_dlp_path.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("yt-dlp exited with {}: {}", output.status, stderr.trim());
        }

        Ok(output.stdout)
    }

    async fn fetch_metadata(&self, url: &str) -> anyhow::Result<VideoMetadata> {
        let stdout = self
            .run(&[
                "--dump-single-json".to_string(),
                "--skip-download".to_string(),
                "--no-warnings".to_string(),
                url.to_string(),
            ])
            .await?;
        serde_json::from_slice(&stdout).context("Failed to parse yt-dlp metadata")
    }

    async fn download_video(&self, url: &str, dir: &Path) -> anyhow::Result<PathBuf> {
        self.run(&[
            "--format".to_string(),
            format!("best[height<={}]/best", self.max_height),
            "--output".to_string(),
            dir.join("video.%(ext)s").to_string_lossy().into_owned(),
            "--no-playlist".to_string(),
            "--quiet".to_string(),
            "--no-warnings".to_string(),
            url.to_string(),
        ])
        .await?;

        find_artifact(dir, "video").ok_or_else(|| anyhow!("yt-dlp reported success but no video file was written"))
    }

    async fn download_audio(&self, url: &str, dir: &Path) -> anyhow::Result<PathBuf> {
        self.run(&[
            "--format".to_string(),
            "bestaudio/best".to_string(),
            "--extract-audio".to_string(),
            "--audio-format".to_string(),
            "wav".to_string(),
            "--output".to_string(),
            dir.join("audio.%(ext)s").to_string_lossy().into_owned(),
            "--no-playlist".to_string(),
            "--quiet".to_string(),
            "--no-warnings".to_string(),
            url.to_string(),
        ])
        .await?;

        let wav = dir.join("audio.wav");
        if wav.exists() {
            return Ok(wav);
        }
        find_artifact(dir, "audio").ok_or_else(|| anyhow!("no audio file was written"))
    }

    async fn fetch_transcript(&self, metadata: &VideoMetadata) -> anyhow::Result<Option<String>> {
        let Some(subtitle_url) = metadata.subtitle_url() else {
            return Ok(None);
        };

        let vtt = self
            .http_client
            .get(subtitle_url)
            .send()
            .await
            .context("Subtitle request failed")?
            .error_for_status()
            .context("Subtitle request rejected")?
            .text()
            .await
            .context("Failed to read subtitle body")?;

        let transcript = parse_vtt(&vtt);
        Ok((!transcript.is_empty()).then_some(transcript))
    }
}

#[async_trait]
impl InputAcquirer for YtDlpAcquirer {
    async fn acquire(&self, source: &SourceDescriptor) -> Result<DecodedInput, FatalInputError> {
        let url = source.as_str();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(FatalInputError::new(format!("not a video URL: {}", url)));
        }

        let scratch = ScratchDir::create(self.temp_base.as_deref())
            .map_err(|e| FatalInputError::new(format!("failed to create scratch directory: {}", e)))?;
        let dir = scratch
            .path()
            .ok_or_else(|| FatalInputError::new("scratch directory unavailable"))?
            .to_path_buf();

        let metadata = self
            .fetch_metadata(url)
            .await
            .map_err(|e| FatalInputError::new(format!("{:#}", e)))?;

        let source_id = metadata
            .id
            .clone()
            .or_else(|| extract_video_id(url))
            .unwrap_or_else(|| "unknown".to_string());

        let video_path = self
            .download_video(url, &dir)
            .await
            .map_err(|e| FatalInputError::new(format!("video download failed: {:#}", e)))?;

        let mut input = DecodedInput::new(source_id, scratch);
        input.video_path = Some(video_path);

        match self.download_audio(url, &dir).await {
            Ok(path) => input.audio_path = Some(path),
            Err(e) => {
                let message = format!("{:#}", e);
                warn!(source_id = %input.source_id, error = %message, "Audio extraction failed");
            }
        }

        match self.fetch_transcript(&metadata).await {
            Ok(Some(transcript)) => {
                debug!(source_id = %input.source_id, chars = transcript.len(), "Transcript extracted");
                input.transcript = Some(transcript);
            }
            Ok(None) => debug!(source_id = %input.source_id, "No English subtitles, using description"),
            Err(e) => {
                let message = format!("{:#}", e);
                warn!(source_id = %input.source_id, error = %message, "Subtitle fetch failed");
            }
        }

        input.title = metadata.title;
        input.description = metadata.description;
        input.duration_seconds = metadata.duration;

        info!(
            source_id = %input.source_id,
            title = input.title.as_deref().unwrap_or("Unknown"),
            has_audio = input.audio_path.is_some(),
            has_transcript = input.transcript.is_some(),
            "Input acquired"
        );

        Ok(input)
    }
}

/// First file in `dir` named `<stem>.<ext>`
fn find_artifact(dir: &Path, stem: &str) -> Option<PathBuf> {
    let prefix = format!("{}.", stem);
    let mut matches: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(&prefix) && !n.ends_with(".part"))
        })
        .collect();
    matches.sort();
    matches.into_iter().next()
}

/// Extract the 11-character video id from common YouTube URL forms
///
/// Handles `watch?v=`, `shorts/`, `youtu.be/`, `embed/` and `v/` URLs.
pub fn extract_video_id(url: &str) -> Option<String> {
    const MARKERS: [&str; 6] = ["shorts/", "watch?v=", "youtu.be/", "embed/", "v/", "v="];

    MARKERS.iter().find_map(|marker| {
        url.match_indices(marker).find_map(|(pos, _)| {
            let candidate: String = url[pos + marker.len()..]
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
                .collect();
            (candidate.len() >= VIDEO_ID_LEN).then(|| candidate[..VIDEO_ID_LEN].to_string())
        })
    })
}

/// Flatten WebVTT subtitles into plain text
///
/// Drops the header block, cue timings, cue numbers, NOTE/STYLE blocks and
/// inline tags. Consecutive duplicate lines (rolling automatic captions) are
/// collapsed.
pub fn parse_vtt(vtt: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut in_header = true;
    let mut skipping_block = false;

    for raw in vtt.lines() {
        let line = raw.trim();

        if line.is_empty() {
            in_header = false;
            skipping_block = false;
            continue;
        }
        if in_header || skipping_block {
            continue;
        }
        if line.starts_with("NOTE") || line == "STYLE" || line == "REGION" {
            skipping_block = true;
            continue;
        }
        if line.contains("-->") || line.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }

        let text = strip_tags(line);
        let text = text.trim();
        if text.is_empty() || lines.last().is_some_and(|last| last == text) {
            continue;
        }
        lines.push(text.to_string());
    }

    lines.join(" ")
}

fn strip_tags(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut in_tag = false;
    for c in line.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
}
