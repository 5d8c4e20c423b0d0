//! Movie catalog — scans the local library directory and mints movie records.
//!
//! Ids are stable path-encoded tokens minted at listing time: `local_` +
//! base64url of the filename inside the library root. Streaming resolves the
//! token back to a path instead of re-indexing a fresh directory listing, so
//! files added or removed between the list call and the stream call cannot
//! shift which file an id points at.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;
use tracing::debug;

use crate::error::{FlixError, Result};
use crate::stream::StreamTarget;

/// File extensions the scanner considers playable video.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi", "mov", "wmv", "webm"];

/// Where a movie record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MovieSource {
    Local,
    Custom,
}

/// A playable asset as exposed over the JSON API.
///
/// Every field is always present in the serialized record; sources that have
/// no real metadata fill in the documented defaults (`"Unknown"`, 3.5 stars,
/// year of last modification).
#[derive(Debug, Clone, Serialize)]
pub struct Movie {
    pub id: String,
    pub title: String,
    pub filename: String,
    pub url: String,
    pub source: MovieSource,
    pub size: u64,
    /// Last modification time, RFC 3339.
    pub modified: String,
    pub thumbnail: String,
    pub description: String,
    pub year: i32,
    pub genre: Vec<String>,
    pub duration: String,
    pub rating: String,
    pub quality: String,
    pub stars: f32,
    /// Directory holding a custom movie. Never serialized — it is an
    /// absolute filesystem path.
    #[serde(skip_serializing)]
    pub custom_dir: Option<PathBuf>,
}

/// Decoded form of an opaque movie id token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MovieId {
    /// Filename inside the configured library root.
    Local(String),
    /// Absolute directory of a custom movie folder.
    Custom(PathBuf),
}

impl MovieId {
    /// Encode to the opaque wire token (`local_…` / `custom_…`).
    pub fn encode(&self) -> String {
        match self {
            MovieId::Local(name) => {
                format!("local_{}", URL_SAFE_NO_PAD.encode(name.as_bytes()))
            }
            MovieId::Custom(dir) => {
                format!("custom_{}", URL_SAFE_NO_PAD.encode(dir.to_string_lossy().as_bytes()))
            }
        }
    }

    /// Decode a wire token. The historical `gdrive_` prefix is recognized but
    /// that source is disabled, so it maps to not-found rather than invalid.
    pub fn decode(token: &str) -> Result<Self> {
        if let Some(b64) = token.strip_prefix("local_") {
            let name = decode_b64(token, b64)?;
            return Ok(MovieId::Local(name));
        }
        if let Some(b64) = token.strip_prefix("custom_") {
            let dir = decode_b64(token, b64)?;
            return Ok(MovieId::Custom(PathBuf::from(dir)));
        }
        if token.starts_with("gdrive_") {
            return Err(FlixError::MovieNotFound { id: token.to_string() });
        }
        Err(FlixError::InvalidId(token.to_string()))
    }
}

fn decode_b64(token: &str, b64: &str) -> Result<String> {
    let bytes = URL_SAFE_NO_PAD
        .decode(b64)
        .map_err(|_| FlixError::InvalidId(token.to_string()))?;
    String::from_utf8(bytes).map_err(|_| FlixError::InvalidId(token.to_string()))
}

/// True when `path` ends in one of the supported video extensions.
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            SUPPORTED_EXTENSIONS.contains(&e.as_str())
        })
        .unwrap_or(false)
}

/// Derive a display title from a filename: strip the extension, replace
/// separator characters with spaces.
pub fn title_from_filename(filename: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename);
    stem.replace(['.', '_', '-'], " ").trim().to_string()
}

fn rfc3339(t: std::io::Result<SystemTime>) -> (String, i32) {
    let dt: DateTime<Utc> = t.map(DateTime::from).unwrap_or_else(|_| Utc::now());
    (dt.to_rfc3339(), dt.year())
}

/// Scan the library root for playable files, sorted by filename.
///
/// A missing root yields an empty list; listing is not an error just because
/// nothing has been copied into the directory yet.
pub async fn scan(movies_dir: &Path) -> Result<Vec<Movie>> {
    let mut read_dir = match tokio::fs::read_dir(movies_dir).await {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(dir = ?movies_dir, "Movies directory does not exist");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    let mut names: Vec<String> = Vec::new();
    while let Some(entry) = read_dir.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_file() && is_video_file(&path) {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                names.push(name.to_string());
            }
        }
    }
    names.sort();

    let mut movies = Vec::with_capacity(names.len());
    for name in names {
        let meta = tokio::fs::metadata(movies_dir.join(&name)).await?;
        movies.push(local_movie(&name, meta.len(), meta.modified()));
    }

    debug!(count = movies.len(), dir = ?movies_dir, "Local library scanned");
    Ok(movies)
}

fn local_movie(filename: &str, size: u64, modified: std::io::Result<SystemTime>) -> Movie {
    let id = MovieId::Local(filename.to_string()).encode();
    let title = title_from_filename(filename);
    let (modified, year) = rfc3339(modified);
    Movie {
        url: format!("/api/stream/{id}"),
        thumbnail: format!("/api/thumbnail/{id}"),
        description: format!("Local movie: {title}"),
        id,
        title,
        filename: filename.to_string(),
        source: MovieSource::Local,
        size,
        modified,
        year,
        genre: vec!["Unknown".to_string()],
        duration: "Unknown".to_string(),
        rating: "Not Rated".to_string(),
        quality: "Unknown".to_string(),
        stars: 3.5,
        custom_dir: None,
    }
}

/// Resolve a local movie id to a stream target.
///
/// The file is stat'd here, immediately before serving, so the size the
/// streamer works with is never stale. A token whose decoded path escapes the
/// library root is refused outright.
pub async fn resolve_local(movies_dir: &Path, filename: &str) -> Result<StreamTarget> {
    let root = tokio::fs::canonicalize(movies_dir)
        .await
        .map_err(|_| FlixError::MovieNotFound { id: filename.to_string() })?;
    let path = tokio::fs::canonicalize(root.join(filename))
        .await
        .map_err(|_| FlixError::MovieNotFound { id: filename.to_string() })?;
    if !path.starts_with(&root) {
        return Err(FlixError::PathOutsideRoot);
    }
    // Ids are only ever minted for video files; anything else is a forged token.
    if !is_video_file(&path) {
        return Err(FlixError::MovieNotFound { id: filename.to_string() });
    }
    StreamTarget::open(path).await
}

/// Local-library totals for the stats endpoint.
pub async fn stats(movies_dir: &Path) -> Result<(usize, u64)> {
    let movies = scan(movies_dir).await?;
    let total = movies.iter().map(|m| m.size).sum();
    Ok((movies.len(), total))
}

/// Render a byte count with binary units, two decimals.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["Bytes", "KB", "MB", "GB", "TB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let exp = (bytes as f64).log2() as u32 / 10;
    let exp = exp.min(UNITS.len() as u32 - 1);
    let value = bytes as f64 / f64::powi(1024.0, exp as i32);
    format!("{:.2} {}", value, UNITS[exp as usize])
}
