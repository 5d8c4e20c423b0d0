//! Custom movie registry — movies living outside the library root.
//!
//! A "custom" movie is a folder containing one video file plus a `source.txt`
//! sidecar with JSON metadata. The registry is an explicit object injected
//! into the API state with a defined lifecycle: populated by
//! `POST /api/custom-path`, emptied by `DELETE /api/custom-path`, and held in
//! process memory only.

use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::catalog::{is_video_file, title_from_filename, Movie, MovieId, MovieSource};
use crate::error::Result;

/// Metadata sidecar parsed from a movie folder's `source.txt`.
/// Every field is optional; missing ones get the same defaults local
/// records use.
#[derive(Debug, Deserialize)]
pub struct SidecarMeta {
    pub title: Option<String>,
    pub description: Option<String>,
    pub year: Option<i32>,
    pub genre: Option<Vec<String>>,
    pub duration: Option<String>,
    pub rating: Option<String>,
    pub quality: Option<String>,
    pub stars: Option<f32>,
    pub thumbnail: Option<String>,
}

/// In-process registry of custom movies.
#[derive(Default)]
pub struct CustomRegistry {
    movies: RwLock<Vec<Movie>>,
}

impl CustomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current custom movies.
    pub fn all(&self) -> Vec<Movie> {
        self.movies.read().clone()
    }

    pub fn len(&self) -> usize {
        self.movies.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.movies.read().is_empty()
    }

    /// Total size in bytes of all registered custom movies.
    pub fn total_size(&self) -> u64 {
        self.movies.read().iter().map(|m| m.size).sum()
    }

    /// Look up a custom movie by its folder, returning the absolute path of
    /// its video file.
    pub fn resolve(&self, dir: &Path) -> Option<PathBuf> {
        self.movies
            .read()
            .iter()
            .find(|m| m.custom_dir.as_deref() == Some(dir))
            .map(|m| dir.join(&m.filename))
    }

    /// Find a registered movie record by its encoded id token.
    pub fn find(&self, id: &str) -> Option<Movie> {
        self.movies.read().iter().find(|m| m.id == id).cloned()
    }

    /// Scan `custom_path` and replace the registry contents with what was
    /// found. Returns the new records.
    pub async fn scan_path(&self, custom_path: &Path) -> Result<Vec<Movie>> {
        let movies = scan_custom_dir(custom_path).await?;
        info!(
            path = ?custom_path,
            count = movies.len(),
            "Custom path scanned"
        );
        *self.movies.write() = movies.clone();
        Ok(movies)
    }

    /// Drop all registered custom movies.
    pub fn clear(&self) {
        let mut guard = self.movies.write();
        let n = guard.len();
        guard.clear();
        info!(cleared = n, "Custom movies cleared");
    }
}

/// Walk the immediate subdirectories of `custom_path`. A subdirectory
/// qualifies when it holds a supported video file and a parseable sidecar;
/// anything else is skipped with a log line, never a hard failure.
async fn scan_custom_dir(custom_path: &Path) -> Result<Vec<Movie>> {
    let mut read_dir = tokio::fs::read_dir(custom_path).await?;
    let mut movies = Vec::new();

    while let Some(entry) = read_dir.next_entry().await? {
        let dir = entry.path();
        if !entry.file_type().await?.is_dir() {
            continue;
        }
        match scan_movie_folder(&dir).await {
            Ok(Some(movie)) => {
                debug!(title = movie.title, dir = ?dir, "Custom movie registered");
                movies.push(movie);
            }
            Ok(None) => {
                debug!(dir = ?dir, "Skipped: no video file or sidecar");
            }
            Err(e) => {
                warn!(dir = ?dir, error = %e, "Skipped: folder scan failed");
            }
        }
    }

    movies.sort_by(|a, b| a.filename.cmp(&b.filename));
    Ok(movies)
}

async fn scan_movie_folder(dir: &Path) -> Result<Option<Movie>> {
    let mut video: Option<String> = None;
    let mut sidecar: Option<PathBuf> = None;

    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let lower = name.to_ascii_lowercase();
        // "source.txt.txt" shows up when Windows hides known extensions.
        if lower == "source.txt" || lower == "source.txt.txt" {
            sidecar = Some(path.clone());
        } else if video.is_none() && is_video_file(&path) {
            video = Some(name.to_string());
        }
    }

    let (Some(filename), Some(sidecar)) = (video, sidecar) else {
        return Ok(None);
    };

    let raw = tokio::fs::read_to_string(&sidecar).await?;
    let meta: SidecarMeta = match serde_json::from_str(&raw) {
        Ok(m) => m,
        Err(e) => {
            warn!(sidecar = ?sidecar, error = %e, "Invalid sidecar JSON");
            return Ok(None);
        }
    };

    let file_meta = tokio::fs::metadata(dir.join(&filename)).await?;
    let modified: chrono::DateTime<chrono::Utc> = file_meta
        .modified()
        .map(Into::into)
        .unwrap_or_else(|_| chrono::Utc::now());

    let id = MovieId::Custom(dir.to_path_buf()).encode();
    let title = meta.title.unwrap_or_else(|| title_from_filename(&filename));
    Ok(Some(Movie {
        url: format!("/api/stream/{id}"),
        thumbnail: meta
            .thumbnail
            .unwrap_or_else(|| format!("/api/thumbnail/{id}")),
        description: meta
            .description
            .unwrap_or_else(|| format!("Custom movie: {title}")),
        id,
        filename,
        source: MovieSource::Custom,
        size: file_meta.len(),
        modified: modified.to_rfc3339(),
        year: meta.year.unwrap_or_else(|| {
            use chrono::Datelike;
            modified.year()
        }),
        genre: meta.genre.unwrap_or_else(|| vec!["Unknown".to_string()]),
        duration: meta.duration.unwrap_or_else(|| "Unknown".to_string()),
        rating: meta.rating.unwrap_or_else(|| "Not Rated".to_string()),
        quality: meta.quality.unwrap_or_else(|| "Unknown".to_string()),
        stars: meta.stars.unwrap_or(3.5),
        title,
        custom_dir: Some(dir.to_path_buf()),
    }))
}
