//! Range streaming — the responder behind `GET /api/stream/{id}`.
//!
//! Implements the single-range subset of RFC 7233 byte-range requests, which
//! is all a browser `<video>` element ever sends. The body is always a
//! bounded `ReaderStream` over the file, never an in-memory buffer, so large
//! files and slow clients cost one file handle and one read-ahead chunk each.

use std::path::PathBuf;

use axum::body::Body;
use axum::http::{header, HeaderValue, Response, StatusCode};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::error::{FlixError, Result};

/// Extension → MIME table for the formats the scanner accepts.
/// Unknown extensions fall back to `video/mp4`.
pub fn mime_for_path(path: &std::path::Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("mkv") => "video/x-matroska",
        Some("avi") => "video/x-msvideo",
        Some("mov") => "video/quicktime",
        Some("wmv") => "video/x-ms-wmv",
        Some("webm") => "video/webm",
        _ => "video/mp4",
    }
}

/// A resolved, stat'd file ready to stream.
///
/// Built immediately before serving; the recorded size is what every header
/// and bound in the response is computed from.
#[derive(Debug, Clone)]
pub struct StreamTarget {
    pub path: PathBuf,
    pub size: u64,
    pub mime: &'static str,
}

impl StreamTarget {
    /// Stat `path` and capture its size and MIME type.
    pub async fn open(path: PathBuf) -> Result<Self> {
        let meta = tokio::fs::metadata(&path).await.map_err(|_| {
            let id = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.to_string_lossy().into_owned());
            FlixError::MovieNotFound { id }
        })?;
        let mime = mime_for_path(&path);
        Ok(StreamTarget { path, size: meta.len(), mime })
    }
}

/// An inclusive byte interval within a stream target.
///
/// Invariant: `start <= end < size` of the file it was validated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes covered, `end - start + 1`.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// Parse a `Range` header against a file of `size` bytes.
///
/// Grammar: `bytes=<start>-[end]`, end inclusive and optional (defaults to
/// the last byte). Returns:
/// - `Ok(None)` — header absent in spirit: missing `bytes=` prefix or no
///   `-` separator; serve the whole file.
/// - `Err(MalformedRange)` — the start token is not a non-negative integer.
/// - `Err(RangeOutOfBounds)` — parsed but unsatisfiable.
///
/// Multi-range sets (`bytes=0-1,5-9`) are not supported and fail the start
/// parse, which is the consistent choice here: anything that names bytes we
/// cannot honor gets `416` rather than a silently different slice.
pub fn parse_range(header: &str, size: u64) -> Result<Option<ByteRange>> {
    let Some(spec) = header.strip_prefix("bytes=") else {
        return Ok(None);
    };
    let Some((start_s, end_s)) = spec.split_once('-') else {
        return Ok(None);
    };

    let start: u64 = start_s
        .trim()
        .parse()
        .map_err(|_| FlixError::MalformedRange(header.to_string()))?;

    let end: u64 = if end_s.trim().is_empty() {
        size.saturating_sub(1)
    } else {
        end_s
            .trim()
            .parse()
            .map_err(|_| FlixError::MalformedRange(header.to_string()))?
    };

    if start > end || start >= size || end >= size {
        return Err(FlixError::RangeOutOfBounds { start, end, size });
    }

    Ok(Some(ByteRange { start, end }))
}

/// Serve `target` honoring an optional raw `Range` header value.
///
/// Produces exactly one of:
/// - `200 OK` with the full file body (no usable range header),
/// - `206 Partial Content` with the requested inclusive slice,
/// - `416 Range Not Satisfiable` with `Content-Range: bytes */<size>` and an
///   empty body.
///
/// The file handle is owned by the response body stream and closes when the
/// body is dropped, including on client disconnect mid-stream.
pub async fn serve(range_header: Option<&str>, target: &StreamTarget) -> Result<Response<Body>> {
    let range = match range_header {
        None => None,
        Some(h) => match parse_range(h, target.size) {
            Ok(r) => r,
            Err(FlixError::MalformedRange(_)) | Err(FlixError::RangeOutOfBounds { .. }) => {
                debug!(header = ?range_header, size = target.size, "Unsatisfiable range");
                return Ok(not_satisfiable(target.size));
            }
            Err(e) => return Err(e),
        },
    };

    let mut file = tokio::fs::File::open(&target.path).await.map_err(|_| {
        // Vanished between stat and open; a rescan raced us.
        FlixError::MovieNotFound {
            id: target.path.to_string_lossy().into_owned(),
        }
    })?;

    let mut response = match range {
        Some(r) => {
            file.seek(std::io::SeekFrom::Start(r.start)).await?;
            let body = Body::from_stream(ReaderStream::new(file.take(r.len())));
            let mut response = Response::new(body);
            *response.status_mut() = StatusCode::PARTIAL_CONTENT;
            let content_range = format!("bytes {}-{}/{}", r.start, r.end, target.size);
            response.headers_mut().insert(
                header::CONTENT_RANGE,
                HeaderValue::from_str(&content_range)
                    .unwrap_or_else(|_| HeaderValue::from_static("bytes */0")),
            );
            response
                .headers_mut()
                .insert(header::CONTENT_LENGTH, HeaderValue::from(r.len()));
            response
        }
        None => {
            let body = Body::from_stream(ReaderStream::new(file));
            let mut response = Response::new(body);
            response
                .headers_mut()
                .insert(header::CONTENT_LENGTH, HeaderValue::from(target.size));
            response
        }
    };

    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(target.mime));
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));

    debug!(
        path = ?target.path,
        size = target.size,
        range = ?range,
        "Stream response built"
    );
    Ok(response)
}

fn not_satisfiable(size: u64) -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::RANGE_NOT_SATISFIABLE;
    response.headers_mut().insert(
        header::CONTENT_RANGE,
        HeaderValue::from_str(&format!("bytes */{size}"))
            .unwrap_or_else(|_| HeaderValue::from_static("bytes */0")),
    );
    response
}
