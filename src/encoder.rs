//! Normalizes image sources into self-contained data URLs.
//!
//! The generation API only accepts inline images, so every remote URL has to
//! pass through here before it reaches the client. Encoding is deterministic:
//! the same bytes always produce the same data URL.

use std::path::Path;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::Client;
use tracing::debug;

use crate::error::{Result, TryOnError};
use crate::types::{is_inline_source, ImageReference};

/// Used when neither the bytes nor the transport say what the image is.
pub const FALLBACK_MIME: &str = "image/png";

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp", "avif", "heic"];

/// Which wizard slot an upload is meant for. Only affects the generated id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadRole {
    Person,
    Garment,
}

impl UploadRole {
    fn id_prefix(&self) -> &'static str {
        match self {
            UploadRole::Person => "upload-person",
            UploadRole::Garment => "upload-garment",
        }
    }
}

/// A parsed `data:<mime>;base64,<payload>` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    pub mime_type: String,
    pub data: String,
}

impl DataUrl {
    /// Parse and validate a base64 data URL.
    pub fn parse(input: &str) -> Result<Self> {
        let rest = input
            .strip_prefix("data:")
            .ok_or_else(|| TryOnError::Decode("not a data URL".into()))?;
        let (meta, data) = rest
            .split_once(',')
            .ok_or_else(|| TryOnError::Decode("data URL has no payload".into()))?;
        let mime_type = meta
            .strip_suffix(";base64")
            .ok_or_else(|| TryOnError::Decode("data URL is not base64-encoded".into()))?;

        if data.is_empty() {
            return Err(TryOnError::Decode("data URL payload is empty".into()));
        }
        STANDARD
            .decode(data)
            .map_err(|e| TryOnError::Decode(format!("invalid base64 payload: {}", e)))?;

        Ok(Self {
            mime_type: if mime_type.is_empty() {
                FALLBACK_MIME.to_string()
            } else {
                mime_type.to_string()
            },
            data: data.to_string(),
        })
    }

    /// Decoded image bytes.
    pub fn bytes(&self) -> Result<Vec<u8>> {
        STANDARD
            .decode(&self.data)
            .map_err(|e| TryOnError::Decode(format!("invalid base64 payload: {}", e)))
    }

    /// Render back to `data:` form.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// Return the base64 payload of a data URL, or the input itself when it has
/// no `data:...,` prefix.
pub fn strip_data_url_prefix(input: &str) -> &str {
    if is_inline_source(input) {
        input.split_once(',').map(|(_, data)| data).unwrap_or(input)
    } else {
        input
    }
}

/// Detect an image MIME type from its magic bytes.
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("image/png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else if bytes.starts_with(b"BM") {
        Some("image/bmp")
    } else {
        None
    }
}

/// Encode raw bytes as a data URL.
///
/// Sniffed MIME wins over `mime_hint`; a hint that is not an `image/*` type
/// is ignored.
pub fn encode_bytes(bytes: &[u8], mime_hint: Option<&str>) -> Result<String> {
    if bytes.is_empty() {
        return Err(TryOnError::Decode("image payload is empty".into()));
    }

    let hint = mime_hint
        .map(|h| h.split(';').next().unwrap_or(h).trim())
        .filter(|h| h.starts_with("image/"));

    let mime = sniff_mime(bytes).or(hint).unwrap_or(FALLBACK_MIME);
    Ok(format!("data:{};base64,{}", mime, STANDARD.encode(bytes)))
}

/// Read a user-selected file into an upload [`ImageReference`].
///
/// # Errors
/// - The file cannot be read
/// - The file is empty or is neither an image by extension nor by content
pub async fn encode_local_file(path: &Path, role: UploadRole) -> Result<ImageReference> {
    let bytes = tokio::fs::read(path).await?;

    let by_extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .filter(|e| IMAGE_EXTENSIONS.contains(&e.as_str()));

    if by_extension.is_none() && sniff_mime(&bytes).is_none() {
        return Err(TryOnError::Decode(format!(
            "{} is not an image file",
            path.display()
        )));
    }

    let hint = by_extension.as_deref().map(mime_for_extension);
    let data_url = encode_bytes(&bytes, hint)?;
    debug!(path = %path.display(), bytes = bytes.len(), "encoded local image");

    Ok(ImageReference::upload(
        format!("{}-{}", role.id_prefix(), uuid::Uuid::new_v4()),
        data_url,
    ))
}

/// Fetch a remote image and encode it as a data URL.
pub async fn encode_remote(http: &Client, url: &str, timeout: Duration) -> Result<String> {
    let resp = http
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| TryOnError::Fetch {
            url: url.to_string(),
            reason: if e.is_timeout() {
                "request timed out".into()
            } else {
                e.to_string()
            },
        })?;

    if !resp.status().is_success() {
        return Err(TryOnError::Fetch {
            url: url.to_string(),
            reason: format!("HTTP {}", resp.status().as_u16()),
        });
    }

    let content_type = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let bytes = resp.bytes().await.map_err(|e| TryOnError::Fetch {
        url: url.to_string(),
        reason: format!("failed to read body: {}", e),
    })?;

    debug!(url, bytes = bytes.len(), "fetched remote image");

    let served_as_image = content_type
        .as_deref()
        .is_some_and(|ct| ct.trim_start().starts_with("image/"));
    if !bytes.is_empty() && !served_as_image && sniff_mime(&bytes).is_none() {
        return Err(TryOnError::Decode(format!(
            "{} did not return an image (content type {})",
            url,
            content_type.as_deref().unwrap_or("missing")
        )));
    }
    encode_bytes(&bytes, content_type.as_deref())
}

/// Return `source` unchanged when it is already inline, otherwise fetch it.
pub async fn ensure_inline(http: &Client, source: &str, timeout: Duration) -> Result<String> {
    if is_inline_source(source) {
        DataUrl::parse(source)?;
        return Ok(source.to_string());
    }
    encode_remote(http, source, timeout).await
}

fn mime_for_extension(ext: &str) -> &'static str {
    match ext {
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "avif" => "image/avif",
        "heic" => "image/heic",
        _ => "image/png",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];

    #[test]
    fn test_sniff_mime() {
        assert_eq!(sniff_mime(PNG_HEADER), Some("image/png"));
        assert_eq!(sniff_mime(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("image/jpeg"));
        assert_eq!(sniff_mime(b"GIF89a...."), Some("image/gif"));
        assert_eq!(sniff_mime(b"RIFF\0\0\0\0WEBPVP8 "), Some("image/webp"));
        assert_eq!(sniff_mime(b"hello"), None);
    }

    #[test]
    fn test_encode_bytes_is_deterministic() {
        let a = encode_bytes(PNG_HEADER, None).unwrap();
        let b = encode_bytes(PNG_HEADER, None).unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_encode_bytes_uses_hint_when_unknown() {
        let url = encode_bytes(b"opaque", Some("image/avif; charset=binary")).unwrap();
        assert!(url.starts_with("data:image/avif;base64,"));

        let url = encode_bytes(b"opaque", Some("text/html")).unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_encode_bytes_rejects_empty() {
        assert!(matches!(encode_bytes(&[], None), Err(TryOnError::Decode(_))));
    }

    #[test]
    fn test_data_url_parse() {
        let parsed = DataUrl::parse("data:image/jpeg;base64,/9j/4A==").unwrap();
        assert_eq!(parsed.mime_type, "image/jpeg");
        assert_eq!(parsed.data, "/9j/4A==");
        assert_eq!(parsed.bytes().unwrap(), vec![0xFF, 0xD8, 0xFF, 0xE0]);
        assert_eq!(parsed.to_data_url(), "data:image/jpeg;base64,/9j/4A==");
    }

    #[test]
    fn test_data_url_parse_rejects_garbage() {
        assert!(DataUrl::parse("https://example.com/a.png").is_err());
        assert!(DataUrl::parse("data:image/png,plain").is_err());
        assert!(DataUrl::parse("data:image/png;base64,").is_err());
        assert!(DataUrl::parse("data:image/png;base64,@@@").is_err());
    }

    #[test]
    fn test_strip_data_url_prefix() {
        assert_eq!(strip_data_url_prefix("data:image/png;base64,AAAA"), "AAAA");
        assert_eq!(strip_data_url_prefix("AAAA"), "AAAA");
    }

    #[tokio::test]
    async fn test_encode_local_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shirt.png");
        std::fs::write(&path, PNG_HEADER).unwrap();

        let first = encode_local_file(&path, UploadRole::Garment).await.unwrap();
        let second = encode_local_file(&path, UploadRole::Garment).await.unwrap();

        assert!(first.is_inline());
        assert!(first.id.starts_with("upload-garment-"));
        assert_eq!(first.source, second.source);
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_encode_local_file_rejects_non_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"just text").unwrap();

        let err = encode_local_file(&path, UploadRole::Person).await.unwrap_err();
        assert!(matches!(err, TryOnError::Decode(_)));
    }

    #[tokio::test]
    async fn test_encode_local_file_missing() {
        let err = encode_local_file(Path::new("/nonexistent/x.png"), UploadRole::Person)
            .await
            .unwrap_err();
        assert!(matches!(err, TryOnError::Io(_)));
    }

    #[tokio::test]
    async fn test_ensure_inline_passes_data_urls_through() {
        let http = Client::new();
        let src = "data:image/png;base64,iVBORw0KGgo=";
        let out = ensure_inline(&http, src, Duration::from_secs(1)).await.unwrap();
        assert_eq!(out, src);
    }

    #[tokio::test]
    async fn test_encode_remote_unreachable_is_fetch_error() {
        let http = Client::new();
        let err = encode_remote(&http, "http://127.0.0.1:1/a.png", Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, TryOnError::Fetch { .. }));
    }
}
