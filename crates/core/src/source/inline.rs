//! Inline payloads and URL file extensions.

use base64::Engine as _;
use once_cell::sync::Lazy;
use regex_lite::Regex;

use super::SourceError;

static DATA_URI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^data:image/(png|jpg|jpeg);base64,(.*)$").unwrap()
});

const DEFAULT_EXTENSION: &str = "jpg";

/// A decoded inline image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub extension: String,
    pub bytes: Vec<u8>,
}

/// Whether `source` is an inline data URI rather than a URL.
pub fn is_inline(source: &str) -> bool {
    source.trim_start().starts_with("data:")
}

/// Decodes a `data:image/<png|jpg|jpeg>;base64,` payload.
pub fn parse_inline(source: &str, max_bytes: u64, max_mb: u64) -> Result<InlineImage, SourceError> {
    let caps = DATA_URI
        .captures(source.trim())
        .ok_or_else(|| SourceError::InvalidInline("expected data:image/<png|jpg|jpeg>;base64,".to_string()))?;

    let extension = caps[1].to_string();
    let encoded: String = caps[2].chars().filter(|c| !c.is_ascii_whitespace()).collect();

    // Base64 inflates by 4/3; reject before decoding.
    if (encoded.len() as u64) / 4 * 3 > max_bytes + 2 {
        return Err(SourceError::TooLarge { max_mb });
    }

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded.as_bytes())
        .map_err(|e| SourceError::InvalidInline(e.to_string()))?;

    if bytes.is_empty() {
        return Err(SourceError::Empty);
    }
    if bytes.len() as u64 > max_bytes {
        return Err(SourceError::TooLarge { max_mb });
    }

    Ok(InlineImage { extension, bytes })
}

/// File extension taken from the URL path, `jpg` when there is none.
pub fn extension_from_url(url: &reqwest::Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}
