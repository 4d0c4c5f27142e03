use crate::entry::EntryContent;
use crate::imaging::{self, RawImage};
use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use url::Url;

static HTML_DOCUMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(<!doctype\s+html|<html[\s>])").expect("html marker regex"));

const URL_SCHEMES: &[&str] = &["http", "https", "ftp", "file", "mailto"];

/// Everything the system clipboard offered at one moment, one field per
/// representation. Any subset may be present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClipboardSnapshot {
    pub text: Option<String>,
    pub html: Option<String>,
    pub rtf: Option<Vec<u8>>,
    pub image: Option<RawImage>,
}

impl ClipboardSnapshot {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.html.is_none() && self.rtf.is_none() && self.image.is_none()
    }

    /// Hash over every representation, used to notice that the clipboard changed.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        let mut field = |tag: &[u8], bytes: Option<&[u8]>| {
            hasher.update(tag);
            match bytes {
                Some(bytes) => {
                    hasher.update((bytes.len() as u64).to_le_bytes());
                    hasher.update(bytes);
                }
                None => hasher.update([0xffu8]),
            }
        };
        field(b"text", self.text.as_deref().map(str::as_bytes));
        field(b"html", self.html.as_deref().map(str::as_bytes));
        field(b"rtf", self.rtf.as_deref());
        field(b"image", self.image.as_ref().map(|img| img.rgba.as_slice()));
        if let Some(img) = &self.image {
            hasher.update((img.width as u64).to_le_bytes());
            hasher.update((img.height as u64).to_le_bytes());
        }
        format!("{:x}", hasher.finalize())
    }
}

/// Picks the one representation worth recording, by fixed priority:
/// image, url, html, rtf, then plain text. `Ok(None)` means nothing usable.
pub fn classify(snapshot: &ClipboardSnapshot) -> Result<Option<EntryContent>> {
    if let Some(image) = snapshot.image.as_ref().filter(|img| !img.is_empty()) {
        let png = imaging::encode_png(image)?;
        return Ok(Some(EntryContent::Image { png }));
    }

    let text = snapshot.text.as_deref().filter(|t| !t.trim().is_empty());

    if let Some(url) = text.and_then(parse_url) {
        return Ok(Some(EntryContent::Url { url }));
    }

    if let Some(html) = snapshot.html.as_deref().filter(|h| !h.trim().is_empty()) {
        return Ok(Some(EntryContent::Html {
            html: html.as_bytes().to_vec(),
        }));
    }
    if let Some(text) = text.filter(|t| HTML_DOCUMENT.is_match(t)) {
        return Ok(Some(EntryContent::Html {
            html: text.as_bytes().to_vec(),
        }));
    }

    if let Some(rtf) = snapshot.rtf.as_ref().filter(|r| !r.is_empty()) {
        return Ok(Some(EntryContent::Rtf { rtf: rtf.clone() }));
    }
    if let Some(text) = text.filter(|t| t.trim_start().starts_with(r"{\rtf")) {
        return Ok(Some(EntryContent::Rtf {
            rtf: text.trim_start().as_bytes().to_vec(),
        }));
    }

    Ok(text.map(|text| EntryContent::Text {
        text: text.to_string(),
    }))
}

fn parse_url(text: &str) -> Option<Url> {
    let candidate = text.trim();
    if candidate.chars().any(char::is_whitespace) {
        return None;
    }
    let url = Url::parse(candidate).ok()?;
    if !URL_SCHEMES.contains(&url.scheme()) {
        return None;
    }
    let needs_host = matches!(url.scheme(), "http" | "https" | "ftp");
    if needs_host && url.host_str().is_none_or(str::is_empty) {
        return None;
    }
    Some(url)
}
