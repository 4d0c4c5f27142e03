use crate::imaging;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use url::Url;
use uuid::Uuid;

pub type EntryId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Text,
    Image,
    Url,
    Html,
    Rtf,
}

impl DataType {
    pub fn label(self) -> &'static str {
        match self {
            DataType::Text => "text",
            DataType::Image => "image",
            DataType::Url => "url",
            DataType::Html => "html",
            DataType::Rtf => "rtf",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

/// The single payload of an entry. The variant is the entry's data type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EntryContent {
    Text {
        text: String,
    },
    Image {
        #[serde(with = "base64_bytes")]
        png: Vec<u8>,
    },
    Url {
        url: Url,
    },
    Html {
        #[serde(with = "base64_bytes")]
        html: Vec<u8>,
    },
    Rtf {
        #[serde(with = "base64_bytes")]
        rtf: Vec<u8>,
    },
}

impl EntryContent {
    pub fn data_type(&self) -> DataType {
        match self {
            EntryContent::Text { .. } => DataType::Text,
            EntryContent::Image { .. } => DataType::Image,
            EntryContent::Url { .. } => DataType::Url,
            EntryContent::Html { .. } => DataType::Html,
            EntryContent::Rtf { .. } => DataType::Rtf,
        }
    }

    /// False for payloads that are present but empty, which can only come
    /// from a hand-edited or damaged history file.
    pub fn is_well_formed(&self) -> bool {
        match self {
            EntryContent::Text { text } => !text.trim().is_empty(),
            EntryContent::Image { png } => !png.is_empty(),
            EntryContent::Url { .. } => true,
            EntryContent::Html { html } => !html.is_empty(),
            EntryContent::Rtf { rtf } => !rtf.is_empty(),
        }
    }

    /// Stable hash of the type tag and payload bytes.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.data_type().label().as_bytes());
        hasher.update([0u8]);
        match self {
            EntryContent::Text { text } => hasher.update(text.as_bytes()),
            EntryContent::Image { png } => hasher.update(png),
            EntryContent::Url { url } => hasher.update(url.as_str().as_bytes()),
            EntryContent::Html { html } => hasher.update(html),
            EntryContent::Rtf { rtf } => hasher.update(rtf),
        }
        format!("{:x}", hasher.finalize())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipboardEntry {
    id: EntryId,
    timestamp: DateTime<Utc>,
    content: EntryContent,
}

impl ClipboardEntry {
    pub fn new(content: EntryContent, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp,
            content,
        }
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn data_type(&self) -> DataType {
        self.content.data_type()
    }

    pub fn content(&self) -> &EntryContent {
        &self.content
    }

    pub fn text(&self) -> Option<&str> {
        match &self.content {
            EntryContent::Text { text } => Some(text),
            _ => None,
        }
    }

    pub fn image_data(&self) -> Option<&[u8]> {
        match &self.content {
            EntryContent::Image { png } => Some(png),
            _ => None,
        }
    }

    pub fn url(&self) -> Option<&Url> {
        match &self.content {
            EntryContent::Url { url } => Some(url),
            _ => None,
        }
    }

    pub fn html_data(&self) -> Option<&[u8]> {
        match &self.content {
            EntryContent::Html { html } => Some(html),
            _ => None,
        }
    }

    pub fn rtf_data(&self) -> Option<&[u8]> {
        match &self.content {
            EntryContent::Rtf { rtf } => Some(rtf),
            _ => None,
        }
    }

    /// `HH:MM` in local time.
    pub fn time_label(&self) -> String {
        self.timestamp.with_timezone(&Local).format("%H:%M").to_string()
    }

    /// One-line summary of the payload, at most `max_chars` characters.
    pub fn preview(&self, max_chars: usize) -> String {
        let raw = match &self.content {
            EntryContent::Text { text } => text
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .take(2)
                .collect::<Vec<_>>()
                .join(" "),
            EntryContent::Image { png } => match imaging::png_dimensions(png) {
                Ok((width, height)) => format!("Image {width}×{height}"),
                Err(_) => "Image".to_string(),
            },
            EntryContent::Url { url } => url.as_str().to_string(),
            EntryContent::Html { html } => {
                let markup = String::from_utf8_lossy(html);
                let markup = collapse_whitespace(markup.trim());
                if markup.is_empty() {
                    "HTML Content".to_string()
                } else {
                    format!("HTML Content: {markup}")
                }
            }
            EntryContent::Rtf { .. } => "Rich Text Content".to_string(),
        };
        truncate_chars(&raw, max_chars)
    }
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let mut out: String = value.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('…');
    out
}

mod base64_bytes {
    use super::{Engine, STANDARD};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
