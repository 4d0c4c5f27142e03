use crate::classify::ClipboardSnapshot;
use crate::entry::EntryContent;
use crate::imaging::{self, RawImage};
use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use std::sync::{Arc, Mutex, MutexGuard};

static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("html tag regex"));

/// Write side of the system clipboard.
pub trait ClipboardSink {
    /// Replaces the clipboard with the representation matching `content`.
    fn write(&mut self, content: &EntryContent) -> Result<()>;
}

/// Read side of the system clipboard.
pub trait ClipboardSource {
    fn read(&mut self) -> Result<ClipboardSnapshot>;

    /// A counter that moves whenever the clipboard changes, if the platform
    /// keeps one. Lets pollers skip reading unchanged content.
    fn change_marker(&mut self) -> Option<i64> {
        None
    }
}

/// The OS clipboard through arboard, plus NSPasteboard for rich text on macOS.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClipboard;

impl SystemClipboard {
    pub fn new() -> Self {
        Self
    }
}

impl ClipboardSink for SystemClipboard {
    fn write(&mut self, content: &EntryContent) -> Result<()> {
        let mut clipboard = arboard::Clipboard::new().context("init clipboard")?;
        match content {
            EntryContent::Text { text } => {
                clipboard.set_text(text.as_str()).context("set clipboard text")?;
            }
            EntryContent::Url { url } => {
                clipboard.set_text(url.as_str()).context("set clipboard url")?;
            }
            EntryContent::Html { html } => {
                let markup = String::from_utf8_lossy(html);
                let plain = html_to_plain_text(&markup);
                clipboard
                    .set_html(markup, Some(Cow::Owned(plain)))
                    .context("set clipboard html")?;
            }
            EntryContent::Image { png } => {
                let image = imaging::decode_png(png)?;
                clipboard
                    .set_image(arboard::ImageData {
                        width: image.width,
                        height: image.height,
                        bytes: Cow::Owned(image.rgba),
                    })
                    .context("set clipboard image")?;
            }
            EntryContent::Rtf { rtf } => write_rtf(rtf)?,
        }
        Ok(())
    }
}

impl ClipboardSource for SystemClipboard {
    fn read(&mut self) -> Result<ClipboardSnapshot> {
        let mut clipboard = arboard::Clipboard::new().context("init clipboard")?;
        let text = match clipboard.get_text() {
            Ok(text) => Some(text),
            Err(arboard::Error::ContentNotAvailable) => None,
            Err(err) => return Err(err).context("read clipboard text"),
        };
        let image = match clipboard.get_image() {
            Ok(image) => Some(RawImage {
                width: image.width,
                height: image.height,
                rgba: image.bytes.into_owned(),
            }),
            Err(arboard::Error::ContentNotAvailable) => None,
            Err(err) => {
                tracing::debug!(error = %err, "clipboard image unreadable");
                None
            }
        };
        let (html, rtf) = read_rich_text();
        Ok(ClipboardSnapshot {
            text,
            html,
            rtf,
            image,
        })
    }

    fn change_marker(&mut self) -> Option<i64> {
        platform_change_marker()
    }
}

#[cfg(target_os = "macos")]
fn platform_change_marker() -> Option<i64> {
    Some(pasteboard::change_count())
}

#[cfg(not(target_os = "macos"))]
fn platform_change_marker() -> Option<i64> {
    None
}

#[cfg(target_os = "macos")]
fn write_rtf(rtf: &[u8]) -> Result<()> {
    pasteboard::write_data(pasteboard::RTF_TYPE, rtf)
}

#[cfg(not(target_os = "macos"))]
fn write_rtf(_rtf: &[u8]) -> Result<()> {
    anyhow::bail!("rich text clipboard writes are only supported on macOS")
}

#[cfg(target_os = "macos")]
fn read_rich_text() -> (Option<String>, Option<Vec<u8>>) {
    let html = pasteboard::read_data(pasteboard::HTML_TYPE)
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned());
    let rtf = pasteboard::read_data(pasteboard::RTF_TYPE);
    (html, rtf)
}

#[cfg(not(target_os = "macos"))]
fn read_rich_text() -> (Option<String>, Option<Vec<u8>>) {
    (None, None)
}

fn html_to_plain_text(markup: &str) -> String {
    let stripped = HTML_TAG.replace_all(markup, " ");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(target_os = "macos")]
mod pasteboard {
    use anyhow::{Context, Result};
    use objc::rc::autoreleasepool;
    use objc::runtime::{BOOL, NO, Object};
    use objc::{class, msg_send, sel, sel_impl};
    use std::ffi::{CString, c_void};

    pub const HTML_TYPE: &str = "public.html";
    pub const RTF_TYPE: &str = "public.rtf";

    unsafe fn general() -> *mut Object {
        unsafe { msg_send![class!(NSPasteboard), generalPasteboard] }
    }

    unsafe fn ns_string(value: &str) -> Result<*mut Object> {
        let value = CString::new(value).context("pasteboard type contains nul")?;
        let string: *mut Object =
            unsafe { msg_send![class!(NSString), stringWithUTF8String: value.as_ptr()] };
        Ok(string)
    }

    pub fn change_count() -> i64 {
        autoreleasepool(|| unsafe {
            let count: isize = msg_send![general(), changeCount];
            count as i64
        })
    }

    pub fn read_data(kind: &str) -> Option<Vec<u8>> {
        autoreleasepool(|| unsafe {
            let board = general();
            let kind = ns_string(kind).ok()?;
            let data: *mut Object = msg_send![board, dataForType: kind];
            if data.is_null() {
                return None;
            }
            let len: usize = msg_send![data, length];
            let ptr: *const u8 = msg_send![data, bytes];
            if ptr.is_null() || len == 0 {
                return None;
            }
            Some(std::slice::from_raw_parts(ptr, len).to_vec())
        })
    }

    pub fn write_data(kind: &str, bytes: &[u8]) -> Result<()> {
        autoreleasepool(|| unsafe {
            let board = general();
            let ns_kind = ns_string(kind)?;
            let raw = bytes.as_ptr() as *const c_void;
            let len = bytes.len();
            let data: *mut Object = msg_send![class!(NSData), dataWithBytes: raw length: len];
            let _: isize = msg_send![board, clearContents];
            let ok: BOOL = msg_send![board, setData: data forType: ns_kind];
            anyhow::ensure!(ok != NO, "pasteboard rejected {kind} data");
            Ok(())
        })
    }
}

/// In-process clipboard for tests and headless runs. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryClipboard {
    inner: Arc<Mutex<MemoryState>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    snapshot: ClipboardSnapshot,
    changes: i64,
    reject_writes: bool,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates another application putting `snapshot` on the clipboard.
    pub fn set(&self, snapshot: ClipboardSnapshot) {
        let mut state = self.state();
        state.snapshot = snapshot;
        state.changes += 1;
    }

    pub fn contents(&self) -> ClipboardSnapshot {
        self.state().snapshot.clone()
    }

    pub fn reject_writes(&self, reject: bool) {
        self.state().reject_writes = reject;
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ClipboardSink for MemoryClipboard {
    fn write(&mut self, content: &EntryContent) -> Result<()> {
        anyhow::ensure!(!self.state().reject_writes, "clipboard write rejected");
        let snapshot = snapshot_for(content)?;
        self.set(snapshot);
        Ok(())
    }
}

impl ClipboardSource for MemoryClipboard {
    fn read(&mut self) -> Result<ClipboardSnapshot> {
        Ok(self.contents())
    }

    fn change_marker(&mut self) -> Option<i64> {
        Some(self.state().changes)
    }
}

/// The representations a native write of `content` leaves on the clipboard.
fn snapshot_for(content: &EntryContent) -> Result<ClipboardSnapshot> {
    let snapshot = match content {
        EntryContent::Text { text } => ClipboardSnapshot::text(text.as_str()),
        EntryContent::Url { url } => ClipboardSnapshot::text(url.as_str()),
        EntryContent::Html { html } => {
            let markup = String::from_utf8_lossy(html).into_owned();
            ClipboardSnapshot {
                text: Some(html_to_plain_text(&markup)),
                html: Some(markup),
                ..ClipboardSnapshot::default()
            }
        }
        EntryContent::Rtf { rtf } => ClipboardSnapshot {
            rtf: Some(rtf.clone()),
            ..ClipboardSnapshot::default()
        },
        EntryContent::Image { png } => ClipboardSnapshot {
            image: Some(imaging::decode_png(png)?),
            ..ClipboardSnapshot::default()
        },
    };
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;
    use url::Url;

    #[test]
    fn plain_text_alternative_drops_tags() {
        assert_eq!(
            html_to_plain_text("<p>Hello <b>there</b>,\n world</p>"),
            "Hello there , world"
        );
    }

    #[test]
    fn memory_write_reads_back_as_same_content() -> Result<()> {
        let mut clipboard = MemoryClipboard::new();
        let contents = [
            EntryContent::Text {
                text: "hello".to_string(),
            },
            EntryContent::Url {
                url: Url::parse("https://example.com/")?,
            },
            EntryContent::Html {
                html: b"<b>bold</b> move".to_vec(),
            },
            EntryContent::Rtf {
                rtf: br"{\rtf1 x}".to_vec(),
            },
        ];
        for content in &contents {
            clipboard.write(content)?;
            let snapshot = clipboard.read()?;
            assert_eq!(classify(&snapshot)?.as_ref(), Some(content));
        }
        Ok(())
    }

    #[test]
    fn memory_change_marker_moves_on_every_write() -> Result<()> {
        let mut clipboard = MemoryClipboard::new();
        let before = clipboard.change_marker();
        clipboard.write(&EntryContent::Text {
            text: "a".to_string(),
        })?;
        assert_ne!(clipboard.change_marker(), before);
        Ok(())
    }

    #[test]
    fn rejected_write_leaves_clipboard_alone() {
        let mut clipboard = MemoryClipboard::new();
        clipboard.set(ClipboardSnapshot::text("keep"));
        clipboard.reject_writes(true);
        let result = clipboard.write(&EntryContent::Text {
            text: "lost".to_string(),
        });
        assert!(result.is_err());
        assert_eq!(clipboard.contents(), ClipboardSnapshot::text("keep"));
    }

    #[test]
    #[ignore = "touches the real system clipboard"]
    fn system_clipboard_text_write_is_readable() -> Result<()> {
        let mut clipboard = SystemClipboard::new();
        clipboard.write(&EntryContent::Text {
            text: "clipshelf round trip".to_string(),
        })?;
        let snapshot = clipboard.read()?;
        assert_eq!(snapshot.text.as_deref(), Some("clipshelf round trip"));
        Ok(())
    }
}
