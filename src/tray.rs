use crate::entry::{ClipboardEntry, DataType, EntryId};
use anyhow::{Context, Result};
use std::collections::HashMap;
use tray_icon::menu::{Menu, MenuId, MenuItem, PredefinedMenuItem};
use tray_icon::{Icon, TrayIcon, TrayIconBuilder};

const ICON_SIZE: usize = 44;
const COPIED_SUFFIX: &str = "  ✓ Copied!";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrayAction {
    Copy(EntryId),
    ClearHistory,
    Quit,
}

#[derive(Debug, Clone, Copy)]
pub struct MenuLayout {
    pub max_entries: usize,
    pub preview_chars: usize,
}

pub struct TrayController {
    tray: TrayIcon,
    entry_items: HashMap<MenuId, EntryId>,
    clear_id: MenuId,
    quit_id: MenuId,
    icons: TrayIcons,
    layout: MenuLayout,
}

struct TrayIcons {
    idle: Icon,
    copied: Icon,
}

struct BuiltMenu {
    menu: Menu,
    entry_items: HashMap<MenuId, EntryId>,
    clear_id: MenuId,
    quit_id: MenuId,
}

impl TrayController {
    pub fn new<'a, I>(entries: I, copied: Option<EntryId>, layout: MenuLayout) -> Result<Self>
    where
        I: ExactSizeIterator<Item = &'a ClipboardEntry>,
    {
        let built = build_menu(entries, copied, layout)?;
        let icons = TrayIcons::new()?;
        let icon = if copied.is_some() {
            icons.copied.clone()
        } else {
            icons.idle.clone()
        };
        let tray = TrayIconBuilder::new()
            .with_menu(Box::new(built.menu))
            .with_tooltip("Clipboard history")
            .with_icon(icon)
            .build()
            .context("create tray icon")?;

        Ok(Self {
            tray,
            entry_items: built.entry_items,
            clear_id: built.clear_id,
            quit_id: built.quit_id,
            icons,
            layout,
        })
    }

    pub fn action_for_menu(&self, id: MenuId) -> Option<TrayAction> {
        if id == self.clear_id {
            return Some(TrayAction::ClearHistory);
        }
        if id == self.quit_id {
            return Some(TrayAction::Quit);
        }
        self.entry_items.get(&id).copied().map(TrayAction::Copy)
    }

    /// Rebuilds the menu from the current history and copied marker.
    pub fn refresh<'a, I>(&mut self, entries: I, copied: Option<EntryId>) -> Result<()>
    where
        I: ExactSizeIterator<Item = &'a ClipboardEntry>,
    {
        let built = build_menu(entries, copied, self.layout)?;
        self.tray.set_menu(Some(Box::new(built.menu)));
        self.entry_items = built.entry_items;
        self.clear_id = built.clear_id;
        self.quit_id = built.quit_id;
        let icon = if copied.is_some() {
            self.icons.copied.clone()
        } else {
            self.icons.idle.clone()
        };
        self.tray.set_icon(Some(icon))?;
        Ok(())
    }
}

fn build_menu<'a, I>(entries: I, copied: Option<EntryId>, layout: MenuLayout) -> Result<BuiltMenu>
where
    I: ExactSizeIterator<Item = &'a ClipboardEntry>,
{
    let total = entries.len();
    let menu = Menu::new();
    let status = match total {
        0 => "No clipboard history".to_string(),
        1 => "1 entry".to_string(),
        n => format!("{n} entries"),
    };
    menu.append(&MenuItem::new(status, false, None))?;
    menu.append(&PredefinedMenuItem::separator())?;

    let mut entry_items = HashMap::new();
    for entry in entries.take(layout.max_entries) {
        let label = entry_label(entry, copied == Some(entry.id()), layout.preview_chars);
        let item = MenuItem::new(label, true, None);
        entry_items.insert(item.id().clone(), entry.id());
        menu.append(&item)?;
    }
    if total > layout.max_entries {
        let more = MenuItem::new(format!("… {} more", total - layout.max_entries), false, None);
        menu.append(&more)?;
    }

    menu.append(&PredefinedMenuItem::separator())?;
    let clear_item = MenuItem::new("Clear History", total > 0, None);
    let quit_item = MenuItem::new("Quit", true, None);
    menu.append(&clear_item)?;
    menu.append(&quit_item)?;

    Ok(BuiltMenu {
        menu,
        entry_items,
        clear_id: clear_item.id().clone(),
        quit_id: quit_item.id().clone(),
    })
}

fn type_glyph(kind: DataType) -> &'static str {
    match kind {
        DataType::Text => "¶",
        DataType::Image => "▣",
        DataType::Url => "🔗",
        DataType::Html => "</>",
        DataType::Rtf => "✎",
    }
}

pub fn entry_label(entry: &ClipboardEntry, copied: bool, preview_chars: usize) -> String {
    let mut label = format!(
        "{}  {}  {}",
        type_glyph(entry.data_type()),
        entry.time_label(),
        entry.preview(preview_chars)
    );
    if copied {
        label.push_str(COPIED_SUFFIX);
    }
    label
}

impl TrayIcons {
    fn new() -> Result<Self> {
        Ok(Self {
            idle: Icon::from_rgba(clipboard_canvas(false), ICON_SIZE as u32, ICON_SIZE as u32)
                .context("build idle icon")?,
            copied: Icon::from_rgba(clipboard_canvas(true), ICON_SIZE as u32, ICON_SIZE as u32)
                .context("build copied icon")?,
        })
    }
}

fn clipboard_canvas(copied: bool) -> Vec<u8> {
    let mut canvas = Canvas::new(ICON_SIZE);
    let ink = [0, 0, 0, 255];
    let mid = (ICON_SIZE / 2) as i32;
    // board
    canvas.fill_rect(8, 8, 28, 3, ink);
    canvas.fill_rect(8, 38, 28, 3, ink);
    canvas.fill_rect(8, 8, 3, 33, ink);
    canvas.fill_rect(33, 8, 3, 33, ink);
    // clip
    canvas.fill_rect(mid - 6, 4, 12, 8, ink);
    for y in [18, 24, 30] {
        canvas.fill_rect(14, y, 16, 2, [0, 0, 0, 180]);
    }
    if copied {
        canvas.fill_disc(32, 32, 9, [32, 170, 72, 255]);
    }
    canvas.into_rgba()
}

/// Square RGBA buffer; writes outside it are dropped.
struct Canvas {
    side: usize,
    rgba: Vec<u8>,
}

impl Canvas {
    fn new(side: usize) -> Self {
        Self {
            side,
            rgba: vec![0; side * side * 4],
        }
    }

    fn paint(&mut self, x: i32, y: i32, color: [u8; 4]) {
        let (Ok(x), Ok(y)) = (usize::try_from(x), usize::try_from(y)) else {
            return;
        };
        if x < self.side && y < self.side {
            let at = (y * self.side + x) * 4;
            self.rgba[at..at + 4].copy_from_slice(&color);
        }
    }

    fn fill_rect(&mut self, left: i32, top: i32, width: i32, height: i32, color: [u8; 4]) {
        for y in top..top + height {
            for x in left..left + width {
                self.paint(x, y, color);
            }
        }
    }

    fn fill_disc(&mut self, cx: i32, cy: i32, radius: i32, color: [u8; 4]) {
        for y in cy - radius..=cy + radius {
            for x in cx - radius..=cx + radius {
                if (x - cx).pow(2) + (y - cy).pow(2) <= radius * radius {
                    self.paint(x, y, color);
                }
            }
        }
    }

    fn into_rgba(self) -> Vec<u8> {
        self.rgba
    }
}
