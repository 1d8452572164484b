//! Directory browser state - file listing, selection, scrolling

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};

/// Image formats the viewer can decode directly
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "webp", "bmp", "ico", "tiff", "tif",
];

/// Container formats handed to the video pipeline
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi", "mov", "webm", "m4v", "flv", "wmv"];

/// What a browser entry points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    Image,
    Video,
    Other,
}

/// One row in the file browser
#[derive(Debug, Clone)]
pub struct FileEntry {
    pub name: String,
    pub path: PathBuf,
    pub kind: EntryKind,
}

impl FileEntry {
    pub fn from_path(path: PathBuf) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "..".to_string());

        let kind = if path.is_dir() {
            EntryKind::Directory
        } else {
            let ext = path
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
                EntryKind::Image
            } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
                EntryKind::Video
            } else {
                EntryKind::Other
            }
        };

        FileEntry { name, path, kind }
    }

    pub fn is_media(&self) -> bool {
        matches!(self.kind, EntryKind::Image | EntryKind::Video)
    }
}

/// Browser over one directory with a movable selection and scroll window
pub struct Browser {
    pub current_dir: PathBuf,
    pub entries: Vec<FileEntry>,
    pub selected: usize,
    pub scroll_offset: usize,
    pub show_hidden: bool,
}

impl Browser {
    pub fn new(start_dir: PathBuf, show_hidden: bool) -> Result<Self> {
        let mut browser = Browser {
            current_dir: start_dir.clone(),
            entries: Vec::new(),
            selected: 0,
            scroll_offset: 0,
            show_hidden,
        };
        browser.load_directory(&start_dir)?;
        Ok(browser)
    }

    /// Re-read a directory: `..` first, then directories, then files, both
    /// groups case-insensitively by name
    pub fn load_directory(&mut self, path: &Path) -> Result<()> {
        let mut entries = Vec::new();
        if let Some(parent) = path.parent() {
            entries.push(FileEntry {
                name: "..".to_string(),
                path: parent.to_path_buf(),
                kind: EntryKind::Directory,
            });
        }

        let mut listed: Vec<FileEntry> = fs::read_dir(path)?
            .filter_map(|e| e.ok())
            .map(|e| FileEntry::from_path(e.path()))
            .filter(|e| self.show_hidden || !e.name.starts_with('.'))
            .collect();

        listed.sort_by(|a, b| {
            let a_dir = a.kind == EntryKind::Directory;
            let b_dir = b.kind == EntryKind::Directory;
            match (a_dir, b_dir) {
                (true, false) => std::cmp::Ordering::Less,
                (false, true) => std::cmp::Ordering::Greater,
                _ => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            }
        });
        entries.extend(listed);

        self.entries = entries;
        self.selected = 0;
        self.scroll_offset = 0;
        self.current_dir = path.to_path_buf();
        Ok(())
    }

    pub fn reload(&mut self) -> Result<()> {
        let dir = self.current_dir.clone();
        let previous = self.selected;
        self.load_directory(&dir)?;
        self.selected = previous.min(self.entries.len().saturating_sub(1));
        Ok(())
    }

    pub fn selected_entry(&self) -> Option<&FileEntry> {
        self.entries.get(self.selected)
    }

    /// Move the selection by `delta` rows, clamped to the list
    pub fn navigate(&mut self, delta: i32) {
        if self.entries.is_empty() {
            return;
        }
        let last = self.entries.len() as i32 - 1;
        self.selected = (self.selected as i32 + delta).clamp(0, last) as usize;
    }

    pub fn select_first(&mut self) {
        self.selected = 0;
    }

    pub fn select_last(&mut self) {
        self.selected = self.entries.len().saturating_sub(1);
    }

    /// Move the selection to the next/previous media entry, wrapping
    /// around; returns the entry if one was found
    pub fn step_media(&mut self, delta: i32) -> Option<&FileEntry> {
        let len = self.entries.len();
        if len == 0 {
            return None;
        }
        let mut idx = self.selected;
        for _ in 0..len {
            idx = (idx as i32 + delta).rem_euclid(len as i32) as usize;
            if self.entries[idx].is_media() {
                self.selected = idx;
                return self.entries.get(idx);
            }
        }
        None
    }

    /// Keep the selection inside a window of `visible_rows`, adjusting the
    /// scroll offset; returns the row range to draw
    pub fn visible_range(&mut self, visible_rows: usize) -> std::ops::Range<usize> {
        if visible_rows == 0 || self.entries.is_empty() {
            return 0..0;
        }
        if self.selected < self.scroll_offset {
            self.scroll_offset = self.selected;
        } else if self.selected >= self.scroll_offset + visible_rows {
            self.scroll_offset = self.selected + 1 - visible_rows;
        }
        let end = (self.scroll_offset + visible_rows).min(self.entries.len());
        self.scroll_offset..end
    }

    /// Image paths with their distance from the selection, for the preload
    /// queue
    pub fn preload_candidates(&self) -> Vec<(usize, &Path)> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.kind == EntryKind::Image)
            .map(|(i, e)| (i.abs_diff(self.selected), e.path.as_path()))
            .collect()
    }
}
