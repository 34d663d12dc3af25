//! Folder scanning: enumerate the content folder and classify its files.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::ExtensionOptions;
use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Image,
    Video,
}

/// One playable file. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentEntry {
    locator: PathBuf,
    kind: ContentKind,
}

impl ContentEntry {
    pub fn new(locator: impl Into<PathBuf>, kind: ContentKind) -> Self {
        Self {
            locator: locator.into(),
            kind,
        }
    }

    pub fn locator(&self) -> &Path {
        &self.locator
    }

    pub fn kind(&self) -> ContentKind {
        self.kind
    }
}

/// Case-insensitive extension lookup. Anything not listed is unsupported.
#[derive(Debug, Clone)]
pub struct ExtensionTable {
    kinds: HashMap<String, ContentKind>,
}

impl ExtensionTable {
    pub fn new(options: &ExtensionOptions) -> Self {
        let videos = options.video.iter().map(|e| (e, ContentKind::Video));
        let images = options.image.iter().map(|e| (e, ContentKind::Image));
        Self {
            kinds: videos
                .chain(images)
                .map(|(ext, kind)| (ext.to_ascii_lowercase(), kind))
                .collect(),
        }
    }

    /// Classify by the text after the last dot of the file name, so a
    /// hidden file like `.mp4` counts as a video.
    #[must_use]
    pub fn classify(&self, path: &Path) -> Option<ContentKind> {
        let name = path.file_name().and_then(OsStr::to_str)?;
        let (_, ext) = name.rsplit_once('.')?;
        self.kinds.get(&ext.to_ascii_lowercase()).copied()
    }
}

impl Default for ExtensionTable {
    fn default() -> Self {
        Self::new(&ExtensionOptions::default())
    }
}

/// Host file system primitive the scanner reads through.
pub trait FolderSource: Send + Sync {
    /// Regular files directly inside `folder`.
    fn list_children(&self, folder: &Path) -> io::Result<Vec<PathBuf>>;

    fn ensure_exists(&self, folder: &Path) -> io::Result<()>;
}

/// [`FolderSource`] backed by the local file system.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFolder;

impl FolderSource for LocalFolder {
    fn list_children(&self, folder: &Path) -> io::Result<Vec<PathBuf>> {
        let mut out = Vec::new();
        for entry in WalkDir::new(folder)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
        {
            let entry = match entry {
                Ok(entry) => entry,
                // Root failures are fatal for the scan; a single broken link is not.
                Err(err) if err.depth() == 0 => return Err(err.into()),
                Err(err) => {
                    debug!("skipping unreadable entry: {err}");
                    continue;
                }
            };
            if entry.file_type().is_file() {
                out.push(entry.into_path());
            }
        }
        Ok(out)
    }

    fn ensure_exists(&self, folder: &Path) -> io::Result<()> {
        if folder.is_dir() {
            return Ok(());
        }
        info!(folder = %folder.display(), "creating content folder");
        fs::create_dir_all(folder)
    }
}

/// Result of one scan. `failure` carries the diagnostic when enumeration
/// failed; `entries` is empty in that case.
#[derive(Debug, Default)]
pub struct ScanReport {
    pub entries: Vec<ContentEntry>,
    pub failure: Option<Error>,
}

impl ScanReport {
    fn failed(error: Error) -> Self {
        Self {
            entries: Vec::new(),
            failure: Some(error),
        }
    }
}

#[derive(Clone)]
pub struct ContentScanner {
    folder: PathBuf,
    table: Arc<ExtensionTable>,
    source: Arc<dyn FolderSource>,
}

impl ContentScanner {
    pub fn new(folder: impl Into<PathBuf>, table: ExtensionTable) -> Self {
        Self::with_source(folder, table, Arc::new(LocalFolder))
    }

    pub fn with_source(
        folder: impl Into<PathBuf>,
        table: ExtensionTable,
        source: Arc<dyn FolderSource>,
    ) -> Self {
        Self {
            folder: folder.into(),
            table: Arc::new(table),
            source,
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn table(&self) -> &ExtensionTable {
        &self.table
    }

    /// List, classify and sort the folder's direct children. A missing folder
    /// is created and yields an empty playlist; IO failures yield an empty
    /// report with the error attached.
    pub fn scan(&self) -> ScanReport {
        if let Err(source) = self.source.ensure_exists(&self.folder) {
            return self.failed(source);
        }
        let children = match self.source.list_children(&self.folder) {
            Ok(children) => children,
            Err(source) => return self.failed(source),
        };

        let mut entries: Vec<ContentEntry> = children
            .into_iter()
            .filter_map(|path| match self.table.classify(&path) {
                Some(kind) => Some(ContentEntry::new(path, kind)),
                None => {
                    debug!(path = %path.display(), "unsupported file skipped");
                    None
                }
            })
            .collect();
        entries.sort_by(|a, b| a.locator.as_os_str().cmp(b.locator.as_os_str()));

        debug!(
            folder = %self.folder.display(),
            entries = entries.len(),
            "scan complete"
        );
        ScanReport {
            entries,
            failure: None,
        }
    }

    /// [`scan`](Self::scan) on the blocking pool. Runs to completion once started.
    pub async fn scan_blocking(&self) -> ScanReport {
        let scanner = self.clone();
        match tokio::task::spawn_blocking(move || scanner.scan()).await {
            Ok(report) => report,
            Err(err) => self.failed(io::Error::other(err)),
        }
    }

    fn failed(&self, source: io::Error) -> ScanReport {
        warn!(folder = %self.folder.display(), error = %source, "content scan failed");
        ScanReport::failed(Error::ScanIo {
            folder: self.folder.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_ignores_case() {
        let table = ExtensionTable::default();
        assert_eq!(table.classify(Path::new("/x/a.MP4")), Some(ContentKind::Video));
        assert_eq!(table.classify(Path::new("/x/b.Jpeg")), Some(ContentKind::Image));
        assert_eq!(table.classify(Path::new("/x/c.webm")), Some(ContentKind::Video));
        assert_eq!(table.classify(Path::new("/x/d.webp")), Some(ContentKind::Image));
    }

    #[test]
    fn unsupported_and_extensionless_files_are_rejected() {
        let table = ExtensionTable::default();
        assert_eq!(table.classify(Path::new("/x/notes.txt")), None);
        assert_eq!(table.classify(Path::new("/x/README")), None);
        assert_eq!(table.classify(Path::new("/x/clip.gif")), None);
        assert_eq!(table.classify(Path::new("/x/trailing.")), None);
    }

    #[test]
    fn dot_files_classify_by_suffix() {
        let table = ExtensionTable::default();
        assert_eq!(table.classify(Path::new("/x/.mp4")), Some(ContentKind::Video));
        assert_eq!(table.classify(Path::new("/x/.cover.PNG")), Some(ContentKind::Image));
        assert_eq!(table.classify(Path::new("/x/.hidden")), None);
    }

    #[test]
    fn custom_table_drives_classification() {
        let table = ExtensionTable::new(&ExtensionOptions {
            video: vec!["mov".into()],
            image: vec!["gif".into()],
        });
        assert_eq!(table.classify(Path::new("a.MOV")), Some(ContentKind::Video));
        assert_eq!(table.classify(Path::new("a.gif")), Some(ContentKind::Image));
        assert_eq!(table.classify(Path::new("a.mp4")), None);
    }
}
