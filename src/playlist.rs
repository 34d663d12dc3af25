use crate::scan::ContentEntry;

/// Ordered ring of content entries plus the active position.
///
/// While `entries` is non-empty `index < entries.len()` always holds. The
/// index carries no meaning for an empty playlist.
#[derive(Debug, Clone, Default)]
pub struct Playlist {
    entries: Vec<ContentEntry>,
    index: usize,
}

impl Playlist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in a freshly scanned list and restart from the first entry.
    /// Position is not carried over, even when the old current entry survived.
    pub fn replace(&mut self, entries: Vec<ContentEntry>) {
        self.entries = entries;
        self.index = 0;
    }

    pub fn current(&self) -> Option<&ContentEntry> {
        self.entries.get(self.index)
    }

    /// Rotate to the next entry, wrapping at the end.
    pub fn advance(&mut self) {
        if self.entries.is_empty() {
            return;
        }
        self.index = (self.index + 1) % self.entries.len();
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ContentEntry] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::ContentKind;

    fn entries(names: &[&str]) -> Vec<ContentEntry> {
        names
            .iter()
            .map(|n| ContentEntry::new(format!("/content/{n}"), ContentKind::Image))
            .collect()
    }

    #[test]
    fn advancing_len_times_returns_to_start() {
        for len in 1..=5 {
            let mut playlist = Playlist::new();
            let names: Vec<String> = (0..len).map(|i| format!("{i}.png")).collect();
            let refs: Vec<&str> = names.iter().map(String::as_str).collect();
            playlist.replace(entries(&refs));
            playlist.advance();
            let start = playlist.index();
            for _ in 0..len {
                playlist.advance();
                assert!(playlist.index() < playlist.len());
            }
            assert_eq!(playlist.index(), start, "ring invariant for len {len}");
        }
    }

    #[test]
    fn replace_resets_index() {
        let mut playlist = Playlist::new();
        playlist.replace(entries(&["a.png", "b.png", "c.png"]));
        playlist.advance();
        playlist.advance();
        assert_eq!(playlist.index(), 2);

        playlist.replace(entries(&["c.png", "d.png"]));
        assert_eq!(playlist.index(), 0);
        assert_eq!(
            playlist.current().map(|e| e.locator().to_path_buf()),
            Some("/content/c.png".into())
        );
    }

    #[test]
    fn empty_playlist_has_no_current_and_ignores_advance() {
        let mut playlist = Playlist::new();
        assert!(playlist.current().is_none());
        playlist.advance();
        assert!(playlist.current().is_none());

        playlist.replace(entries(&["a.png"]));
        playlist.replace(Vec::new());
        assert!(playlist.current().is_none());
    }

    #[test]
    fn single_entry_wraps_onto_itself() {
        let mut playlist = Playlist::new();
        playlist.replace(entries(&["only.png"]));
        playlist.advance();
        assert_eq!(playlist.index(), 0);
    }
}
