//! Where a track's encoded audio comes from

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::SourceError;

/// Supplies the raw encoded bytes behind a track's source locator
pub trait AudioSource: Send {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, SourceError>;
}

/// Extension of a locator, used as a decoder hint
pub fn extension_hint(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    Path::new(path).extension().and_then(|e| e.to_str())
}

/// Reads `file://` URLs and plain paths, relative paths resolved under `root`
#[derive(Debug, Clone)]
pub struct FileSource {
    root: PathBuf,
}

impl FileSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, url: &str) -> Result<PathBuf, SourceError> {
        let path = match url.split_once("://") {
            Some(("file", rest)) => rest,
            Some(_) => return Err(SourceError::Unsupported(url.to_string())),
            None => url,
        };
        let path = Path::new(path);
        Ok(if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        })
    }
}

impl AudioSource for FileSource {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, SourceError> {
        let path = self.resolve(url)?;
        std::fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => SourceError::NotFound(path.display().to_string()),
            _ => SourceError::Io {
                path: path.display().to_string(),
                reason: e.to_string(),
            },
        })
    }
}

/// Bytes held in memory, keyed by locator
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    entries: HashMap<String, Vec<u8>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, url: impl Into<String>, bytes: Vec<u8>) {
        self.entries.insert(url.into(), bytes);
    }

    pub fn with(mut self, url: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.insert(url, bytes);
        self
    }
}

impl AudioSource for MemorySource {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, SourceError> {
        self.entries
            .get(url)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(url.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_source_resolves_relative_and_file_urls() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("drums.wav"), b"abc").unwrap();
        let source = FileSource::new(dir.path());

        assert_eq!(source.fetch("drums.wav").unwrap(), b"abc");
        let url = format!("file://{}", dir.path().join("drums.wav").display());
        assert_eq!(source.fetch(&url).unwrap(), b"abc");
        assert!(matches!(source.fetch("bass.wav"), Err(SourceError::NotFound(_))));
        assert!(matches!(
            source.fetch("https://cdn.example.com/a.wav"),
            Err(SourceError::Unsupported(_))
        ));
    }

    #[test]
    fn extension_hint_ignores_query() {
        assert_eq!(extension_hint("stems/vox.mp3?token=1"), Some("mp3"));
        assert_eq!(extension_hint("https://x/y/bass.flac"), Some("flac"));
        assert_eq!(extension_hint("noext"), None);
    }
}
