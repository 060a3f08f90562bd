//! Document source for the content indexer.
//!
//! Walks `documents.root`, keeps files matching the include globs (and not
//! the exclude globs), and extracts their text: PDFs through `pdf-extract`,
//! everything else as UTF-8. A file that cannot be read or extracted is
//! logged and skipped so one bad PDF does not abort a whole indexing run.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::DocumentsConfig;
use crate::error::{Error, Result};
use crate::models::Document;

const DEFAULT_EXCLUDES: [&str; 3] = ["**/.git/**", "**/target/**", "**/node_modules/**"];

pub struct DocumentLoader {
    root: PathBuf,
    include: GlobSet,
    exclude: GlobSet,
}

impl DocumentLoader {
    pub fn new(root: impl Into<PathBuf>, include: &[String], exclude: &[String]) -> Result<Self> {
        let mut excludes: Vec<String> = DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
        excludes.extend(exclude.iter().cloned());
        Ok(Self {
            root: root.into(),
            include: build_globset(include)?,
            exclude: build_globset(&excludes)?,
        })
    }

    pub fn from_config(config: &DocumentsConfig) -> Result<Self> {
        Self::new(&config.root, &config.include_globs, &config.exclude_globs)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Load every matching document, sorted by path relative to the root.
    pub fn load(&self) -> Result<Vec<Document>> {
        if !self.root.exists() {
            return Err(Error::Document(format!(
                "document root does not exist: {}",
                self.root.display()
            )));
        }

        let mut docs = Vec::new();
        let mut skipped = 0usize;
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry.map_err(|e| Error::Document(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(&self.root).unwrap_or(path);
            let rel_str = relative.to_string_lossy().to_string();

            if self.exclude.is_match(&rel_str) || !self.include.is_match(&rel_str) {
                continue;
            }

            match read_document(path) {
                Ok(text) => {
                    debug!(file = %rel_str, bytes = text.len(), "loaded document");
                    docs.push(Document::with_source(rel_str, text));
                }
                Err(e) => {
                    warn!(file = %rel_str, error = %e, "failed to load document, skipping");
                    skipped += 1;
                }
            }
        }

        docs.sort_by(|a, b| a.source.cmp(&b.source));
        info!(
            root = %self.root.display(),
            documents = docs.len(),
            skipped,
            "loaded documents"
        );
        Ok(docs)
    }
}

fn read_document(path: &Path) -> Result<String> {
    let is_pdf = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);

    if is_pdf {
        let bytes = std::fs::read(path).map_err(|e| Error::io(path, e))?;
        pdf_extract::extract_text_from_mem(&bytes)
            .map_err(|e| Error::Document(format!("PDF extraction failed: {}", e)))
    } else {
        std::fs::read_to_string(path).map_err(|e| Error::io(path, e))
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| Error::Config(format!("invalid glob '{}': {}", pattern, e)))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| Error::Config(format!("invalid glob set: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn globs(patterns: &[&str]) -> Vec<String> {
        patterns.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_load_filters_and_sorts() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        std::fs::create_dir_all(root.join("biology")).unwrap();
        std::fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        std::fs::write(root.join("biology/mitosis.txt"), "Mitosis has four phases.").unwrap();
        std::fs::write(root.join("a_notes.md"), "# Notes").unwrap();
        std::fs::write(root.join("image.png"), [0u8, 1, 2]).unwrap();
        std::fs::write(root.join("node_modules/pkg/readme.md"), "ignored").unwrap();

        let loader = DocumentLoader::new(root, &globs(&["**/*.txt", "**/*.md"]), &[]).unwrap();
        let docs = loader.load().unwrap();
        let sources: Vec<&str> = docs.iter().filter_map(|d| d.source.as_deref()).collect();
        assert_eq!(sources, vec!["a_notes.md", "biology/mitosis.txt"]);
        assert_eq!(docs[1].text, "Mitosis has four phases.");
    }

    #[test]
    fn test_exclude_globs() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("keep.txt"), "keep").unwrap();
        std::fs::write(tmp.path().join("draft.txt"), "drop").unwrap();

        let loader =
            DocumentLoader::new(tmp.path(), &globs(&["**/*.txt"]), &globs(&["draft.txt"])).unwrap();
        let docs = loader.load().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text, "keep");
    }

    #[test]
    fn test_broken_pdf_is_skipped() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("broken.pdf"), b"not a pdf").unwrap();
        std::fs::write(tmp.path().join("ok.txt"), "fine").unwrap();

        let loader =
            DocumentLoader::new(tmp.path(), &globs(&["**/*.pdf", "**/*.txt"]), &[]).unwrap();
        let docs = loader.load().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].source.as_deref(), Some("ok.txt"));
    }

    #[test]
    fn test_missing_root() {
        let loader = DocumentLoader::new("/nonexistent/dataset", &globs(&["**/*"]), &[]).unwrap();
        assert!(matches!(loader.load(), Err(Error::Document(_))));
    }

    #[test]
    fn test_invalid_glob() {
        assert!(matches!(
            DocumentLoader::new(".", &globs(&["a[b"]), &[]),
            Err(Error::Config(_))
        ));
    }
}
