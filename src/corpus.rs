//! A directory of annotated documents, loaded concurrently and exported as XML.

use crate::discovery::{self, DiscoveryConfig, PairValidation, XML_EXTENSION};
use crate::document::{load_document_with_key, AnnotatedDocument};
use crate::error::{Result, StandoffError};
use crate::reader::ReaderConfig;
use crate::xml;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

/// Configuration for loading a corpus
#[derive(Debug, Clone)]
pub struct CorpusConfig {
    /// Abort on the first document that fails
    pub fail_fast: bool,
    /// Descend into subdirectories
    pub recursive: bool,
    /// Documents parsed at the same time
    pub concurrency: usize,
    pub reader: ReaderConfig,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            fail_fast: false,
            recursive: false,
            concurrency: num_cpus::get().max(1),
            reader: ReaderConfig::default(),
        }
    }
}

impl CorpusConfig {
    fn discovery(&self) -> DiscoveryConfig {
        DiscoveryConfig {
            fail_fast: self.fail_fast,
            recursive: self.recursive,
        }
    }
}

/// Per-document processing statistics
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DocumentStats {
    pub key: String,
    pub path: String,
    pub sentences: u64,
    pub words: u64,
    pub annotations: u64,
    pub bindings: u64,
    pub malformed_lines: u64,
    pub skipped_records: u64,
    pub notes: u64,
    pub processing_time_ms: u64,
    /// success, skipped or failed
    pub status: String,
    pub error: Option<String>,
}

impl DocumentStats {
    fn success(document: &AnnotatedDocument, path: &Path, elapsed_ms: u64) -> Self {
        let report = document.report();
        Self {
            key: document.key().to_string(),
            path: path.display().to_string(),
            sentences: document.sentences().len() as u64,
            words: document.word_count() as u64,
            annotations: document.annotations().len() as u64,
            bindings: report.bindings as u64,
            malformed_lines: report.malformed_lines as u64,
            skipped_records: report.skipped_records as u64,
            notes: report.notes as u64,
            processing_time_ms: elapsed_ms,
            status: "success".to_string(),
            error: None,
        }
    }

    fn unsuccessful(key: &str, path: &Path, status: &str, error: String, elapsed_ms: u64) -> Self {
        Self {
            key: key.to_string(),
            path: path.display().to_string(),
            sentences: 0,
            words: 0,
            annotations: 0,
            bindings: 0,
            malformed_lines: 0,
            skipped_records: 0,
            notes: 0,
            processing_time_ms: elapsed_ms,
            status: status.to_string(),
            error: Some(error),
        }
    }
}

/// Aggregate statistics for one corpus load
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct RunStats {
    /// Seconds since the Unix epoch
    pub run_start: u64,
    pub total_processing_time_ms: u64,
    pub documents_loaded: u64,
    pub documents_skipped: u64,
    pub documents_failed: u64,
    pub total_annotations: u64,
    pub total_bindings: u64,
    pub document_stats: Vec<DocumentStats>,
}

impl RunStats {
    fn start() -> Self {
        Self {
            run_start: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default(),
            ..Default::default()
        }
    }

    fn record(&mut self, stats: DocumentStats) {
        match stats.status.as_str() {
            "success" => {
                self.documents_loaded += 1;
                self.total_annotations += stats.annotations;
                self.total_bindings += stats.bindings;
            }
            "skipped" => self.documents_skipped += 1,
            _ => self.documents_failed += 1,
        }
        self.document_stats.push(stats);
    }

    fn finish(&mut self, started: Instant) {
        self.total_processing_time_ms = started.elapsed().as_millis() as u64;
        self.document_stats.sort_by(|a, b| a.path.cmp(&b.path));
    }

    /// Write the statistics as pretty JSON.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| StandoffError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

/// All documents of a corpus directory, keyed by their path below the root
/// without extension (`001`, `reviews/001`).
#[derive(Debug)]
pub struct Corpus {
    root: PathBuf,
    documents: BTreeMap<String, AnnotatedDocument>,
    stats: RunStats,
}

enum Outcome {
    Loaded(AnnotatedDocument, DocumentStats),
    Failed(StandoffError, DocumentStats),
}

/// Documents and statistics gathered while a load is in flight.
struct Collected {
    documents: BTreeMap<String, AnnotatedDocument>,
    stats: RunStats,
    fail_fast: bool,
}

impl Collected {
    fn new(fail_fast: bool) -> Self {
        Self {
            documents: BTreeMap::new(),
            stats: RunStats::start(),
            fail_fast,
        }
    }

    /// Record one outcome. A document whose key is already taken counts as failed.
    fn accept<F>(&mut self, outcome: Outcome, on_document: &mut F, total: usize) -> Result<()>
    where
        F: FnMut(&DocumentStats, usize),
    {
        let outcome = match outcome {
            Outcome::Loaded(document, entry) if self.documents.contains_key(document.key()) => {
                let error = StandoffError::DuplicateDocument {
                    key: document.key().to_string(),
                    path: PathBuf::from(&entry.path),
                };
                let entry = DocumentStats::unsuccessful(
                    document.key(),
                    Path::new(&entry.path),
                    "failed",
                    error.to_string(),
                    entry.processing_time_ms,
                );
                Outcome::Failed(error, entry)
            }
            other => other,
        };

        match outcome {
            Outcome::Loaded(document, entry) => {
                on_document(&entry, total);
                self.stats.record(entry);
                self.documents.insert(document.key().to_string(), document);
            }
            Outcome::Failed(error, entry) => {
                on_document(&entry, total);
                if self.fail_fast {
                    return Err(error);
                }
                warn!("Document failed (continuing): {}", error);
                self.stats.record(entry);
            }
        }
        Ok(())
    }
}

impl Corpus {
    /// Load every `.ann`/`.txt` pair under `root`.
    pub async fn load(root: impl AsRef<Path>, config: CorpusConfig) -> Result<Self> {
        Self::load_with_progress(root, config, |_, _| {}).await
    }

    /// Like [`Corpus::load`], calling `on_document(stats, total)` after each document.
    pub async fn load_with_progress<F>(
        root: impl AsRef<Path>,
        config: CorpusConfig,
        mut on_document: F,
    ) -> Result<Self>
    where
        F: FnMut(&DocumentStats, usize),
    {
        let root = root.as_ref();
        let started = Instant::now();
        let mut collected = Collected::new(config.fail_fast);

        let pairs = discovery::collect_pairs(root, config.discovery()).await?;
        let total = pairs.len();
        info!("Loading {} documents from {}", total, root.display());

        let (valid, missing): (Vec<PairValidation>, Vec<PairValidation>) =
            pairs.into_iter().partition(PairValidation::is_valid);
        for pair in missing {
            let stats_entry = DocumentStats::unsuccessful(
                &pair.key,
                &pair.ann_path,
                "skipped",
                pair.error.unwrap_or_default(),
                0,
            );
            on_document(&stats_entry, total);
            collected.stats.record(stats_entry);
        }

        let reader = config.reader.clone();
        let mut outcomes = stream::iter(valid)
            .map(|pair| {
                let reader = reader.clone();
                async move {
                    let started = Instant::now();
                    let result = load_document_with_key(&pair.key, &pair.ann_path, &reader).await;
                    let elapsed = started.elapsed().as_millis() as u64;
                    match result {
                        Ok(document) => {
                            let stats = DocumentStats::success(&document, &pair.ann_path, elapsed);
                            Outcome::Loaded(document, stats)
                        }
                        Err(e) => {
                            let stats = DocumentStats::unsuccessful(
                                &pair.key,
                                &pair.ann_path,
                                "failed",
                                e.to_string(),
                                elapsed,
                            );
                            Outcome::Failed(e, stats)
                        }
                    }
                }
            })
            .buffer_unordered(config.concurrency.max(1));

        while let Some(outcome) = outcomes.next().await {
            collected.accept(outcome, &mut on_document, total)?;
        }

        let Collected {
            documents,
            mut stats,
            ..
        } = collected;
        stats.finish(started);
        info!(
            "Corpus loaded: {} documents, {} skipped, {} failed in {}ms",
            stats.documents_loaded,
            stats.documents_skipped,
            stats.documents_failed,
            stats.total_processing_time_ms
        );

        Ok(Self {
            root: root.to_path_buf(),
            documents,
            stats,
        })
    }

    /// Load every `.xml` document previously written by [`Corpus::export_xml`].
    pub async fn load_xml(root: impl AsRef<Path>, config: CorpusConfig) -> Result<Self> {
        let root = root.as_ref();
        let started = Instant::now();
        let mut collected = Collected::new(config.fail_fast);
        let paths = discovery::find_files(root, XML_EXTENSION, config.recursive)?;
        let total = paths.len();

        for path in paths {
            let doc_started = Instant::now();
            let result = xml::import_xml(&path).await;
            let elapsed = doc_started.elapsed().as_millis() as u64;
            let outcome = match result {
                Ok(document) => {
                    let entry = DocumentStats::success(&document, &path, elapsed);
                    Outcome::Loaded(document, entry)
                }
                Err(e) => {
                    let key = discovery::relative_key(root, &path);
                    let entry =
                        DocumentStats::unsuccessful(&key, &path, "failed", e.to_string(), elapsed);
                    Outcome::Failed(e, entry)
                }
            };
            collected.accept(outcome, &mut |_: &DocumentStats, _: usize| {}, total)?;
        }

        let Collected {
            documents,
            mut stats,
            ..
        } = collected;
        stats.finish(started);
        info!(
            "Imported {} XML documents from {}",
            documents.len(),
            root.display()
        );

        Ok(Self {
            root: root.to_path_buf(),
            documents,
            stats,
        })
    }

    /// Write every document to `<dir>/<key>.xml`, creating directories as needed.
    ///
    /// Nested keys land in matching subdirectories, so re-import them with `recursive`.
    pub async fn export_xml(&self, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir).await?;

        let mut written = Vec::with_capacity(self.documents.len());
        for document in self.documents.values() {
            let path = dir.join(format!("{}.{}", document.key(), XML_EXTENSION));
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            xml::export_xml(document, &path).await?;
            written.push(path);
        }

        info!("Exported {} documents to {}", written.len(), dir.display());
        Ok(written)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn documents(&self) -> &BTreeMap<String, AnnotatedDocument> {
        &self.documents
    }

    pub fn document(&self, key: &str) -> Option<&AnnotatedDocument> {
        self.documents.get(key)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }
}
