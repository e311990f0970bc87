use crate::error::{Result, StandoffError};
use futures::stream::{self, Stream, StreamExt};
use glob::glob;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Extension of standoff annotation files.
pub const ANNOTATION_EXTENSION: &str = "ann";
/// Extension of the raw text companion.
pub const TEXT_EXTENSION: &str = "txt";
/// Extension of exported documents.
pub const XML_EXTENSION: &str = "xml";

/// Configuration for file discovery behavior
#[derive(Debug, Clone, Default)]
pub struct DiscoveryConfig {
    /// Whether to fail fast on first error or continue processing
    pub fail_fast: bool,
    /// Descend into subdirectories instead of scanning only the top level
    pub recursive: bool,
}

/// An annotation file and its text companion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairValidation {
    /// Document key: the annotation file name without extension.
    pub key: String,
    pub ann_path: PathBuf,
    pub txt_path: PathBuf,
    pub error: Option<String>,
}

impl PairValidation {
    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }
}

/// Document key for a path: `corpus/001.ann` becomes `001`.
pub fn document_key(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Document key for a path below `root`: `root/a/b/001.ann` becomes `a/b/001`.
///
/// Keys of top-level files equal [`document_key`]; nested files keep their
/// directories so that same-named files in different folders stay distinct.
pub fn relative_key(root: &Path, path: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(relative) => relative
            .with_extension("")
            .components()
            .map(|component| component.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => document_key(path),
    }
}

/// List files ending in `.{extension}` under `root_dir`, sorted by path.
pub fn find_files(root_dir: &Path, extension: &str, recursive: bool) -> Result<Vec<PathBuf>> {
    if !root_dir.is_dir() {
        return Err(StandoffError::NotADirectory(root_dir.to_path_buf()));
    }

    let mut paths = if recursive {
        WalkDir::new(root_dir)
            .follow_links(false)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| path.extension().is_some_and(|ext| ext == extension))
            .collect::<Vec<_>>()
    } else {
        let pattern = format!(
            "{}/*.{}",
            glob::Pattern::escape(&root_dir.display().to_string()),
            extension
        );
        debug!("Starting file discovery with pattern: {}", pattern);

        glob(&pattern)
            .map_err(|e| StandoffError::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, e)))?
            .filter_map(|entry| match entry {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!("Glob iteration error: {}", e);
                    None
                }
            })
            .collect::<Vec<_>>()
    };

    paths.sort();
    Ok(paths)
}

/// Discovers `.ann` files under `root_dir` and pairs each with its `.txt` companion.
///
/// A missing companion yields a `PairValidation` with an error, or an `Err` item
/// when `fail_fast` is set, after which the stream ends.
pub fn discover_pairs(
    root_dir: impl AsRef<Path>,
    config: DiscoveryConfig,
) -> Result<impl Stream<Item = Result<PairValidation>>> {
    let root_path = root_dir.as_ref();
    let paths = find_files(root_path, ANNOTATION_EXTENSION, config.recursive)?;
    info!(
        "File discovery initialized for root: {} ({} annotation files)",
        root_path.display(),
        paths.len()
    );

    let fail_fast = config.fail_fast;
    let root = root_path.to_path_buf();
    let pairs = stream::iter(paths)
        .then(move |ann_path| {
            let key = relative_key(&root, &ann_path);
            validate_pair(key, ann_path)
        })
        .scan(false, move |failed, validation| {
            let item = if *failed {
                None
            } else if fail_fast && !validation.is_valid() {
                *failed = true;
                Some(Err(StandoffError::MissingCompanion(validation.ann_path)))
            } else {
                Some(Ok(validation))
            };
            futures::future::ready(item)
        });

    Ok(pairs)
}

async fn validate_pair(key: String, ann_path: PathBuf) -> PairValidation {
    let txt_path = ann_path.with_extension(TEXT_EXTENSION);

    let error = match fs::metadata(&txt_path).await {
        Ok(metadata) if metadata.is_file() => None,
        Ok(_) => Some(format!("Path is not a file: {}", txt_path.display())),
        Err(e) => Some(format!("Cannot access file {}: {}", txt_path.display(), e)),
    };

    if let Some(ref error) = error {
        warn!("{}", error);
    } else {
        debug!("Found pair: {}", ann_path.display());
    }

    PairValidation {
        key,
        ann_path,
        txt_path,
        error,
    }
}

/// Collect all discovered pairs into a Vec for easier processing
pub async fn collect_pairs(
    root_dir: impl AsRef<Path>,
    config: DiscoveryConfig,
) -> Result<Vec<PairValidation>> {
    let mut pairs = Vec::new();
    let mut stream = Box::pin(discover_pairs(root_dir, config)?);

    while let Some(result) = stream.next().await {
        pairs.push(result?);
    }

    let valid_count = pairs.iter().filter(|p| p.is_valid()).count();
    let invalid_count = pairs.len() - valid_count;
    if invalid_count > 0 {
        warn!("Found {} annotation files without text", invalid_count);
    }
    info!(
        "File discovery summary: {} valid, {} invalid",
        valid_count, invalid_count
    );

    Ok(pairs)
}
