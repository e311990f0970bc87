use crate::error::{Result, StandoffError};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, BufReader};
use tracing::{debug, info, warn};

/// Configuration for file reading behavior
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Buffer size for async reading (default: 8KB)
    pub buffer_size: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self { buffer_size: 8192 }
    }
}

/// Statistics for one file read
#[derive(Debug, Clone)]
pub struct ReadStats {
    pub file_path: String,
    pub bytes_read: u64,
    pub chars_read: u64,
    pub duration_ms: u64,
}

/// Async reader that acquires a whole file at once: open, read fully, close.
pub struct AsyncFileReader {
    config: ReaderConfig,
}

impl AsyncFileReader {
    pub fn new(config: ReaderConfig) -> Self {
        Self { config }
    }

    /// Read a UTF-8 file into memory, byte for byte.
    ///
    /// Line endings are kept as they are; character offsets in annotation files
    /// count them.
    pub async fn read_file<P: AsRef<Path>>(&self, file_path: P) -> Result<(String, ReadStats)> {
        let path = file_path.as_ref();
        let start_time = std::time::Instant::now();

        debug!("Starting async read of file: {}", path.display());

        let file = File::open(path).await.map_err(|e| {
            warn!("Failed to open file {}: {}", path.display(), e);
            StandoffError::Io(e)
        })?;

        let mut reader = BufReader::with_capacity(self.config.buffer_size, file);
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).await?;
        drop(reader);

        let content = String::from_utf8(bytes).map_err(|e| {
            let reason = e.utf8_error().to_string();
            warn!("UTF-8 decoding error in {}: {}", path.display(), reason);
            StandoffError::Utf8 {
                path: path.to_path_buf(),
                reason,
            }
        })?;

        let stats = ReadStats {
            file_path: path.display().to_string(),
            bytes_read: content.len() as u64,
            chars_read: content.chars().count() as u64,
            duration_ms: start_time.elapsed().as_millis() as u64,
        };

        info!(
            "Read {}: {} bytes in {}ms",
            path.display(),
            stats.bytes_read,
            stats.duration_ms
        );
        Ok((content, stats))
    }
}

/// Convenience function for reading a single file with default configuration
pub async fn read_file_async<P: AsRef<Path>>(file_path: P) -> Result<String> {
    let reader = AsyncFileReader::new(ReaderConfig::default());
    let (content, _stats) = reader.read_file(file_path).await?;
    Ok(content)
}
