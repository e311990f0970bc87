//! A parsed document: sentences, words and the linked annotation graph.

use crate::discovery::{document_key, TEXT_EXTENSION};
use crate::error::{Result, StandoffError};
use crate::graph_builder::{build_graph, Annotation, AnnotationGraph};
use crate::reader::{AsyncFileReader, ReaderConfig};
use crate::record_reader::{read_records, TypedRecords};
use crate::span_binder::bind_spans;
use crate::tokenizer::{tokenize, Sentence, Word, WordRef};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::{debug, info};

/// Counters gathered while parsing one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParseReport {
    /// Lines skipped by the record reader.
    pub malformed_lines: usize,
    /// A/E/R records skipped for having the wrong shape.
    pub skipped_records: usize,
    /// `N` records read and left unresolved.
    pub notes: usize,
    /// Annotation-word pairs created by the span binder.
    pub bindings: usize,
    /// Annotations whose spans cover no word.
    pub unbound: Vec<String>,
}

/// One document of a corpus.
#[derive(Debug, Clone, Serialize)]
pub struct AnnotatedDocument {
    key: String,
    sentences: Vec<Sentence>,
    annotations: AnnotationGraph,
    text: String,
    hash: String,
    report: ParseReport,
}

impl AnnotatedDocument {
    pub fn new(
        key: impl Into<String>,
        sentences: Vec<Sentence>,
        annotations: AnnotationGraph,
        report: ParseReport,
    ) -> Self {
        let text = sentences
            .iter()
            .map(Sentence::text)
            .collect::<Vec<_>>()
            .join("\n");
        let hash = content_hash(&text);

        Self {
            key: key.into(),
            sentences,
            annotations,
            text,
            hash,
            report,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn sentences(&self) -> &[Sentence] {
        &self.sentences
    }

    pub fn annotations(&self) -> &AnnotationGraph {
        &self.annotations
    }

    pub fn annotation(&self, id: &str) -> Option<&Annotation> {
        self.annotations.get(id)
    }

    /// Text rebuilt from the tokens: words joined by one space, sentences by `\n`.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Hex SHA-256 of [`AnnotatedDocument::text`], for comparing documents across corpora.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn report(&self) -> &ParseReport {
        &self.report
    }

    pub fn word(&self, word_ref: WordRef) -> Option<&Word> {
        self.sentences
            .get(word_ref.sentence)
            .and_then(|sentence| sentence.word(word_ref.word))
    }

    pub fn word_count(&self) -> usize {
        self.sentences.iter().map(|s| s.words().len()).sum()
    }

    /// Words bound to the annotation `id`, in binding order.
    pub fn words_of(&self, id: &str) -> Vec<&Word> {
        self.annotation(id)
            .map(|annotation| {
                annotation
                    .words()
                    .iter()
                    .filter_map(|&word_ref| self.word(word_ref))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Annotations bound to the word at `word_ref`.
    pub fn annotations_of(&self, word_ref: WordRef) -> Vec<&Annotation> {
        self.word(word_ref)
            .map(|word| {
                word.annotations()
                    .iter()
                    .filter_map(|id| self.annotation(id))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Hex SHA-256 digest of `text`.
pub fn content_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Run the whole engine on in-memory inputs.
///
/// Record reading and tokenization are independent; the graph is fully built before
/// the span binder runs. On any fatal error nothing is returned for the document.
pub fn parse_document(key: &str, text: &str, annotation_source: &str) -> Result<AnnotatedDocument> {
    let buckets = read_records(annotation_source);
    let records = TypedRecords::from_buckets(&buckets)?;
    let mut graph = build_graph(&records)?;

    let mut sentences = tokenize(text);
    let binding = bind_spans(&mut graph, &mut sentences);

    let report = ParseReport {
        malformed_lines: buckets.malformed.len(),
        skipped_records: records.skipped.len(),
        notes: records.notes,
        bindings: binding.bindings,
        unbound: binding.unbound,
    };
    debug!("Parsed document {}: {:?}", key, report);

    Ok(AnnotatedDocument::new(key, sentences, graph, report))
}

/// Read an annotation file and its sibling `.txt`, then parse them.
///
/// The document is keyed by the file stem. Errors name the annotation file.
pub async fn load_document(ann_path: &Path, config: &ReaderConfig) -> Result<AnnotatedDocument> {
    load_document_with_key(&document_key(ann_path), ann_path, config).await
}

/// Like [`load_document`], under a caller-chosen key.
pub async fn load_document_with_key(
    key: &str,
    ann_path: &Path,
    config: &ReaderConfig,
) -> Result<AnnotatedDocument> {
    let txt_path = ann_path.with_extension(TEXT_EXTENSION);
    let reader = AsyncFileReader::new(config.clone());

    let (annotation_source, _) = reader
        .read_file(ann_path)
        .await
        .map_err(|e| e.in_file(ann_path))?;
    let (text, _) = reader.read_file(&txt_path).await.map_err(|e| match e {
        StandoffError::Io(io) if io.kind() == std::io::ErrorKind::NotFound => {
            StandoffError::MissingCompanion(ann_path.to_path_buf())
        }
        other => other.in_file(&txt_path),
    })?;

    let document =
        parse_document(key, &text, &annotation_source).map_err(|e| e.in_file(ann_path))?;

    info!(
        "Loaded document {}: {} sentences, {} annotations",
        key,
        document.sentences().len(),
        document.annotations().len()
    );
    Ok(document)
}
