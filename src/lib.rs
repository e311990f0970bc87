pub mod corpus;
pub mod discovery;
pub mod document;
pub mod error;
pub mod graph_builder;
pub mod reader;
pub mod record_reader;
pub mod span;
pub mod span_binder;
pub mod tokenizer;
pub mod xml;

// Re-export main types for convenient access
pub use corpus::{Corpus, CorpusConfig, DocumentStats, RunStats};
pub use document::{load_document, load_document_with_key, parse_document, AnnotatedDocument, ParseReport};
pub use error::{Result, StandoffError};
pub use graph_builder::{build_graph, Annotation, AnnotationGraph, AnnotationId};
pub use record_reader::{read_records, Category, RecordBuckets, TypedRecords};
pub use span::Span;
pub use span_binder::{bind_spans, BindingReport};
pub use tokenizer::{tokenize, Sentence, Word, WordRef};
