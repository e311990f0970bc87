//! Binds annotation spans to the words they cover, in both directions.
//!
//! [`bind_spans`] is the only writer of `Annotation::words` and `Word::annotations`,
//! so the two lists always mirror each other.

use crate::graph_builder::{AnnotationGraph, AnnotationId};
use crate::tokenizer::{Sentence, Word, WordRef};
use serde::Serialize;
use tracing::{debug, warn};

/// Outcome of one binding pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BindingReport {
    /// Number of annotation-word pairs created.
    pub bindings: usize,
    /// Annotations whose spans touched no word.
    pub unbound: Vec<AnnotationId>,
}

/// Bind every span of every annotation to every overlapping word of every sentence.
///
/// All sentences are scanned for each span because the spans of one discontinuous
/// annotation may fall in different sentences. A word overlapped by two spans of the
/// same annotation is bound twice.
pub fn bind_spans(graph: &mut AnnotationGraph, sentences: &mut [Sentence]) -> BindingReport {
    let mut report = BindingReport::default();

    for annotation in graph.iter_mut() {
        let mut matches: Vec<WordRef> = Vec::new();
        for &span in annotation.spans() {
            for sentence in sentences.iter() {
                matches.extend(sentence.words_in_span(span).map(Word::word_ref));
            }
        }

        if matches.is_empty() {
            warn!(
                "Annotation {} ({:?}) covers no words",
                annotation.id(),
                annotation.representation()
            );
            report.unbound.push(annotation.id().to_string());
            continue;
        }

        for word_ref in matches {
            if let Some(word) = sentences
                .get_mut(word_ref.sentence)
                .and_then(|sentence| sentence.word_mut(word_ref.word))
            {
                word.bind_annotation(annotation.id().to_string());
                annotation.bind_word(word_ref);
                report.bindings += 1;
            }
        }
    }

    debug!(
        "Bound {} annotation-word pairs, {} annotations unbound",
        report.bindings,
        report.unbound.len()
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph_builder::Annotation;
    use crate::span::Span;
    use crate::tokenizer::tokenize;

    fn graph_of(annotations: Vec<Annotation>) -> AnnotationGraph {
        let mut graph = AnnotationGraph::new();
        for annotation in annotations {
            graph.insert(annotation);
        }
        graph
    }

    #[test]
    fn test_binding_is_bidirectional() {
        let mut sentences = tokenize("hello big world");
        let mut graph = graph_of(vec![Annotation::new(
            "1",
            "big world",
            vec![Span::new(6, 15)],
            ["Thing"],
        )]);

        let report = bind_spans(&mut graph, &mut sentences);

        assert_eq!(report.bindings, 2);
        assert_eq!(
            graph.get("1").unwrap().words(),
            &[WordRef::new(0, 1), WordRef::new(0, 2)]
        );
        assert!(sentences[0].words()[0].annotations().is_empty());
        assert_eq!(sentences[0].words()[1].annotations(), &["1".to_string()]);
        assert_eq!(sentences[0].words()[2].annotations(), &["1".to_string()]);
    }

    #[test]
    fn test_discontinuous_spans_across_sentences() {
        let mut sentences = tokenize("hello world\nsecond line");
        let mut graph = graph_of(vec![Annotation::new(
            "1",
            "hello line",
            vec![Span::new(0, 5), Span::new(19, 23)],
            ["Thing"],
        )]);

        bind_spans(&mut graph, &mut sentences);

        assert_eq!(
            graph.get("1").unwrap().words(),
            &[WordRef::new(0, 0), WordRef::new(1, 1)]
        );
    }

    #[test]
    fn test_partial_word_overlap_binds_word() {
        let mut sentences = tokenize("unhappy customer");
        let mut graph = graph_of(vec![Annotation::new(
            "1",
            "happy",
            vec![Span::new(2, 7)],
            ["Sentiment"],
        )]);

        bind_spans(&mut graph, &mut sentences);
        assert_eq!(graph.get("1").unwrap().words(), &[WordRef::new(0, 0)]);
    }

    #[test]
    fn test_word_shared_by_many_annotations() {
        let mut sentences = tokenize("great phone");
        let mut graph = graph_of(vec![
            Annotation::new("1", "great", vec![Span::new(0, 5)], ["Positive"]),
            Annotation::new("2", "great phone", vec![Span::new(0, 11)], ["Target"]),
        ]);

        bind_spans(&mut graph, &mut sentences);
        assert_eq!(
            sentences[0].words()[0].annotations(),
            &["1".to_string(), "2".to_string()]
        );
    }

    #[test]
    fn test_out_of_range_annotation_is_unbound() {
        let mut sentences = tokenize("short");
        let mut graph = graph_of(vec![Annotation::new(
            "9",
            "gone",
            vec![Span::new(40, 44)],
            ["Thing"],
        )]);

        let report = bind_spans(&mut graph, &mut sentences);
        assert_eq!(report.bindings, 0);
        assert_eq!(report.unbound, vec!["9".to_string()]);
        assert!(graph.get("9").unwrap().words().is_empty());
    }
}
