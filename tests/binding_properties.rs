// Properties of word binding that must hold for any document

mod integration;

use bratlink::document::{parse_document, AnnotatedDocument};
use bratlink::tokenizer::WordRef;
use integration::fixtures::*;

fn overlaps(word_start: usize, word_end: usize, start: usize, end: usize) -> bool {
    word_start < end && start < word_end
}

fn assert_binding_properties(doc: &AnnotatedDocument) {
    for ann in doc.annotations().iter() {
        for &word_ref in ann.words() {
            let word = doc.word(word_ref).expect("bound word should exist");
            assert!(
                ann.spans()
                    .iter()
                    .any(|s| overlaps(word.start(), word.end(), s.start, s.end)),
                "word {} bound to {} lies outside its spans",
                word_ref,
                ann.id()
            );
            assert!(
                word.annotations().iter().any(|id| id == ann.id()),
                "word {} does not point back to {}",
                word_ref,
                ann.id()
            );
        }
    }

    for sentence in doc.sentences() {
        for word in sentence.words() {
            for id in word.annotations() {
                let ann = doc.annotation(id).expect("bound annotation should exist");
                assert!(
                    ann.words().contains(&word.word_ref()),
                    "annotation {} does not point back to {}",
                    id,
                    word.word_ref()
                );
            }
        }
    }
}

fn assert_every_overlap_is_bound(doc: &AnnotatedDocument) {
    for ann in doc.annotations().iter() {
        for sentence in doc.sentences() {
            for word in sentence.words() {
                let expected = ann
                    .spans()
                    .iter()
                    .any(|s| overlaps(word.start(), word.end(), s.start, s.end));
                assert_eq!(
                    ann.words().contains(&word.word_ref()),
                    expected,
                    "annotation {} and word {}",
                    ann.id(),
                    word.word_ref()
                );
            }
        }
    }
}

#[test]
fn test_review_bindings() {
    let doc = parse_document("review", REVIEW_TEXT, REVIEW_ANN).unwrap();
    assert_binding_properties(&doc);
    assert_every_overlap_is_bound(&doc);
}

#[test]
fn test_discontinuous_bindings() {
    let doc = parse_document("d", DISCONTINUOUS_TEXT, DISCONTINUOUS_ANN).unwrap();
    assert_binding_properties(&doc);
    assert_every_overlap_is_bound(&doc);
}

#[test]
fn test_every_span_position_over_a_sentence() {
    let text = "one two three\nfour five";
    let len = text.chars().count();

    let mut ann = String::new();
    let mut id = 1;
    for start in 0..len {
        for end in start + 1..=len {
            ann.push_str(&format!("T{id}\tSpan {start} {end}\tx\n"));
            id += 1;
        }
    }

    let doc = parse_document("grid", text, &ann).unwrap();
    assert_eq!(doc.annotations().len(), id - 1);
    assert_binding_properties(&doc);
    assert_every_overlap_is_bound(&doc);
}

#[test]
fn test_newline_only_span_binds_nothing() {
    let doc = parse_document("d", "one\ntwo", "T1\tGap 3 4\t\n").unwrap();
    assert!(doc.annotation("1").unwrap().words().is_empty());
    assert_eq!(doc.report().unbound, vec!["1".to_string()]);
    assert!(doc.word(WordRef::new(0, 0)).unwrap().annotations().is_empty());
}
