//! Whitespace tokenizer producing sentences and words with absolute character offsets.
//!
//! Sentences are lines. Offsets assume words are separated by exactly one space and
//! sentences by exactly one `\n`; other layouts (tabs, runs of spaces, `\r\n`) shift
//! word offsets and are deliberately not corrected, so that offsets agree with the
//! annotation tools that produced the corpus.

use crate::graph_builder::AnnotationId;
use crate::span::Span;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Position of a word: sentence index and word index within the sentence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WordRef {
    pub sentence: usize,
    pub word: usize,
}

impl WordRef {
    pub fn new(sentence: usize, word: usize) -> Self {
        Self { sentence, word }
    }
}

impl fmt::Display for WordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s.{}.w.{}", self.sentence, self.word)
    }
}

impl FromStr for WordRef {
    type Err = String;

    /// Parses the `s.<sentence>.w.<word>` form produced by `Display`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('.').collect();
        match parts.as_slice() {
            ["s", sentence, "w", word] => Ok(WordRef {
                sentence: sentence.parse().map_err(|_| format!("bad word id {s:?}"))?,
                word: word.parse().map_err(|_| format!("bad word id {s:?}"))?,
            }),
            _ => Err(format!("bad word id {s:?}")),
        }
    }
}

/// A whitespace-delimited token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Word {
    index: usize,
    sentence: usize,
    form: String,
    start: usize,
    end: usize,
    annotations: Vec<AnnotationId>,
}

impl Word {
    pub fn new(index: usize, sentence: usize, form: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            index,
            sentence,
            form: form.into(),
            start,
            end,
            annotations: Vec::new(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn sentence(&self) -> usize {
        self.sentence
    }

    pub fn form(&self) -> &str {
        &self.form
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn span(&self) -> Span {
        Span::new(self.start, self.end)
    }

    pub fn word_ref(&self) -> WordRef {
        WordRef::new(self.sentence, self.index)
    }

    /// Annotations bound to this word by the span binder.
    pub fn annotations(&self) -> &[AnnotationId] {
        &self.annotations
    }

    pub(crate) fn bind_annotation(&mut self, id: AnnotationId) {
        self.annotations.push(id);
    }
}

/// One line of the source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sentence {
    index: usize,
    start: usize,
    end: usize,
    words: Vec<Word>,
}

impl Sentence {
    /// Tokenize `line`, which begins at character offset `start` of the document.
    pub fn new(index: usize, line: &str, start: usize) -> Self {
        let mut words = Vec::new();
        let mut offset = start;

        for (word_index, form) in line.split_whitespace().enumerate() {
            let end = offset + form.chars().count();
            words.push(Word::new(word_index, index, form, offset, end));
            offset = end + 1;
        }

        Self {
            index,
            start,
            end: start + line.chars().count(),
            words,
        }
    }

    /// Rebuild a sentence from previously computed words.
    pub fn from_words(index: usize, start: usize, end: usize, words: Vec<Word>) -> Self {
        Self {
            index,
            start,
            end,
            words,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn words(&self) -> &[Word] {
        &self.words
    }

    pub fn word(&self, index: usize) -> Option<&Word> {
        self.words.get(index)
    }

    /// Words sharing at least one character with `span`.
    pub fn words_in_span(&self, span: Span) -> impl Iterator<Item = &Word> {
        self.words
            .iter()
            .filter(move |word| span.covers(word.start, word.end))
    }

    /// Words joined by single spaces.
    pub fn text(&self) -> String {
        self.words
            .iter()
            .map(Word::form)
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub(crate) fn word_mut(&mut self, index: usize) -> Option<&mut Word> {
        self.words.get_mut(index)
    }
}

/// Split a document into sentences (lines) and words.
pub fn tokenize(text: &str) -> Vec<Sentence> {
    let mut sentences = Vec::new();
    let mut offset = 0usize;

    for (index, line) in text.lines().enumerate() {
        sentences.push(Sentence::new(index, line, offset));
        offset += line.chars().count() + 1;
    }

    debug!(
        "Tokenized {} sentences, {} words",
        sentences.len(),
        sentences.iter().map(|s| s.words.len()).sum::<usize>()
    );
    sentences
}
