//! XML persistence for parsed documents.
//!
//! ```xml
//! <document source="001" hash="...">
//!   <sentences>
//!     <sentence id="s.0" start="0" end="11">
//!       <word id="s.0.w.0" start="0" end="5">hello</word>
//!     </sentence>
//!   </sentences>
//!   <annotations>
//!     <annotation id="ann1" words="s.0.w.0" repr="hello" spans="0|5"
//!                 label.Positive="" label.Target="|" link.Cause="ann2"/>
//!   </annotations>
//! </document>
//! ```
//!
//! Label values terminate every valency with `|`, so `""` is a label with no
//! valencies and `"|"` is a label with one empty valency. A `|` or `\` inside a
//! valency is preceded by `\`.

use crate::document::{AnnotatedDocument, ParseReport};
use crate::error::{Result, StandoffError};
use crate::graph_builder::{Annotation, AnnotationGraph};
use crate::span::Span;
use crate::span_binder::bind_spans;
use crate::tokenizer::{Sentence, Word, WordRef};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::path::Path;
use tracing::{debug, info, warn};

const ANNOTATION_PREFIX: &str = "ann";
const LABEL_PREFIX: &str = "label.";
const LINK_PREFIX: &str = "link.";

const VALENCY_TERMINATOR: char = '|';
const VALENCY_ESCAPE: char = '\\';

fn encode_valencies(valencies: &[String]) -> String {
    let mut encoded = String::new();
    for valency in valencies {
        for c in valency.chars() {
            if c == VALENCY_TERMINATOR || c == VALENCY_ESCAPE {
                encoded.push(VALENCY_ESCAPE);
            }
            encoded.push(c);
        }
        encoded.push(VALENCY_TERMINATOR);
    }
    encoded
}

fn decode_valencies(value: &str) -> Vec<String> {
    let mut valencies = Vec::new();
    let mut current = String::new();
    let mut chars = value.chars();

    while let Some(c) = chars.next() {
        match c {
            VALENCY_ESCAPE => current.extend(chars.next()),
            VALENCY_TERMINATOR => valencies.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    // unterminated trailing value
    if !current.is_empty() {
        valencies.push(current);
    }
    valencies
}

fn encode_spans(spans: &[Span]) -> String {
    spans
        .iter()
        .map(|span| format!("{}|{}", span.start, span.end))
        .collect::<Vec<_>>()
        .join(",")
}

fn decode_spans(record: &str, value: &str) -> Result<Vec<Span>> {
    value
        .split(',')
        .map(|pair| {
            let span_error = |reason: &str| StandoffError::SpanParse {
                record: record.to_string(),
                span: pair.to_string(),
                reason: reason.to_string(),
            };
            let (start, end) = pair
                .split_once('|')
                .ok_or_else(|| span_error("expected start|end"))?;
            let start = start
                .parse::<usize>()
                .map_err(|_| span_error("start is not an integer"))?;
            let end = end
                .parse::<usize>()
                .map_err(|_| span_error("end is not an integer"))?;
            if start >= end {
                return Err(span_error("start must be before end"));
            }
            Ok(Span::new(start, end))
        })
        .collect()
}

/// Render a document as an XML string.
pub fn to_xml_string(document: &AnnotatedDocument) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(StandoffError::xml)?;

    let mut root = BytesStart::new("document");
    root.push_attribute(("source", document.key()));
    root.push_attribute(("hash", document.hash()));
    writer
        .write_event(Event::Start(root))
        .map_err(StandoffError::xml)?;

    write_sentences(&mut writer, document.sentences())?;
    write_annotations(&mut writer, document.annotations())?;

    writer
        .write_event(Event::End(BytesEnd::new("document")))
        .map_err(StandoffError::xml)?;

    String::from_utf8(writer.into_inner()).map_err(StandoffError::xml)
}

fn write_sentences(writer: &mut Writer<Vec<u8>>, sentences: &[Sentence]) -> Result<()> {
    writer
        .write_event(Event::Start(BytesStart::new("sentences")))
        .map_err(StandoffError::xml)?;

    for sentence in sentences {
        let id = format!("s.{}", sentence.index());
        let start = sentence.start().to_string();
        let end = sentence.end().to_string();

        let mut element = BytesStart::new("sentence");
        element.push_attribute(("id", id.as_str()));
        element.push_attribute(("start", start.as_str()));
        element.push_attribute(("end", end.as_str()));
        writer
            .write_event(Event::Start(element))
            .map_err(StandoffError::xml)?;

        for word in sentence.words() {
            let id = word.word_ref().to_string();
            let start = word.start().to_string();
            let end = word.end().to_string();

            let mut element = BytesStart::new("word");
            element.push_attribute(("id", id.as_str()));
            element.push_attribute(("start", start.as_str()));
            element.push_attribute(("end", end.as_str()));
            writer
                .write_event(Event::Start(element))
                .map_err(StandoffError::xml)?;
            writer
                .write_event(Event::Text(BytesText::new(word.form())))
                .map_err(StandoffError::xml)?;
            writer
                .write_event(Event::End(BytesEnd::new("word")))
                .map_err(StandoffError::xml)?;
        }

        writer
            .write_event(Event::End(BytesEnd::new("sentence")))
            .map_err(StandoffError::xml)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("sentences")))
        .map_err(StandoffError::xml)?;
    Ok(())
}

fn write_annotations(writer: &mut Writer<Vec<u8>>, graph: &AnnotationGraph) -> Result<()> {
    writer
        .write_event(Event::Start(BytesStart::new("annotations")))
        .map_err(StandoffError::xml)?;

    for annotation in graph.iter() {
        let mut attributes: Vec<(String, String)> = vec![
            (
                "id".to_string(),
                format!("{ANNOTATION_PREFIX}{}", annotation.id()),
            ),
            (
                "words".to_string(),
                annotation
                    .words()
                    .iter()
                    .map(WordRef::to_string)
                    .collect::<Vec<_>>()
                    .join(" "),
            ),
            ("repr".to_string(), annotation.representation().to_string()),
            ("spans".to_string(), encode_spans(annotation.spans())),
        ];

        for (label, valencies) in annotation.labels() {
            attributes.push((format!("{LABEL_PREFIX}{label}"), encode_valencies(valencies)));
        }
        for (link_type, sources) in annotation.links() {
            let value = sources
                .iter()
                .map(|id| format!("{ANNOTATION_PREFIX}{id}"))
                .collect::<Vec<_>>()
                .join(" ");
            attributes.push((format!("{LINK_PREFIX}{link_type}"), value));
        }

        let mut element = BytesStart::new("annotation");
        for (key, value) in &attributes {
            element.push_attribute((key.as_str(), value.as_str()));
        }
        writer
            .write_event(Event::Empty(element))
            .map_err(StandoffError::xml)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("annotations")))
        .map_err(StandoffError::xml)?;
    Ok(())
}

fn attributes(element: &BytesStart) -> Result<Vec<(String, String)>> {
    element
        .attributes()
        .map(|attribute| {
            let attribute = attribute.map_err(StandoffError::xml)?;
            let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
            let value = attribute
                .unescape_value()
                .map_err(StandoffError::xml)?
                .into_owned();
            Ok((key, value))
        })
        .collect()
}

fn attribute<'a>(attributes: &'a [(String, String)], name: &str, element: &str) -> Result<&'a str> {
    attributes
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
        .ok_or_else(|| StandoffError::xml(format!("<{element}> is missing attribute {name}")))
}

fn offset(attributes: &[(String, String)], name: &str, element: &str) -> Result<usize> {
    let value = attribute(attributes, name, element)?;
    value
        .parse()
        .map_err(|_| StandoffError::xml(format!("<{element}> {name}={value:?} is not an offset")))
}

fn strip_annotation_prefix(id: &str) -> Result<&str> {
    id.strip_prefix(ANNOTATION_PREFIX)
        .ok_or_else(|| StandoffError::xml(format!("annotation id {id:?} lacks the {ANNOTATION_PREFIX} prefix")))
}

struct PendingSentence {
    index: usize,
    start: usize,
    end: usize,
    words: Vec<Word>,
}

struct PendingWord {
    index: usize,
    start: usize,
    end: usize,
    form: String,
}

/// Build a document from XML produced by [`to_xml_string`].
///
/// Words are restored from their stored offsets and re-bound through the span
/// binder; labels and links are restored after every annotation exists.
pub fn from_xml_str(xml: &str) -> Result<AnnotatedDocument> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut key = String::new();
    let mut stored_hash = None;
    let mut sentences: Vec<Sentence> = Vec::new();
    let mut sentence: Option<PendingSentence> = None;
    let mut word: Option<PendingWord> = None;
    let mut annotation_elements: Vec<Vec<(String, String)>> = Vec::new();

    loop {
        let event = reader.read_event().map_err(StandoffError::xml)?;
        let (element, is_empty) = match event {
            Event::Start(element) => (element, false),
            Event::Empty(element) => (element, true),
            Event::Text(text) => {
                if let Some(word) = word.as_mut() {
                    word.form.push_str(&text.unescape().map_err(StandoffError::xml)?);
                }
                continue;
            }
            Event::End(end) => {
                close_element(end.name().as_ref(), &mut sentences, &mut sentence, &mut word)?;
                continue;
            }
            Event::Eof => break,
            _ => continue,
        };

        let name = element.name().as_ref().to_vec();
        let attrs = attributes(&element)?;

        match name.as_slice() {
            b"document" => {
                key = attribute(&attrs, "source", "document")?.to_string();
                stored_hash = attrs
                    .iter()
                    .find(|(k, _)| k == "hash")
                    .map(|(_, v)| v.clone());
            }
            b"sentence" => {
                let id = attribute(&attrs, "id", "sentence")?;
                let index = id
                    .strip_prefix("s.")
                    .and_then(|i| i.parse().ok())
                    .ok_or_else(|| StandoffError::xml(format!("bad sentence id {id:?}")))?;
                sentence = Some(PendingSentence {
                    index,
                    start: offset(&attrs, "start", "sentence")?,
                    end: offset(&attrs, "end", "sentence")?,
                    words: Vec::new(),
                });
            }
            b"word" => {
                let id = attribute(&attrs, "id", "word")?;
                let word_ref: WordRef = id.parse().map_err(StandoffError::xml)?;
                word = Some(PendingWord {
                    index: word_ref.word,
                    start: offset(&attrs, "start", "word")?,
                    end: offset(&attrs, "end", "word")?,
                    form: String::new(),
                });
            }
            b"annotation" => annotation_elements.push(attrs),
            _ => {}
        }

        if is_empty {
            close_element(&name, &mut sentences, &mut sentence, &mut word)?;
        }
    }

    let mut graph = AnnotationGraph::new();
    for attrs in &annotation_elements {
        let id = strip_annotation_prefix(attribute(attrs, "id", "annotation")?)?;
        let spans = decode_spans(id, attribute(attrs, "spans", "annotation")?)?;
        let repr = attribute(attrs, "repr", "annotation")?;
        let mut annotation = Annotation::new(id, repr, spans, Vec::<String>::new());

        for (name, value) in attrs {
            if let Some(label) = name.strip_prefix(LABEL_PREFIX) {
                annotation.ensure_label(label);
                for valency in decode_valencies(value) {
                    annotation.push_valency(label, valency);
                }
            }
        }

        if !graph.insert(annotation) {
            warn!("Duplicate annotation {} in XML, keeping the first", id);
        }
    }

    for attrs in &annotation_elements {
        let id = strip_annotation_prefix(attribute(attrs, "id", "annotation")?)?;
        let record = format!("{ANNOTATION_PREFIX}{id}");

        for (name, value) in attrs {
            let Some(link_type) = name.strip_prefix(LINK_PREFIX) else {
                continue;
            };
            for source in value.split_whitespace() {
                let source = strip_annotation_prefix(source)?;
                if !graph.contains(source) {
                    return Err(StandoffError::missing(&record, format!("{ANNOTATION_PREFIX}{source}")));
                }
                if let Some(annotation) = graph.get_mut(id) {
                    annotation.push_link(link_type, source.to_string());
                }
            }
        }
    }

    let binding = bind_spans(&mut graph, &mut sentences);
    let report = ParseReport {
        bindings: binding.bindings,
        unbound: binding.unbound,
        ..Default::default()
    };

    let document = AnnotatedDocument::new(key, sentences, graph, report);
    if let Some(stored) = stored_hash {
        if stored != document.hash() {
            warn!(
                "Document {} hash mismatch: stored {}, computed {}",
                document.key(),
                stored,
                document.hash()
            );
        }
    }

    debug!(
        "Imported document {}: {} sentences, {} annotations",
        document.key(),
        document.sentences().len(),
        document.annotations().len()
    );
    Ok(document)
}

fn close_element(
    name: &[u8],
    sentences: &mut Vec<Sentence>,
    sentence: &mut Option<PendingSentence>,
    word: &mut Option<PendingWord>,
) -> Result<()> {
    match name {
        b"word" => {
            let finished = word
                .take()
                .ok_or_else(|| StandoffError::xml("</word> without <word>"))?;
            let pending = sentence
                .as_mut()
                .ok_or_else(|| StandoffError::xml("<word> outside <sentence>"))?;
            pending.words.push(Word::new(
                finished.index,
                pending.index,
                finished.form,
                finished.start,
                finished.end,
            ));
        }
        b"sentence" => {
            let finished = sentence
                .take()
                .ok_or_else(|| StandoffError::xml("</sentence> without <sentence>"))?;
            sentences.push(Sentence::from_words(
                finished.index,
                finished.start,
                finished.end,
                finished.words,
            ));
        }
        _ => {}
    }
    Ok(())
}

/// Write `document` to `path` as XML.
pub async fn export_xml(document: &AnnotatedDocument, path: &Path) -> Result<()> {
    let xml = to_xml_string(document)?;
    tokio::fs::write(path, xml)
        .await
        .map_err(|e| StandoffError::Io(e).in_file(path))?;
    info!("Exported document {} to {}", document.key(), path.display());
    Ok(())
}

/// Read an exported document back from `path`.
pub async fn import_xml(path: &Path) -> Result<AnnotatedDocument> {
    let xml = crate::reader::read_file_async(path)
        .await
        .map_err(|e| e.in_file(path))?;
    from_xml_str(&xml).map_err(|e| e.in_file(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::parse_document;

    const TEXT: &str = "hello world\nthe phone is <great> & cheap";
    const ANN: &str = "T1\tTarget 16 21\tphone\nT2\tPositive 25 32\t<great>\nT3\tThing 0 5;12 15\thello the\nE1\tOpinion:T2 Target:T1\nA1\tSentiment E1 Positive\nA2\tFlag T3\nA3\tScore T1 a|b\nA4\tPath T1 c\\d\nR1\tAbout Arg1:T2 Arg2:T3\n";

    #[test]
    fn test_valency_encoding() {
        assert_eq!(encode_valencies(&[]), "");
        assert_eq!(encode_valencies(&[String::new()]), "|");
        assert_eq!(
            encode_valencies(&["a".to_string(), "b".to_string()]),
            "a|b|"
        );
        assert_eq!(decode_valencies(""), Vec::<String>::new());
        assert_eq!(decode_valencies("|"), vec![String::new()]);
        assert_eq!(decode_valencies("a|b|"), vec!["a", "b"]);
        // values written without terminators still decode
        assert_eq!(decode_valencies("Positive"), vec!["Positive"]);

        let awkward = vec!["a|b".to_string(), r"c\d".to_string(), "|".to_string()];
        let encoded = encode_valencies(&awkward);
        assert_eq!(encoded, r"a\|b|c\\d|\||");
        assert_eq!(decode_valencies(&encoded), awkward);
    }

    #[test]
    fn test_export_contains_expected_elements() {
        let doc = parse_document("001", TEXT, ANN).unwrap();
        let xml = to_xml_string(&doc).unwrap();

        assert!(xml.contains(r#"<document source="001""#));
        assert!(xml.contains(r#"<word id="s.1.w.1" start="16" end="21">phone</word>"#));
        assert!(xml.contains("&lt;great&gt;"));
        assert!(xml.contains(r#"spans="0|5,12|15""#));
        assert!(xml.contains(r#"label.Flag="|""#));
        assert!(xml.contains(r#"link.Opinion="ann2""#));
    }

    #[test]
    fn test_round_trip_preserves_graph() {
        let doc = parse_document("001", TEXT, ANN).unwrap();
        let xml = to_xml_string(&doc).unwrap();
        let imported = from_xml_str(&xml).unwrap();

        assert_eq!(imported.key(), "001");
        assert_eq!(imported.hash(), doc.hash());
        assert_eq!(imported.text(), doc.text());
        assert_eq!(imported.sentences(), doc.sentences());

        let original_ids: Vec<_> = doc.annotations().ids().collect();
        let imported_ids: Vec<_> = imported.annotations().ids().collect();
        assert_eq!(original_ids, imported_ids);

        for original in doc.annotations().iter() {
            let copy = imported.annotation(original.id()).unwrap();
            assert_eq!(copy, original);
        }

        let target = imported.annotation("1").unwrap();
        assert_eq!(target.valencies("Score"), Some(&["a|b".to_string()][..]));
        assert_eq!(target.valencies("Path"), Some(&[r"c\d".to_string()][..]));
    }

    #[test]
    fn test_import_rejects_unknown_link() {
        let xml = r#"<document source="x" hash="">
  <sentences>
    <sentence id="s.0" start="0" end="5"><word id="s.0.w.0" start="0" end="5">hello</word></sentence>
  </sentences>
  <annotations>
    <annotation id="ann1" words="s.0.w.0" repr="hello" spans="0|5" label.Thing="" link.Cause="ann7"/>
  </annotations>
</document>"#;
        let err = from_xml_str(xml).unwrap_err();
        assert!(matches!(err, StandoffError::MissingReference { .. }), "{err}");
    }

    #[test]
    fn test_import_handles_empty_sentence() {
        let doc = parse_document("002", "one\n\ntwo", "").unwrap();
        let imported = from_xml_str(&to_xml_string(&doc).unwrap()).unwrap();
        assert_eq!(imported.sentences().len(), 3);
        assert!(imported.sentences()[1].words().is_empty());
        assert_eq!(imported.text(), "one\n\ntwo");
    }
}
