//! Line-level reader for standoff annotation files.
//!
//! Every line is `KEY<TAB>remainder`, where the first character of `KEY` is the
//! record category (`T14` is entity 14). [`read_records`] buckets raw lines by
//! category; [`TypedRecords::from_buckets`] turns the buckets into typed records
//! that the graph builder resolves.

use crate::error::{Result, StandoffError};
use crate::span::Span;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::{debug, warn};

/// Record kind, taken from the first character of a record key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Category {
    /// `T`: a text-bound entity with spans.
    Entity,
    /// `E`: an event with a trigger and role arguments.
    Event,
    /// `A`: an attribute attaching a label (and optional valency) to a target.
    Attribute,
    /// `R`: a typed relation between entities.
    Relation,
    /// `N`: a normalization note. Read but never resolved.
    Note,
    /// Any other leading character. Stored in its own bucket and ignored.
    Other(char),
}

impl Category {
    pub fn from_letter(letter: char) -> Self {
        match letter {
            'T' => Category::Entity,
            'E' => Category::Event,
            'A' => Category::Attribute,
            'R' => Category::Relation,
            'N' => Category::Note,
            other => Category::Other(other),
        }
    }

    pub fn letter(&self) -> char {
        match self {
            Category::Entity => 'T',
            Category::Event => 'E',
            Category::Attribute => 'A',
            Category::Relation => 'R',
            Category::Note => 'N',
            Category::Other(c) => *c,
        }
    }
}

/// One line of an annotation file, split into key and remainder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub category: Category,
    /// Numeric suffix of the key, kept verbatim (`"14"` for `T14`).
    pub key: String,
    /// Every field after the key, rejoined with tabs.
    pub remainder: String,
    /// 1-based line number in the source file.
    pub line: usize,
}

impl RawRecord {
    /// Full record key, e.g. `T14`.
    pub fn full_key(&self) -> String {
        format!("{}{}", self.category.letter(), self.key)
    }
}

/// Records of one category in file order, addressable by key.
#[derive(Debug, Default, Clone)]
pub struct Bucket {
    order: Vec<String>,
    records: HashMap<String, RawRecord>,
}

impl Bucket {
    /// A repeated key keeps its first position and takes the newest remainder.
    fn insert(&mut self, record: RawRecord) {
        if self.records.contains_key(&record.key) {
            warn!(
                "Duplicate record key {} at line {}, keeping the later definition",
                record.full_key(),
                record.line
            );
        } else {
            self.order.push(record.key.clone());
        }
        self.records.insert(record.key.clone(), record);
    }

    pub fn get(&self, key: &str) -> Option<&RawRecord> {
        self.records.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RawRecord> {
        self.order.iter().filter_map(|key| self.records.get(key))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Output of the record reader: raw records bucketed by category.
#[derive(Debug, Default)]
pub struct RecordBuckets {
    buckets: BTreeMap<Category, Bucket>,
    /// Lines that were skipped, as recoverable errors.
    pub malformed: Vec<StandoffError>,
}

impl RecordBuckets {
    pub fn bucket(&self, category: Category) -> Option<&Bucket> {
        self.buckets.get(&category)
    }

    pub fn records(&self, category: Category) -> impl Iterator<Item = &RawRecord> {
        self.buckets
            .get(&category)
            .into_iter()
            .flat_map(|bucket| bucket.iter())
    }

    pub fn count(&self, category: Category) -> usize {
        self.buckets.get(&category).map_or(0, Bucket::len)
    }

    pub fn categories(&self) -> impl Iterator<Item = Category> + '_ {
        self.buckets.keys().copied()
    }
}

/// Split one line into a [`RawRecord`].
///
/// Returns [`StandoffError::MalformedRecord`] for blank lines, an empty key, a key
/// without a numeric suffix, or a key with no remainder.
pub fn parse_line(line: &str, line_no: usize) -> Result<RawRecord> {
    let line = line.trim_end_matches(['\r', '\n']);
    let malformed = |reason: &str| StandoffError::MalformedRecord {
        line: line_no,
        reason: reason.to_string(),
    };

    let mut fields = line.split('\t');
    let key_field = fields.next().unwrap_or_default();
    let mut chars = key_field.chars();
    let letter = chars.next().ok_or_else(|| malformed("empty record key"))?;
    let key = chars.as_str();
    if key.is_empty() {
        return Err(malformed("record key has no numeric suffix"));
    }

    let rest: Vec<&str> = fields.collect();
    if rest.is_empty() {
        return Err(malformed("record has no remainder"));
    }

    Ok(RawRecord {
        category: Category::from_letter(letter),
        key: key.to_string(),
        remainder: rest.join("\t"),
        line: line_no,
    })
}

/// Read a whole annotation file into category buckets, skipping malformed lines.
pub fn read_records(content: &str) -> RecordBuckets {
    let mut buckets = RecordBuckets::default();

    for (index, line) in content.lines().enumerate() {
        match parse_line(line, index + 1) {
            Ok(record) => {
                buckets
                    .buckets
                    .entry(record.category)
                    .or_default()
                    .insert(record);
            }
            Err(e) => {
                if !line.trim().is_empty() {
                    warn!("Skipping line: {}", e);
                }
                buckets.malformed.push(e);
            }
        }
    }

    debug!(
        "Read {} categories, {} malformed lines",
        buckets.buckets.len(),
        buckets.malformed.len()
    );
    buckets
}

/// Reference to another record, e.g. `T14` or `E3`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ref {
    pub category: Category,
    pub id: String,
}

impl Ref {
    pub fn parse(token: &str) -> Option<Ref> {
        let mut chars = token.chars();
        let letter = chars.next()?;
        let id = chars.as_str();
        if id.is_empty() {
            return None;
        }
        Some(Ref {
            category: Category::from_letter(letter),
            id: id.to_string(),
        })
    }

    pub fn entity(id: impl Into<String>) -> Self {
        Ref {
            category: Category::Entity,
            id: id.into(),
        }
    }
}

impl fmt::Display for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.category.letter(), self.id)
    }
}

/// `T id<TAB>label start end[;start end...]<TAB>representation`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRecord {
    pub key: String,
    pub label: String,
    pub spans: Vec<Span>,
    pub representation: String,
}

/// `A id<TAB>label TARGET [valency]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeRecord {
    pub key: String,
    pub label: String,
    pub target: Ref,
    pub valency: Option<String>,
}

/// `E id<TAB>TYPE:TRIGGER role:TARGET ...`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub key: String,
    pub event_type: String,
    pub trigger: Ref,
    pub arguments: Vec<(String, Ref)>,
}

/// `R id<TAB>reltype Arg1:ORIGIN Arg2:TARGET ...`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationRecord {
    pub key: String,
    pub relation_type: String,
    pub origin: Ref,
    pub targets: Vec<Ref>,
}

/// Typed view over [`RecordBuckets`], checked before any resolution pass runs.
#[derive(Debug, Default)]
pub struct TypedRecords {
    pub entities: Vec<EntityRecord>,
    pub attributes: Vec<AttributeRecord>,
    pub events: Vec<EventRecord>,
    pub relations: Vec<RelationRecord>,
    /// Number of `N` records read.
    pub notes: usize,
    /// Records dropped because their remainder had the wrong shape.
    pub skipped: Vec<StandoffError>,
    event_index: HashMap<String, usize>,
}

impl TypedRecords {
    /// Parse every bucket into typed records.
    ///
    /// Span errors in T records are fatal. A/E/R records whose remainder has the wrong
    /// shape are skipped and listed in `skipped`.
    pub fn from_buckets(buckets: &RecordBuckets) -> Result<Self> {
        let mut typed = TypedRecords {
            notes: buckets.count(Category::Note),
            ..Default::default()
        };

        for raw in buckets.records(Category::Entity) {
            typed.entities.push(parse_entity(raw)?);
        }

        for raw in buckets.records(Category::Attribute) {
            match parse_attribute(raw) {
                Ok(record) => typed.attributes.push(record),
                Err(e) => typed.skip(e),
            }
        }

        for raw in buckets.records(Category::Event) {
            match parse_event(raw) {
                Ok(record) => {
                    typed
                        .event_index
                        .insert(record.key.clone(), typed.events.len());
                    typed.events.push(record);
                }
                Err(e) => typed.skip(e),
            }
        }

        for raw in buckets.records(Category::Relation) {
            match parse_relation(raw) {
                Ok(Some(record)) => typed.relations.push(record),
                Ok(None) => debug!("Relation R{} has no origin, skipping", raw.key),
                Err(e) => typed.skip(e),
            }
        }

        for category in buckets.categories() {
            if let Category::Other(letter) = category {
                debug!(
                    "Ignoring {} records with unknown category '{}'",
                    buckets.count(category),
                    letter
                );
            }
        }

        Ok(typed)
    }

    pub fn event(&self, key: &str) -> Option<&EventRecord> {
        self.event_index.get(key).map(|&index| &self.events[index])
    }

    fn skip(&mut self, error: StandoffError) {
        warn!("Skipping record: {}", error);
        self.skipped.push(error);
    }
}

fn malformed(raw: &RawRecord, reason: impl Into<String>) -> StandoffError {
    StandoffError::MalformedRecord {
        line: raw.line,
        reason: format!("{}: {}", raw.full_key(), reason.into()),
    }
}

fn parse_entity(raw: &RawRecord) -> Result<EntityRecord> {
    let record = raw.full_key();
    let (type_and_spans, representation) = match raw.remainder.split_once('\t') {
        Some((head, tail)) => (head, tail.replace('\t', " ")),
        None => (raw.remainder.as_str(), String::new()),
    };

    let mut tokens = type_and_spans.split_whitespace();
    let label = tokens.next().ok_or_else(|| StandoffError::SpanParse {
        record: record.clone(),
        span: type_and_spans.to_string(),
        reason: "missing label".to_string(),
    })?;
    let span_section = tokens.collect::<Vec<_>>().join(" ");

    let spans = span_section
        .split(';')
        .map(|pair| parse_span(&record, pair))
        .collect::<Result<Vec<_>>>()?;

    Ok(EntityRecord {
        key: raw.key.clone(),
        label: label.to_string(),
        spans,
        representation,
    })
}

fn parse_span(record: &str, pair: &str) -> Result<Span> {
    let span_error = |reason: String| StandoffError::SpanParse {
        record: record.to_string(),
        span: pair.to_string(),
        reason,
    };

    let numbers = pair
        .split_whitespace()
        .map(|n| n.parse::<usize>().map_err(|e| span_error(e.to_string())))
        .collect::<Result<Vec<_>>>()?;

    match numbers.as_slice() {
        [start, end] if start < end => Ok(Span::new(*start, *end)),
        [_, _] => Err(span_error("start must be before end".to_string())),
        _ => Err(span_error(format!(
            "expected two offsets, found {}",
            numbers.len()
        ))),
    }
}

fn parse_attribute(raw: &RawRecord) -> Result<AttributeRecord> {
    let tokens: Vec<&str> = raw.remainder.split_whitespace().collect();
    let (label, target, valency) = match tokens.as_slice() {
        [label, target, valency] => (*label, *target, Some(valency.to_string())),
        [label, target] => (*label, *target, None),
        _ => {
            return Err(malformed(
                raw,
                format!("expected 2 or 3 fields, found {}", tokens.len()),
            ))
        }
    };
    let target =
        Ref::parse(target).ok_or_else(|| malformed(raw, format!("bad target {target:?}")))?;

    Ok(AttributeRecord {
        key: raw.key.clone(),
        label: label.to_string(),
        target,
        valency,
    })
}

fn parse_role(raw: &RawRecord, token: &str) -> Result<(String, Ref)> {
    let (role, target) = token
        .split_once(':')
        .ok_or_else(|| malformed(raw, format!("argument {token:?} has no ':'")))?;
    let target =
        Ref::parse(target).ok_or_else(|| malformed(raw, format!("bad reference {target:?}")))?;
    Ok((role.to_string(), target))
}

fn parse_event(raw: &RawRecord) -> Result<EventRecord> {
    let mut tokens = raw.remainder.split_whitespace();
    let head = tokens
        .next()
        .ok_or_else(|| malformed(raw, "event has no trigger"))?;
    let (event_type, trigger) = parse_role(raw, head)?;
    let arguments = tokens
        .map(|token| parse_role(raw, token))
        .collect::<Result<Vec<_>>>()?;

    Ok(EventRecord {
        key: raw.key.clone(),
        event_type,
        trigger,
        arguments,
    })
}

fn parse_relation(raw: &RawRecord) -> Result<Option<RelationRecord>> {
    let tokens: Vec<&str> = raw.remainder.split_whitespace().collect();
    if tokens.len() < 2 {
        return Ok(None);
    }

    let (_, origin) = parse_role(raw, tokens[1])?;
    let targets = tokens[2..]
        .iter()
        .map(|token| parse_role(raw, token).map(|(_, target)| target))
        .collect::<Result<Vec<_>>>()?;

    Ok(Some(RelationRecord {
        key: raw.key.clone(),
        relation_type: tokens[0].to_string(),
        origin,
        targets,
    }))
}
