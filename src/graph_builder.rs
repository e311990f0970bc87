//! Resolution of typed standoff records into a linked annotation graph.
//!
//! The build runs four passes in a fixed order, each taking the previous pass's graph
//! by value and handing a new one to the next:
//!
//! 1. **Entities** (`T`): one [`Annotation`] per entity record.
//! 2. **Attributes** (`A`): label valencies, on the entity or on an event's trigger entity.
//! 3. **Events** (`E`): every argument entity gets a link back to the event's trigger.
//! 4. **Relations** (`R`): every target entity gets a link back to the relation's origin.
//!
//! Later passes only look annotations up by id, so no pass ever observes a half-built
//! annotation. Any dangling reference aborts the whole build.

use crate::error::{Result, StandoffError};
use crate::record_reader::{Category, EntityRecord, Ref, TypedRecords};
use crate::span::Span;
use crate::tokenizer::WordRef;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info};

/// Identifier of an annotation: the numeric suffix of its `T` record.
pub type AnnotationId = String;

/// A resolved text-bound annotation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Annotation {
    id: AnnotationId,
    representation: String,
    spans: Vec<Span>,
    labels: BTreeMap<String, Vec<String>>,
    links: BTreeMap<String, Vec<AnnotationId>>,
    words: Vec<WordRef>,
}

impl Annotation {
    /// Create an annotation with the given labels, each with no valency.
    ///
    /// `spans` must not be empty.
    pub fn new<I, S>(
        id: impl Into<AnnotationId>,
        representation: impl Into<String>,
        spans: Vec<Span>,
        labels: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            representation: representation.into(),
            spans,
            labels: labels
                .into_iter()
                .map(|label| (label.into(), Vec::new()))
                .collect(),
            links: BTreeMap::new(),
            words: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Surface text as written in the annotation file. For discontinuous annotations
    /// this need not match the spanned words.
    pub fn representation(&self) -> &str {
        &self.representation
    }

    /// Spans in the order the annotator wrote them.
    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    /// First span's start to last span's end, in input order.
    pub fn overall_span(&self) -> Span {
        let first = self.spans.first().map_or(0, |s| s.start);
        let last = self.spans.last().map_or(0, |s| s.end);
        Span::new(first, last)
    }

    /// Label name to valencies. A label without valency holds one empty string per
    /// occurrence; the entity's own type label starts with no entries.
    pub fn labels(&self) -> &BTreeMap<String, Vec<String>> {
        &self.labels
    }

    pub fn valencies(&self, label: &str) -> Option<&[String]> {
        self.labels.get(label).map(Vec::as_slice)
    }

    /// Link type to the annotations that point at this one under that type.
    pub fn links(&self) -> &BTreeMap<String, Vec<AnnotationId>> {
        &self.links
    }

    pub fn linked(&self, link_type: &str) -> &[AnnotationId] {
        self.links.get(link_type).map_or(&[], Vec::as_slice)
    }

    /// Words bound by the span binder, in span order.
    pub fn words(&self) -> &[WordRef] {
        &self.words
    }

    pub(crate) fn push_valency(&mut self, label: impl Into<String>, valency: impl Into<String>) {
        self.labels
            .entry(label.into())
            .or_default()
            .push(valency.into());
    }

    pub(crate) fn ensure_label(&mut self, label: impl Into<String>) {
        self.labels.entry(label.into()).or_default();
    }

    pub(crate) fn push_link(&mut self, link_type: impl Into<String>, source: AnnotationId) {
        self.links.entry(link_type.into()).or_default().push(source);
    }

    pub(crate) fn bind_word(&mut self, word: WordRef) {
        self.words.push(word);
    }
}

/// All annotations of one document, in entity-record order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnnotationGraph {
    annotations: Vec<Annotation>,
    #[serde(skip)]
    index: HashMap<AnnotationId, usize>,
}

impl AnnotationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an annotation. Returns `false` and leaves the graph unchanged when the id
    /// is already taken.
    pub fn insert(&mut self, annotation: Annotation) -> bool {
        if self.index.contains_key(&annotation.id) {
            return false;
        }
        self.index
            .insert(annotation.id.clone(), self.annotations.len());
        self.annotations.push(annotation);
        true
    }

    pub fn get(&self, id: &str) -> Option<&Annotation> {
        self.index.get(id).map(|&i| &self.annotations[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Annotation> {
        self.annotations.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.annotations.iter().map(|a| a.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut Annotation> {
        self.index.get(id).map(|&i| &mut self.annotations[i])
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Annotation> {
        self.annotations.iter_mut()
    }

    /// Mutable lookup that reports a dangling reference from `record`.
    fn resolve_mut(&mut self, record: &str, id: &str) -> Result<&mut Annotation> {
        self.get_mut(id)
            .ok_or_else(|| StandoffError::missing(record, format!("T{id}")))
    }

    fn require(&self, record: &str, id: &str) -> Result<()> {
        if self.contains(id) {
            Ok(())
        } else {
            Err(StandoffError::missing(record, format!("T{id}")))
        }
    }
}

/// Build the annotation graph from typed records, running all four passes.
pub fn build_graph(records: &TypedRecords) -> Result<AnnotationGraph> {
    let graph = create_entities(&records.entities);
    let graph = apply_attributes(graph, records)?;
    let graph = apply_events(graph, records)?;
    let graph = apply_relations(graph, records)?;

    info!(
        "Built annotation graph: {} annotations, {} attributes, {} events, {} relations, {} notes ignored",
        graph.len(),
        records.attributes.len(),
        records.events.len(),
        records.relations.len(),
        records.notes
    );
    Ok(graph)
}

/// Pass 1: one annotation per entity record, labelled with the entity type.
pub fn create_entities(entities: &[EntityRecord]) -> AnnotationGraph {
    let mut graph = AnnotationGraph::new();
    for entity in entities {
        let annotation = Annotation::new(
            entity.key.clone(),
            entity.representation.clone(),
            entity.spans.clone(),
            [entity.label.clone()],
        );
        graph.insert(annotation);
    }
    debug!("Pass 1: created {} annotations", graph.len());
    graph
}

/// Pass 2: attach attribute valencies. An attribute on an event lands on the
/// event's trigger entity.
pub fn apply_attributes(
    mut graph: AnnotationGraph,
    records: &TypedRecords,
) -> Result<AnnotationGraph> {
    let resolver = EventResolver::new(records);

    for attribute in &records.attributes {
        let record = format!("A{}", attribute.key);
        let Some(target) = resolver.resolve(&record, &attribute.target)? else {
            debug!(
                "{} targets {}, which carries no labels",
                record, attribute.target
            );
            continue;
        };

        let valency = attribute.valency.clone().unwrap_or_default();
        graph
            .resolve_mut(&record, &target)?
            .push_valency(attribute.label.clone(), valency);
    }

    debug!("Pass 2: applied {} attributes", records.attributes.len());
    Ok(graph)
}

/// Pass 3: link every event argument back to the event's trigger, under the event type.
pub fn apply_events(mut graph: AnnotationGraph, records: &TypedRecords) -> Result<AnnotationGraph> {
    let resolver = EventResolver::new(records);
    let mut links = 0usize;

    for event in &records.events {
        let record = format!("E{}", event.key);
        let origin = resolver.resolve_event(&record, &event.key)?;
        graph.require(&record, &origin)?;

        for (role, argument) in &event.arguments {
            let Some(target) = resolver.resolve(&record, argument)? else {
                debug!("{} argument {}:{} is not an entity or event", record, role, argument);
                continue;
            };
            graph
                .resolve_mut(&record, &target)?
                .push_link(event.event_type.clone(), origin.clone());
            links += 1;
        }
    }

    debug!("Pass 3: added {} event links", links);
    Ok(graph)
}

/// Pass 4: link every relation target back to the relation origin, under the
/// relation type.
pub fn apply_relations(
    mut graph: AnnotationGraph,
    records: &TypedRecords,
) -> Result<AnnotationGraph> {
    let resolver = EventResolver::new(records);
    let mut links = 0usize;

    for relation in &records.relations {
        let record = format!("R{}", relation.key);
        let Some(origin) = resolver.resolve(&record, &relation.origin)? else {
            debug!("{} origin {} is not an entity or event", record, relation.origin);
            continue;
        };
        graph.require(&record, &origin)?;

        for target in &relation.targets {
            let Some(target) = resolver.resolve(&record, target)? else {
                continue;
            };
            graph
                .resolve_mut(&record, &target)?
                .push_link(relation.relation_type.clone(), origin.clone());
            links += 1;
        }
    }

    debug!("Pass 4: added {} relation links", links);
    Ok(graph)
}

/// Follows event references down to the entity that triggers them.
struct EventResolver<'a> {
    records: &'a TypedRecords,
}

impl<'a> EventResolver<'a> {
    fn new(records: &'a TypedRecords) -> Self {
        Self { records }
    }

    /// Entity id a reference ultimately denotes. `None` for categories that never
    /// denote an entity (attributes, relations, notes).
    fn resolve(&self, record: &str, reference: &Ref) -> Result<Option<AnnotationId>> {
        match reference.category {
            Category::Entity => Ok(Some(reference.id.clone())),
            Category::Event => self.resolve_event(record, &reference.id).map(Some),
            _ => Ok(None),
        }
    }

    /// Walk trigger references from event `key` until an entity is reached.
    fn resolve_event(&self, record: &str, key: &str) -> Result<AnnotationId> {
        let mut visited = HashSet::new();
        let mut current = key;

        loop {
            if !visited.insert(current) {
                return Err(StandoffError::ReferenceCycle {
                    record: record.to_string(),
                    reference: format!("E{current}"),
                });
            }

            let event = self
                .records
                .event(current)
                .ok_or_else(|| StandoffError::missing(record, format!("E{current}")))?;

            match event.trigger.category {
                Category::Entity => return Ok(event.trigger.id.clone()),
                Category::Event => current = &event.trigger.id,
                _ => return Err(StandoffError::missing(record, event.trigger.to_string())),
            }
        }
    }
}
