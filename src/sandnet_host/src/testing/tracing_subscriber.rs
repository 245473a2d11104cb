use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use tracing::Subscriber;
use tracing_core::event::Event;
use tracing_core::metadata::Metadata;
use tracing_core::span::{Attributes, Current, Id, Record};
use tracing_core::{Level, LevelFilter};
use tracing_serde::AsSerde;

/// A subscriber that keeps every span and event it sees as JSON, so
/// tests can assert on the diagnostics a call produced.
#[derive(Debug, Clone)]
pub(crate) struct TracingSubscriber {
    spans: Arc<Mutex<HashMap<u64, (Value, &'static Metadata<'static>)>>>,
    events: Arc<Mutex<Vec<Value>>>,
    span_stack: Arc<Mutex<Vec<Id>>>,
    level_filter: LevelFilter,
    next_id: Arc<AtomicU64>,
}

impl TracingSubscriber {
    pub(crate) fn new(level: Level) -> Self {
        Self {
            spans: Arc::new(Mutex::new(HashMap::new())),
            events: Arc::new(Mutex::new(Vec::new())),
            span_stack: Arc::new(Mutex::new(Vec::new())),
            level_filter: level.into(),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub(crate) fn get_events(&self) -> Vec<Value> {
        self.events.lock().expect("Failed to lock events").clone()
    }

    /// The names of every span opened so far
    pub(crate) fn span_names(&self) -> Vec<&'static str> {
        self.spans
            .lock()
            .expect("Failed to lock spans")
            .values()
            .map(|(_, metadata)| metadata.name())
            .collect()
    }

    /// The `message` of every event at `level`
    pub(crate) fn messages_at(&self, level: &str) -> Vec<String> {
        self.get_events()
            .iter()
            .filter(|e| e["event"]["metadata"]["level"] == level)
            .filter_map(|e| e["event"]["message"].as_str().map(String::from))
            .collect()
    }

    pub(crate) fn clear(&self) {
        self.spans.lock().expect("Failed to lock spans").clear();
        self.events.lock().expect("Failed to lock events").clear();
        self.span_stack
            .lock()
            .expect("Failed to lock span stack")
            .clear();
        self.next_id.store(1, Ordering::Relaxed);
    }
}

impl Subscriber for TracingSubscriber {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= &self.level_filter
    }

    fn new_span(&self, span_attributes: &Attributes<'_>) -> Id {
        let span_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let id = Id::from_u64(span_id);
        let json = json!({
            "span": {
                "id": id.as_serde(),
                "attributes": span_attributes.as_serde(),
            }
        });
        self.spans
            .lock()
            .expect("Failed to lock spans")
            .insert(span_id, (json, span_attributes.metadata()));
        id
    }

    fn record(&self, id: &Id, values: &Record<'_>) {
        let mut spans = self.spans.lock().expect("Failed to lock spans");
        let (json, _) = spans
            .get_mut(&id.into_u64())
            .unwrap_or_else(|| panic!("Failed to get span with ID {}", id.into_u64()));
        let mut recorded = json!(values.as_serde());
        if let (Some(attributes), Some(recorded)) = (
            json["span"]["attributes"].as_object_mut(),
            recorded.as_object_mut(),
        ) {
            attributes.append(recorded);
        }
    }

    fn event(&self, event: &Event<'_>) {
        let json = json!({
            "event": event.as_serde(),
        });
        self.events
            .lock()
            .expect("Failed to lock events")
            .push(json);
    }

    fn current_span(&self) -> Current {
        let stack = self.span_stack.lock().expect("Failed to lock span stack");
        let spans = self.spans.lock().expect("Failed to lock spans");
        match stack.last() {
            Some(id) => match spans.get(&id.into_u64()) {
                Some((_, metadata)) => Current::new(id.clone(), *metadata),
                None => Current::none(),
            },
            None => Current::none(),
        }
    }

    fn enter(&self, span: &Id) {
        self.span_stack
            .lock()
            .expect("Failed to lock span stack")
            .push(span.clone());
    }

    fn exit(&self, _span: &Id) {
        _ = self
            .span_stack
            .lock()
            .expect("Failed to lock span stack")
            .pop();
    }

    fn record_follows_from(&self, _span: &Id, _follows: &Id) {}
}
