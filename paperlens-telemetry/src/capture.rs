//! In-memory capture of spans and events, for asserting on instrumentation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Record};
use tracing::{Event, Id, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;

/// A closed span with the fields it carried.
#[derive(Debug, Clone, Serialize)]
pub struct CapturedSpan {
    pub name: String,
    pub parent: Option<String>,
    pub fields: HashMap<String, serde_json::Value>,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
}

/// An event with the name of the span it was emitted in.
#[derive(Debug, Clone, Serialize)]
pub struct CapturedEvent {
    pub level: String,
    pub span: Option<String>,
    pub fields: HashMap<String, serde_json::Value>,
}

impl CapturedEvent {
    pub fn message(&self) -> Option<&str> {
        self.fields.get("message").and_then(|v| v.as_str())
    }
}

/// Shared storage written by [`CaptureLayer`].
#[derive(Debug, Clone, Default)]
pub struct SpanCapture {
    spans: Arc<RwLock<Vec<CapturedSpan>>>,
    events: Arc<RwLock<Vec<CapturedEvent>>>,
}

impl SpanCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// A layer that records into this capture.
    pub fn layer(&self) -> CaptureLayer {
        CaptureLayer { capture: self.clone() }
    }

    /// Closed spans, in closing order.
    pub fn spans(&self) -> Vec<CapturedSpan> {
        self.spans.read().map(|s| s.clone()).unwrap_or_default()
    }

    /// Closed spans with the given name.
    pub fn spans_named(&self, name: &str) -> Vec<CapturedSpan> {
        self.spans().into_iter().filter(|s| s.name == name).collect()
    }

    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events.read().map(|e| e.clone()).unwrap_or_default()
    }

    /// Events whose message equals `message`.
    pub fn events_with_message(&self, message: &str) -> Vec<CapturedEvent> {
        self.events().into_iter().filter(|e| e.message() == Some(message)).collect()
    }

    fn push_span(&self, span: CapturedSpan) {
        if let Ok(mut spans) = self.spans.write() {
            spans.push(span);
        }
    }

    fn push_event(&self, event: CapturedEvent) {
        if let Ok(mut events) = self.events.write() {
            events.push(event);
        }
    }
}

/// A [`Layer`] that stores closed spans and events in a [`SpanCapture`].
pub struct CaptureLayer {
    capture: SpanCapture,
}

struct SpanState {
    fields: HashMap<String, serde_json::Value>,
    opened: Instant,
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else { return };
        let mut visitor = JsonVisitor::default();
        attrs.record(&mut visitor);
        span.extensions_mut().insert(SpanState { fields: visitor.0, opened: Instant::now() });
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else { return };
        let mut extensions = span.extensions_mut();
        if let Some(state) = extensions.get_mut::<SpanState>() {
            let mut visitor = JsonVisitor::default();
            values.record(&mut visitor);
            state.fields.extend(visitor.0);
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let mut visitor = JsonVisitor::default();
        event.record(&mut visitor);
        self.capture.push_event(CapturedEvent {
            level: level_name(event.metadata().level()),
            span: ctx.event_span(event).map(|s| s.name().to_string()),
            fields: visitor.0,
        });
    }

    fn on_close(&self, id: Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(&id) else { return };
        let extensions = span.extensions();
        let (fields, duration) = extensions
            .get::<SpanState>()
            .map(|state| (state.fields.clone(), state.opened.elapsed()))
            .unwrap_or_default();
        self.capture.push_span(CapturedSpan {
            name: span.name().to_string(),
            parent: span.parent().map(|p| p.name().to_string()),
            fields,
            duration,
        });
    }
}

fn level_name(level: &Level) -> String {
    level.as_str().to_string()
}

#[derive(Default)]
struct JsonVisitor(HashMap<String, serde_json::Value>);

impl Visit for JsonVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.0.insert(field.name().to_string(), serde_json::Value::String(format!("{value:?}")));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name().to_string(), serde_json::Value::String(value.to_string()));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.0.insert(field.name().to_string(), serde_json::Value::Bool(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.0.insert(field.name().to_string(), value.into());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.0.insert(field.name().to_string(), value.into());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.0.insert(field.name().to_string(), value.into());
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u128(duration.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use tracing::{info, info_span};
    use tracing_subscriber::layer::SubscriberExt;

    use super::*;

    #[test]
    fn records_span_fields_and_events() {
        let capture = SpanCapture::new();
        let subscriber = tracing_subscriber::registry().with(capture.layer());

        tracing::subscriber::with_default(subscriber, || {
            let span = info_span!("search", request_id = "r-1", top_k = 5_i64);
            let _guard = span.enter();
            info!(result_count = 3_u64, "search completed");
        });

        let spans = capture.spans_named("search");
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].fields["request_id"], "r-1");
        assert_eq!(spans[0].fields["top_k"], 5);

        let events = capture.events_with_message("search completed");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].level, "INFO");
        assert_eq!(events[0].span.as_deref(), Some("search"));
        assert_eq!(events[0].fields["result_count"], 3);
    }

    #[test]
    fn late_recorded_fields_are_kept() {
        let capture = SpanCapture::new();
        let subscriber = tracing_subscriber::registry().with(capture.layer());

        tracing::subscriber::with_default(subscriber, || {
            let span = info_span!("build", documents = tracing::field::Empty);
            span.record("documents", 42_u64);
        });

        assert_eq!(capture.spans_named("build")[0].fields["documents"], 42);
    }
}
