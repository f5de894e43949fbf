use biometrics::{Collector, Counter, Moments};

pub(crate) static SESSIONS_STARTED: Counter = Counter::new("concierge.session.started");

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("concierge.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("concierge.client.request_errors");

pub(crate) static STREAM_FRAGMENTS: Counter = Counter::new("concierge.stream.fragments");
pub(crate) static STREAM_EMPTY_CHUNKS: Counter = Counter::new("concierge.stream.empty_chunks");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("concierge.stream.errors");
pub(crate) static STREAM_BYTES: Counter = Counter::new("concierge.stream.bytes");
pub(crate) static STREAM_TTFB: Moments = Moments::new("concierge.stream.ttfb_seconds");
pub(crate) static STREAM_DURATION: Moments = Moments::new("concierge.stream.duration_seconds");

pub(crate) static TURNS_COMPLETED: Counter = Counter::new("concierge.conversation.turns_completed");
pub(crate) static TURNS_FAILED: Counter = Counter::new("concierge.conversation.turns_failed");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&SESSIONS_STARTED);

    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);

    collector.register_counter(&STREAM_FRAGMENTS);
    collector.register_counter(&STREAM_EMPTY_CHUNKS);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_counter(&STREAM_BYTES);
    collector.register_moments(&STREAM_TTFB);
    collector.register_moments(&STREAM_DURATION);

    collector.register_counter(&TURNS_COMPLETED);
    collector.register_counter(&TURNS_FAILED);
}
