use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("deepchat.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("deepchat.client.request_errors");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("deepchat.client.request_duration_seconds");

pub(crate) static STREAM_EVENTS: Counter = Counter::new("deepchat.stream.events");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("deepchat.stream.errors");
pub(crate) static STREAM_BYTES: Counter = Counter::new("deepchat.stream.bytes");

pub(crate) static GENERATION_DELTAS: Counter = Counter::new("deepchat.generation.deltas");
pub(crate) static GENERATION_COMPLETED: Counter = Counter::new("deepchat.generation.completed");
pub(crate) static GENERATION_CANCELLED: Counter = Counter::new("deepchat.generation.cancelled");
pub(crate) static GENERATION_FAILED: Counter = Counter::new("deepchat.generation.failed");
pub(crate) static GENERATION_TTFD: Moments =
    Moments::new("deepchat.generation.time_to_first_delta_seconds");
pub(crate) static GENERATION_DURATION: Moments =
    Moments::new("deepchat.generation.duration_seconds");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&STREAM_EVENTS);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_counter(&STREAM_BYTES);

    collector.register_counter(&GENERATION_DELTAS);
    collector.register_counter(&GENERATION_COMPLETED);
    collector.register_counter(&GENERATION_CANCELLED);
    collector.register_counter(&GENERATION_FAILED);
    collector.register_moments(&GENERATION_TTFD);
    collector.register_moments(&GENERATION_DURATION);
}
