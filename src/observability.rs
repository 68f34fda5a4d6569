use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("modechat.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("modechat.client.request_errors");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("modechat.client.request_duration_seconds");

pub(crate) static STREAM_REQUESTS: Counter = Counter::new("modechat.stream.requests");
pub(crate) static STREAM_FRAGMENTS: Counter = Counter::new("modechat.stream.fragments");
pub(crate) static STREAM_MALFORMED_FRAMES: Counter =
    Counter::new("modechat.stream.malformed_frames");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("modechat.stream.errors");
pub(crate) static STREAM_TTFB: Moments = Moments::new("modechat.stream.ttfb_seconds");
pub(crate) static STREAM_DURATION: Moments = Moments::new("modechat.stream.duration_seconds");

pub(crate) static SESSION_SAVES: Counter = Counter::new("modechat.session.saves");
pub(crate) static SESSION_SAVE_ERRORS: Counter = Counter::new("modechat.session.save_errors");
pub(crate) static SESSION_LOADS: Counter = Counter::new("modechat.session.loads");
pub(crate) static SESSION_LOAD_ERRORS: Counter = Counter::new("modechat.session.load_errors");

pub(crate) static CONVERSATION_TURNS: Counter = Counter::new("modechat.conversation.turns");
pub(crate) static CONVERSATION_RECOVERED_ERRORS: Counter =
    Counter::new("modechat.conversation.recovered_errors");
pub(crate) static CONVERSATION_BUSY_REJECTIONS: Counter =
    Counter::new("modechat.conversation.busy_rejections");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&STREAM_REQUESTS);
    collector.register_counter(&STREAM_FRAGMENTS);
    collector.register_counter(&STREAM_MALFORMED_FRAMES);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_moments(&STREAM_TTFB);
    collector.register_moments(&STREAM_DURATION);

    collector.register_counter(&SESSION_SAVES);
    collector.register_counter(&SESSION_SAVE_ERRORS);
    collector.register_counter(&SESSION_LOADS);
    collector.register_counter(&SESSION_LOAD_ERRORS);

    collector.register_counter(&CONVERSATION_TURNS);
    collector.register_counter(&CONVERSATION_RECOVERED_ERRORS);
    collector.register_counter(&CONVERSATION_BUSY_REJECTIONS);
}
