// Best-effort notification side-channel. Sinks must never block a pipeline
// and must never surface a delivery failure to the caller.
pub mod telegram;

pub use telegram::TelegramSink;

/// Fire-and-forget status events keyed by the mint they concern
///
/// Implementations must be `Send + Sync` and return quickly; slow delivery
/// belongs in a spawned task. Failures are swallowed.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, message: &str, context_key: &str);
}

/// Sink that just mirrors events into the log
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, message: &str, context_key: &str) {
        tracing::info!(mint = %context_key, "{}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Test sink collecting everything it was asked to deliver
    pub struct RecordingSink {
        pub messages: Mutex<Vec<(String, String)>>,
    }

    impl RecordingSink {
        pub fn new() -> Self {
            Self {
                messages: Mutex::new(Vec::new()),
            }
        }
    }

    impl NotificationSink for RecordingSink {
        fn notify(&self, message: &str, context_key: &str) {
            self.messages
                .lock()
                .unwrap()
                .push((message.to_string(), context_key.to_string()));
        }
    }

    #[test]
    fn test_log_sink_does_not_panic() {
        LogSink.notify("Confirmed buy", "MintAaa111");
    }

    #[test]
    fn test_recording_sink_collects() {
        let sink = RecordingSink::new();
        sink.notify("hello", "MintAaa111");

        let messages = sink.messages.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].1, "MintAaa111");
    }
}
