use std::fmt;

/// Lifecycle of a consumer.
///
/// ```text
/// Stopped ─► Starting ─► Listening ◄─► Handling
///                            │
///                            ▼
///                        Stopping ─► Stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Stopped,
    Starting,
    Listening,
    /// Listening with at least one handler invocation in flight.
    Handling,
    /// No new deliveries are taken; in-flight handlers are draining.
    Stopping,
}

impl fmt::Display for ConsumerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConsumerState::Stopped => "stopped",
            ConsumerState::Starting => "starting",
            ConsumerState::Listening => "listening",
            ConsumerState::Handling => "handling",
            ConsumerState::Stopping => "stopping",
        };
        f.write_str(name)
    }
}
