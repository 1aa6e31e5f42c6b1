//! Per-user activity stream
//!
//! Every processed command (and the disconnect itself) emits one event on
//! the owning user's activity stream before its handler runs. The stream is
//! an observability hook for external consumers; routing never reads it.
//! A tracing-backed consumer task ships with the crate.

use tokio::sync::mpsc;
use tracing::debug;

use crate::envelope::Envelope;

/// Kind tag of an activity event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    ChannelConnect,
    GroupJoin,
    GroupLeave,
    MessageSend,
    Disconnect,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::ChannelConnect => "user-channel-connect",
            ActivityKind::GroupJoin => "user-group-join",
            ActivityKind::GroupLeave => "user-group-leave",
            ActivityKind::MessageSend => "user-message-send",
            ActivityKind::Disconnect => "user-disconnect",
        }
    }
}

impl std::fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observability event: the command kind plus the envelope that
/// triggered it (absent for disconnects)
#[derive(Debug, Clone)]
pub struct UserActivity {
    pub kind: ActivityKind,
    pub envelope: Option<Envelope>,
}

/// Create an activity stream pair; the sender side lives in the session
pub fn activity_stream() -> (
    mpsc::UnboundedSender<UserActivity>,
    mpsc::UnboundedReceiver<UserActivity>,
) {
    mpsc::unbounded_channel()
}

/// Default consumer: drain a user's activity stream into the log
///
/// Runs until the session drops its sender side.
pub async fn log_activity(peer: String, mut rx: mpsc::UnboundedReceiver<UserActivity>) {
    while let Some(event) = rx.recv().await {
        debug!(%peer, kind = %event.kind, "user activity");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_kind_tags() {
        assert_eq!(ActivityKind::ChannelConnect.as_str(), "user-channel-connect");
        assert_eq!(ActivityKind::MessageSend.as_str(), "user-message-send");
        assert_eq!(ActivityKind::Disconnect.as_str(), "user-disconnect");
    }

    #[tokio::test]
    async fn test_stream_preserves_order() {
        let (tx, mut rx) = activity_stream();
        for kind in [ActivityKind::ChannelConnect, ActivityKind::GroupJoin] {
            tx.send(UserActivity {
                kind,
                envelope: None,
            })
            .unwrap();
        }
        assert_eq!(rx.recv().await.unwrap().kind, ActivityKind::ChannelConnect);
        assert_eq!(rx.recv().await.unwrap().kind, ActivityKind::GroupJoin);
    }
}
