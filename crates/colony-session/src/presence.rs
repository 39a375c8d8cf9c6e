//! The presence bridge: a hook fired when a named user logs in.
//!
//! Deployments forward these to an external chat relay. The server never
//! waits on the bridge and never learns whether delivery succeeded.

use tokio::sync::mpsc;

/// Receives login notifications for non-guest users.
pub trait PresenceSink: Send + Sync + 'static {
    fn notify_login(&self, name: &str);
}

/// Discards every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentPresence;

impl PresenceSink for SilentPresence {
    fn notify_login(&self, _name: &str) {}
}

/// Queues names for a relay task on the other end of the channel.
impl PresenceSink for mpsc::UnboundedSender<String> {
    fn notify_login(&self, name: &str) {
        if self.send(name.to_string()).is_err() {
            tracing::debug!(target: "colony::presence", name, "presence relay is gone");
        }
    }
}
