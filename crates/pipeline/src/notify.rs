//! Operator notifications.

use std::sync::Arc;

use {
    mediarelay_common::ChannelId,
    tracing::{info, warn},
};

#[cfg(feature = "metrics")]
use mediarelay_metrics::{counter, relay as relay_metrics};

use crate::{job::Outcome, transport::RelayTransport};

/// Escape text for Telegram's HTML parse mode.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Summary of one outcome as HTML.
#[must_use]
pub fn render_outcome(original_name: Option<&str>, outcome: &Outcome) -> String {
    let original = escape_html(original_name.unwrap_or("(unnamed)"));
    match outcome {
        Outcome::Success {
            file_name,
            destination,
        } => format!(
            "✅ <b>Relayed</b> <code>{}</code>\nto {}\nfrom <code>{original}</code>",
            escape_html(file_name),
            escape_html(&destination.to_string()),
        ),
        Outcome::Failure { stage, error } => format!(
            "❌ <b>Relay failed</b> while {}\nfile: <code>{original}</code>\n<pre>{}</pre>",
            stage.label().to_lowercase(),
            escape_html(error),
        ),
    }
}

/// Best-effort delivery of outcomes to the operator.
///
/// Without a target the summary only goes to the log. Delivery failures are
/// logged and never affect the outcome.
pub struct NotificationSink {
    transport: Arc<dyn RelayTransport>,
    target: Option<ChannelId>,
}

impl NotificationSink {
    pub fn new(transport: Arc<dyn RelayTransport>, target: Option<ChannelId>) -> Self {
        Self { transport, target }
    }

    #[must_use]
    pub fn target(&self) -> Option<&ChannelId> {
        self.target.as_ref()
    }

    /// Returns whether the summary was delivered.
    pub async fn notify(&self, original_name: Option<&str>, outcome: &Outcome) -> bool {
        let text = render_outcome(original_name, outcome);
        let Some(target) = &self.target else {
            info!(summary = %text, "no notification target configured");
            return false;
        };
        match self.transport.send_message(target, &text, None).await {
            Ok(_) => true,
            Err(e) => {
                warn!(%target, error = %e, "failed to deliver notification");
                #[cfg(feature = "metrics")]
                counter!(relay_metrics::NOTIFICATION_FAILURES_TOTAL).increment(1);
                false
            },
        }
    }
}

impl std::fmt::Debug for NotificationSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationSink")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}
