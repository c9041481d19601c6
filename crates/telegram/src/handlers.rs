//! Turning updates into relay jobs and command replies.

use std::sync::Arc;

use {
    mediarelay_common::{self as common, MediaEvent},
    teloxide::types::{MediaKind, Message, MessageKind},
    tracing::{debug, info},
};

#[cfg(feature = "metrics")]
use mediarelay_metrics::{counter, telegram as tg_metrics};

use crate::{
    commands::{self, parse_command},
    error::Result,
    state::RelayState,
};

/// The relayable attachment of a message, if it has one.
///
/// Only videos and documents qualify.
#[must_use]
pub fn extract_media_event(msg: &Message) -> Option<MediaEvent> {
    let MessageKind::Common(message) = &msg.kind else {
        return None;
    };
    let (kind, file, file_name, mime_type) = match &message.media_kind {
        MediaKind::Video(v) => (
            common::MediaKind::Video,
            &v.video.file,
            v.video.file_name.clone(),
            v.video.mime_type.as_ref(),
        ),
        MediaKind::Document(d) => (
            common::MediaKind::Document,
            &d.document.file,
            d.document.file_name.clone(),
            d.document.mime_type.as_ref(),
        ),
        _ => return None,
    };
    Some(MediaEvent {
        chat_id: msg.chat.id.0,
        chat_username: msg.chat.username().map(str::to_string),
        message_id: msg.id.0,
        kind,
        file_id: file.id.clone(),
        file_name,
        mime_type: mime_type.map(ToString::to_string),
        size: u64::from(file.size),
    })
}

/// Route one message: media from the source channel becomes a relay job,
/// commands from anywhere else get an answer.
pub async fn handle_message(msg: Message, state: &RelayState) -> Result<()> {
    if state.source.matches(msg.chat.id.0, msg.chat.username()) {
        match extract_media_event(&msg) {
            Some(event) => dispatch_media(state, event),
            None => debug!(
                chat_id = msg.chat.id.0,
                message_id = msg.id.0,
                "ignoring source post without video or document"
            ),
        }
        return Ok(());
    }

    let Some(text) = msg.text() else {
        return Ok(());
    };
    if let Some(command) = parse_command(text, state.bot_username.as_deref()) {
        commands::handle_command(state, &msg, command).await?;
    }
    Ok(())
}

/// Start a relay job on the state's task tracker.
pub fn dispatch_media(state: &RelayState, event: MediaEvent) {
    info!(
        chat_id = event.chat_id,
        message_id = event.message_id,
        kind = %event.kind,
        size = event.size,
        "media received from source channel"
    );

    #[cfg(feature = "metrics")]
    counter!(tg_metrics::MEDIA_EVENTS_TOTAL).increment(1);

    let pipeline = Arc::clone(&state.pipeline);
    state.jobs.spawn(async move {
        pipeline.run(event).await;
    });
}
