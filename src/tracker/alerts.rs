//! Owner alerts for detected edits and deletions.
//!
//! Formatting and delivery live here so the tracker stays a pure state
//! machine. Alerts are best-effort: a send failure is logged and the
//! pipeline moves on.

use tracing::warn;

use super::{DeletedMessage, EditRecord, MessageSnapshot};
use crate::transport::{OutboundContent, Transport, jid};

/// Resolve a chat to something readable: group subject when available,
/// otherwise the short JID.
async fn chat_label(transport: &dyn Transport, chat_id: &str) -> String {
    if jid::is_group(chat_id) {
        if let Ok(meta) = transport.group_metadata(chat_id).await {
            return meta.subject;
        }
    }
    jid::short(chat_id).to_string()
}

pub async fn send_delete_alert(
    transport: &dyn Transport,
    owner_jid: &str,
    deleted: &DeletedMessage,
) {
    let chat = chat_label(transport, &deleted.chat_id).await;
    let deleter = deleted
        .deleted_by
        .as_deref()
        .map(jid::short)
        .unwrap_or("unknown");

    let mut body = format!(
        "🗑️ *Message deleted*\n\n*Chat:* {}\n*Sender:* {}\n*Deleted by:* {}",
        chat,
        jid::short(&deleted.sender_id),
        deleter,
    );
    if deleted.text.is_empty() && deleted.has_media {
        body.push_str("\n*Content:* <media, no caption>");
    } else {
        body.push_str("\n*Content:* ");
        body.push_str(&deleted.text);
    }
    if deleted.was_edited {
        body.push_str("\n_(message had been edited before deletion)_");
    }

    if let Err(e) = transport
        .send_message(owner_jid, OutboundContent::text(body))
        .await
    {
        warn!("Failed to deliver delete alert: {}", e);
    }
}

pub async fn send_edit_alert(
    transport: &dyn Transport,
    owner_jid: &str,
    snapshot: &MessageSnapshot,
    record: &EditRecord,
) {
    let chat = chat_label(transport, &snapshot.chat_id).await;

    let body = format!(
        "✏️ *Message edited*\n\n*Chat:* {}\n*Sender:* {}\n*Before:* {}\n*After:* {}",
        chat,
        jid::short(&snapshot.sender_id),
        record.old_text,
        record.new_text,
    );

    if let Err(e) = transport
        .send_message(owner_jid, OutboundContent::text(body))
        .await
    {
        warn!("Failed to deliver edit alert: {}", e);
    }
}
