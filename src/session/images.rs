//! Screenshot pruning for outgoing requests
//!
//! Old screenshots are dropped in chunks so the request prefix stays stable
//! across several turns. The session history itself is never modified.

use crate::protocol::{ContentBlock, Message};
use std::borrow::Cow;
use tracing::debug;

/// Images are removed in multiples of this many
pub const MIN_REMOVAL_CHUNK: usize = 5;

pub const PRUNED_IMAGE_TEXT: &str = "[earlier screenshot removed]";

/// Keeps roughly the `keep` most recent images, dropping older ones in chunks
///
/// Returns the input unchanged when nothing needs to go.
pub fn prune_images(messages: &[Message], keep: Option<usize>) -> Cow<'_, [Message]> {
    let Some(keep) = keep else {
        return Cow::Borrowed(messages);
    };

    let total: usize = messages.iter().map(Message::image_count).sum();
    let mut to_remove = total.saturating_sub(keep);
    to_remove -= to_remove % MIN_REMOVAL_CHUNK;
    if to_remove == 0 {
        return Cow::Borrowed(messages);
    }

    debug!(total, removed = to_remove, "Pruning old screenshots from request");

    let mut remaining = to_remove;
    let pruned = messages
        .iter()
        .map(|message| {
            if remaining == 0 || message.image_count() == 0 {
                return message.clone();
            }
            let mut content: Vec<ContentBlock> = message
                .content
                .iter()
                .filter(|block| {
                    if remaining > 0 && matches!(block, ContentBlock::Image { .. }) {
                        remaining -= 1;
                        false
                    } else {
                        true
                    }
                })
                .cloned()
                .collect();
            if content.is_empty() {
                content.push(ContentBlock::text(PRUNED_IMAGE_TEXT));
            }
            Message::new(message.role, content)
        })
        .collect();

    Cow::Owned(pruned)
}
