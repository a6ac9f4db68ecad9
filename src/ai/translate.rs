// translate.rs — Turns the conversation flow into Messages API messages.
//
// Pictures become `user` messages, replies become `assistant` messages, and
// runs of the same role are folded into one message with several blocks.

use super::types::{ContentBlock, RequestMessage, Role};
use crate::flow::Turn;

/// Role a turn is sent as. Decided by the turn kind only, never by its author.
pub fn role_for(turn: &Turn) -> Role {
    match turn {
        Turn::Image { .. } => Role::User,
        Turn::Text { .. } => Role::Assistant,
    }
}

fn block_for(turn: &Turn) -> ContentBlock {
    match turn {
        Turn::Image { base64, .. } => ContentBlock::jpeg(base64.clone()),
        Turn::Text { content, .. } => ContentBlock::text(content.clone()),
    }
}

/// Map the flow to a condensed message list where no two neighbours share a role.
pub fn flow_to_messages(turns: &[Turn]) -> Vec<RequestMessage> {
    let mut messages: Vec<RequestMessage> = Vec::new();
    let mut previous_role: Option<Role> = None;

    for turn in turns {
        let role = role_for(turn);
        let block = block_for(turn);
        match messages.last_mut() {
            Some(last) if previous_role == Some(role) => last.content.push(block),
            _ => messages.push(RequestMessage {
                role,
                content: vec![block],
            }),
        }
        previous_role = Some(role);
    }

    messages
}
