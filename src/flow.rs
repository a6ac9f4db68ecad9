// flow.rs — The conversation as the user sees it: pictures they took and the
// replies that came back, in the order they happened.

use serde::Serialize;

/// Author tag for turns produced by the camera.
pub const USER_AUTHOR: &str = "user";
/// Author tag for turns produced by the model.
pub const ASSISTANT_AUTHOR: &str = "claude";

/// One entry of the conversation. The `author` is display-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Turn {
    Image { author: String, base64: String },
    Text { author: String, content: String },
}

impl Turn {
    pub fn image(base64: impl Into<String>) -> Self {
        Turn::Image {
            author: USER_AUTHOR.to_string(),
            base64: base64.into(),
        }
    }

    pub fn reply(content: impl Into<String>) -> Self {
        Turn::Text {
            author: ASSISTANT_AUTHOR.to_string(),
            content: content.into(),
        }
    }

    pub fn author(&self) -> &str {
        match self {
            Turn::Image { author, .. } | Turn::Text { author, .. } => author,
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Turn::Image { .. })
    }
}

/// Append-only sequence of turns. Nothing is ever edited or removed.
#[derive(Debug, Clone, Default)]
pub struct Flow {
    turns: Vec<Turn>,
}

impl Flow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_tag_authors() {
        assert_eq!(Turn::image("x").author(), "user");
        assert_eq!(Turn::reply("y").author(), "claude");
        assert!(Turn::image("x").is_image());
        assert!(!Turn::reply("y").is_image());
    }

    #[test]
    fn flow_keeps_insertion_order() {
        let mut flow = Flow::new();
        assert!(flow.is_empty());
        assert!(flow.last().is_none());

        flow.push(Turn::image("a"));
        flow.push(Turn::reply("b"));
        flow.push(Turn::image("c"));

        assert_eq!(flow.len(), 3);
        assert_eq!(flow.turns()[1], Turn::reply("b"));
        assert_eq!(flow.last(), Some(&Turn::image("c")));
    }
}
