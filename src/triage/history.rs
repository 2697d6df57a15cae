use crate::platform::types::{Comment, Item};
use crate::signature;

/// Ordered view over an item's comment thread plus its current label set.
///
/// Built fresh from a just-fetched Item every processing pass; labels and
/// comments change between polls, so nothing here survives a pass.
#[derive(Debug, Clone)]
pub struct CommentHistory {
    comments: Vec<Comment>,
    labels: Vec<String>,
}

impl CommentHistory {
    pub fn new(comments: Vec<Comment>, labels: Vec<String>) -> Self {
        Self { comments, labels }
    }

    pub fn from_item(item: &Item) -> Self {
        Self {
            comments: item.comments.clone(),
            labels: item.labels.clone(),
        }
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn latest_comment(&self) -> Option<&Comment> {
        self.comments.last()
    }

    pub fn latest_bot_comment(&self) -> Option<&Comment> {
        self.comments
            .iter()
            .rev()
            .find(|c| signature::is_bot_comment(&c.body))
    }

    pub fn latest_non_bot_comment(&self) -> Option<&Comment> {
        self.comments
            .iter()
            .rev()
            .find(|c| !signature::is_bot_comment(&c.body))
    }

    /// Position of the most recent bot comment, None if the bot has not
    /// commented yet.
    pub fn index_of_latest_bot_comment(&self) -> Option<usize> {
        self.comments
            .iter()
            .rposition(|c| signature::is_bot_comment(&c.body))
    }

    /// True when the bot has responded and at least one comment arrived
    /// after its latest response. Everything after the latest bot comment
    /// is non-bot by construction.
    pub fn has_user_feedback(&self) -> bool {
        match self.index_of_latest_bot_comment() {
            Some(idx) => idx + 1 < self.comments.len(),
            None => false,
        }
    }

    pub fn has_label(&self, name: &str) -> bool {
        self.labels.iter().any(|l| l == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::{sign_response, CommentOutcome};

    fn bot(id: u64, text: &str) -> Comment {
        Comment {
            id,
            author: "taproot[bot]".to_string(),
            body: sign_response(text, "gpt-4o", CommentOutcome::Success),
            created_at: None,
        }
    }

    fn human(id: u64, text: &str) -> Comment {
        Comment {
            id,
            author: "alice".to_string(),
            body: text.to_string(),
            created_at: None,
        }
    }

    #[test]
    fn test_empty_history() {
        let history = CommentHistory::new(vec![], vec![]);
        assert!(history.latest_comment().is_none());
        assert!(history.latest_bot_comment().is_none());
        assert!(history.index_of_latest_bot_comment().is_none());
        assert!(!history.has_user_feedback());
    }

    #[test]
    fn test_latest_accessors() {
        let history = CommentHistory::new(
            vec![human(1, "first"), bot(2, "answer"), human(3, "thanks")],
            vec![],
        );
        assert_eq!(history.latest_comment().unwrap().id, 3);
        assert_eq!(history.latest_bot_comment().unwrap().id, 2);
        assert_eq!(history.latest_non_bot_comment().unwrap().id, 3);
        assert_eq!(history.index_of_latest_bot_comment(), Some(1));
    }

    #[test]
    fn test_user_feedback_detection() {
        let no_feedback = CommentHistory::new(vec![human(1, "q"), bot(2, "a")], vec![]);
        assert!(!no_feedback.has_user_feedback());

        let with_feedback =
            CommentHistory::new(vec![human(1, "q"), bot(2, "a"), human(3, "more")], vec![]);
        assert!(with_feedback.has_user_feedback());
    }

    #[test]
    fn test_has_label() {
        let history = CommentHistory::new(vec![], vec!["taproot".to_string()]);
        assert!(history.has_label("taproot"));
        assert!(!history.has_label("under_development"));
    }
}
