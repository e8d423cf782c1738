use crate::ai::Content;

/// Turns already exchanged with the model, resent in full on every call.
///
/// Entries only ever arrive in (user, model) pairs, so the length is always
/// even and a failed send never leaves half an exchange behind.
#[derive(Debug, Clone, Default)]
pub struct History {
    entries: Vec<Content>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_exchange(&mut self, user: Content, model: Content) {
        self.entries.reserve(2);
        self.entries.push(user);
        self.entries.push(model);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The stored turns followed by `next`, ready to send.
    pub fn with_turn(&self, next: &Content) -> Vec<Content> {
        let mut contents = Vec::with_capacity(self.entries.len() + 1);
        contents.extend(self.entries.iter().cloned());
        contents.push(next.clone());
        contents
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::Part;
    use crate::state::ChatRole;

    #[test]
    fn test_exchange_appends_user_then_model() {
        let mut history = History::new();
        history.push_exchange(Content::user(vec![Part::text("Hello")]), Content::model_text("Hi"));

        assert_eq!(history.len(), 2);
        let contents = history.with_turn(&Content::user(vec![Part::text("Again")]));
        assert_eq!(contents[0].role, ChatRole::User);
        assert_eq!(contents[1].role, ChatRole::Model);
        assert_eq!(contents[1].text(), "Hi");
    }

    #[test]
    fn test_with_turn_does_not_mutate() {
        let mut history = History::new();
        history.push_exchange(Content::user(vec![Part::text("a")]), Content::model_text("b"));

        let next = Content::user(vec![Part::text("c")]);
        let contents = history.with_turn(&next);

        assert_eq!(contents.len(), 3);
        assert_eq!(contents[2], next);
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_clear_is_idempotent() {
        let mut history = History::new();
        history.clear();
        assert!(history.is_empty());

        history.push_exchange(Content::user(vec![Part::text("a")]), Content::model_text("b"));
        history.clear();
        history.clear();
        assert_eq!(history.len(), 0);
    }
}
