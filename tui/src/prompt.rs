//! Prompt Input
//!
//! The input buffer and category selector. Pure state: the app feeds it key
//! presses and asks it for a submission; it never touches the network.

use muse_core::Category;
use unicode_width::UnicodeWidthStr;

/// What the user is about to send
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Submission {
    /// The prompt text, untrimmed
    pub text: String,
    /// The selected category
    pub category: Category,
}

/// State of the prompt box
#[derive(Debug, Default)]
pub struct PromptInput {
    /// Draft text being typed
    draft: String,
    /// Currently selected category
    category: Category,
}

impl PromptInput {
    /// Create an empty prompt with the default category
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The current draft text
    #[must_use]
    pub fn draft(&self) -> &str {
        &self.draft
    }

    /// Display width of the draft, for cursor placement
    #[must_use]
    pub fn draft_width(&self) -> usize {
        self.draft.width()
    }

    /// The selected category
    #[must_use]
    pub fn category(&self) -> Category {
        self.category
    }

    /// Append a typed character
    pub fn push(&mut self, c: char) {
        self.draft.push(c);
    }

    /// Delete the last character
    pub fn backspace(&mut self) {
        self.draft.pop();
    }

    /// Select the next category, wrapping around
    pub fn next_category(&mut self) {
        self.category = self.category.next();
    }

    /// Select the previous category, wrapping around
    pub fn prev_category(&mut self) {
        self.category = self.category.prev();
    }

    /// Produce a submission from the current draft
    ///
    /// Returns `None` when the draft is empty or whitespace-only. The draft
    /// is kept so the prompt can be tweaked and resubmitted.
    pub fn submit(&mut self) -> Option<Submission> {
        if self.draft.trim().is_empty() {
            return None;
        }
        Some(Submission {
            text: self.draft.clone(),
            category: self.category,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_draft_does_not_submit() {
        let mut prompt = PromptInput::new();
        assert_eq!(prompt.submit(), None);

        for c in "   \t ".chars() {
            prompt.push(c);
        }
        assert_eq!(prompt.submit(), None, "whitespace-only must not submit");
    }

    #[test]
    fn test_submit_keeps_draft() {
        let mut prompt = PromptInput::new();
        for c in "a lonely robot".chars() {
            prompt.push(c);
        }

        let submission = prompt.submit().unwrap();
        assert_eq!(submission.text, "a lonely robot");
        assert_eq!(submission.category, Category::Poetry);

        // The draft survives submission for tweak-and-resubmit
        assert_eq!(prompt.draft(), "a lonely robot");
        assert!(prompt.submit().is_some());
    }

    #[test]
    fn test_default_category_is_poetry() {
        let prompt = PromptInput::new();
        assert_eq!(prompt.category(), Category::Poetry);
    }

    #[test]
    fn test_category_cycling_wraps_both_ways() {
        let mut prompt = PromptInput::new();

        prompt.next_category();
        assert_eq!(prompt.category(), Category::Melody);
        prompt.next_category();
        assert_eq!(prompt.category(), Category::Script);
        prompt.next_category();
        assert_eq!(prompt.category(), Category::Poetry);

        prompt.prev_category();
        assert_eq!(prompt.category(), Category::Script);
    }

    #[test]
    fn test_backspace() {
        let mut prompt = PromptInput::new();
        prompt.push('h');
        prompt.push('i');
        prompt.backspace();
        assert_eq!(prompt.draft(), "h");
        prompt.backspace();
        prompt.backspace();
        assert_eq!(prompt.draft(), "");
    }

    #[test]
    fn test_draft_width_counts_display_columns() {
        let mut prompt = PromptInput::new();
        for c in "ab".chars() {
            prompt.push(c);
        }
        assert_eq!(prompt.draft_width(), 2);
    }
}
