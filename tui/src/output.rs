//! Output Panel
//!
//! State for the single current output: scroll position over the wrapped
//! text and the feedback box lifecycle. Like the prompt, this is pure state
//! driven by the app.
//!
//! Feedback is one-shot per panel: once sent, the box hides and the toggle
//! goes dead. Sending is optimistic - the panel shows "sent" immediately and
//! never reports a delivery failure.

use textwrap::wrap;

/// A feedback submission produced by the panel
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeedbackSubmission {
    /// The free-text feedback, untrimmed
    pub text: String,
}

/// State of the output panel
#[derive(Debug, Default)]
pub struct OutputPanel {
    /// Scroll offset in wrapped lines from the top
    scroll_offset: usize,
    /// Whether the feedback box is open
    feedback_open: bool,
    /// Feedback draft being typed
    feedback_draft: String,
    /// Feedback was sent for this panel
    feedback_submitted: bool,
}

impl OutputPanel {
    /// Create a fresh panel
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the feedback box is open
    #[must_use]
    pub fn feedback_open(&self) -> bool {
        self.feedback_open
    }

    /// Whether feedback has already been sent
    #[must_use]
    pub fn feedback_submitted(&self) -> bool {
        self.feedback_submitted
    }

    /// The feedback draft text
    #[must_use]
    pub fn feedback_draft(&self) -> &str {
        &self.feedback_draft
    }

    /// Current scroll offset in wrapped lines
    #[must_use]
    pub fn scroll_offset(&self) -> usize {
        self.scroll_offset
    }

    /// Open or close the feedback box
    ///
    /// Dead once feedback has been sent.
    pub fn toggle_feedback(&mut self) {
        if self.feedback_submitted {
            return;
        }
        self.feedback_open = !self.feedback_open;
    }

    /// Append a typed character to the feedback draft
    pub fn push_feedback(&mut self, c: char) {
        self.feedback_draft.push(c);
    }

    /// Delete the last character of the feedback draft
    pub fn backspace_feedback(&mut self) {
        self.feedback_draft.pop();
    }

    /// Submit the feedback draft
    ///
    /// Returns `None` for an empty or whitespace-only draft. On success the
    /// box closes and the panel is marked as sent, regardless of what happens
    /// to the request afterwards.
    pub fn submit_feedback(&mut self) -> Option<FeedbackSubmission> {
        if self.feedback_submitted || self.feedback_draft.trim().is_empty() {
            return None;
        }
        self.feedback_submitted = true;
        self.feedback_open = false;
        Some(FeedbackSubmission {
            text: std::mem::take(&mut self.feedback_draft),
        })
    }

    /// Reset scroll when a new output replaces the current one
    ///
    /// The feedback state is deliberately left alone: sent stays sent.
    pub fn on_new_output(&mut self) {
        self.scroll_offset = 0;
    }

    /// Scroll up (towards the start of the text)
    pub fn scroll_up(&mut self, lines: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(lines);
    }

    /// Scroll down, clamped by the caller via [`OutputPanel::clamp_scroll`]
    pub fn scroll_down(&mut self, lines: usize) {
        self.scroll_offset += lines;
    }

    /// Clamp the scroll offset to the rendered line count
    pub fn clamp_scroll(&mut self, total_lines: usize, viewport_height: usize) {
        let max_scroll = total_lines.saturating_sub(viewport_height);
        self.scroll_offset = self.scroll_offset.min(max_scroll);
    }
}

/// Wrap output text to a rendering width, preserving blank lines
#[must_use]
pub fn wrap_output(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return Vec::new();
    }
    text.lines()
        .flat_map(|line| {
            if line.is_empty() {
                vec![String::new()]
            } else {
                wrap(line, width).into_iter().map(|cow| cow.into_owned()).collect()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_feedback_does_not_submit() {
        let mut panel = OutputPanel::new();
        panel.toggle_feedback();
        assert_eq!(panel.submit_feedback(), None);

        for c in "   ".chars() {
            panel.push_feedback(c);
        }
        assert_eq!(panel.submit_feedback(), None);
        assert!(!panel.feedback_submitted());
        assert!(panel.feedback_open());
    }

    #[test]
    fn test_submit_closes_box_and_marks_sent() {
        let mut panel = OutputPanel::new();
        panel.toggle_feedback();
        for c in "loved it".chars() {
            panel.push_feedback(c);
        }

        let submission = panel.submit_feedback().unwrap();
        assert_eq!(submission.text, "loved it");
        assert!(panel.feedback_submitted());
        assert!(!panel.feedback_open());
        assert_eq!(panel.feedback_draft(), "");
    }

    #[test]
    fn test_double_toggle_returns_to_hidden() {
        let mut panel = OutputPanel::new();
        panel.toggle_feedback();
        assert!(panel.feedback_open());

        panel.toggle_feedback();
        assert!(!panel.feedback_open());
        assert!(!panel.feedback_submitted());
        assert_eq!(panel.feedback_draft(), "");
    }

    #[test]
    fn test_toggle_dead_after_submit() {
        let mut panel = OutputPanel::new();
        panel.toggle_feedback();
        panel.push_feedback('x');
        panel.submit_feedback().unwrap();

        panel.toggle_feedback();
        assert!(!panel.feedback_open(), "toggle must be dead once sent");

        // And a second submit produces nothing
        panel.push_feedback('y');
        assert_eq!(panel.submit_feedback(), None);
    }

    #[test]
    fn test_new_output_resets_scroll_but_not_feedback() {
        let mut panel = OutputPanel::new();
        panel.toggle_feedback();
        panel.push_feedback('x');
        panel.submit_feedback().unwrap();
        panel.scroll_down(10);

        panel.on_new_output();

        assert_eq!(panel.scroll_offset(), 0);
        assert!(panel.feedback_submitted(), "sent stays sent");
    }

    #[test]
    fn test_scroll_clamping() {
        let mut panel = OutputPanel::new();
        panel.scroll_down(100);
        panel.clamp_scroll(30, 10);
        assert_eq!(panel.scroll_offset(), 20);

        panel.scroll_up(5);
        assert_eq!(panel.scroll_offset(), 15);

        // Shorter content clamps further
        panel.clamp_scroll(10, 10);
        assert_eq!(panel.scroll_offset(), 0);
    }

    #[test]
    fn test_wrap_output_preserves_blank_lines() {
        let wrapped = wrap_output("one\n\ntwo words here", 5);
        assert_eq!(wrapped[0], "one");
        assert_eq!(wrapped[1], "");
        assert!(wrapped.len() > 3, "long line should wrap");
    }

    #[test]
    fn test_wrap_output_zero_width() {
        assert!(wrap_output("anything", 0).is_empty());
    }
}
