use super::state::Assembler;
use crate::state::turn::{Lifecycle, Role, Turn};

impl Assembler {
    /// Open a fresh thinking turn with the given placeholder status. Callers
    /// must have checked that no turn is currently open.
    pub(super) fn open_thinking_turn(&mut self, status: &str) -> &mut Turn {
        let id = self.allocate_turn_id();
        let mut turn = Turn::new(id, Role::Agent, Lifecycle::Thinking);
        turn.status = Some(status.to_string());
        self.open_turn.insert(turn)
    }

    /// Accumulate extended-reasoning text and re-render the visible text as a
    /// collapsible wrapper around it. The reasoning itself is append-only;
    /// the wrapper just grows with it.
    pub(super) fn append_reasoning(&mut self, detail: &str) {
        if self.open_turn.is_none() {
            self.open_thinking_turn("Thinking…");
        }
        let turn = self.open_turn.as_mut().expect("open turn was just ensured");

        let reasoning = turn.reasoning_text.get_or_insert_with(String::new);
        if !reasoning.is_empty() {
            reasoning.push('\n');
        }
        reasoning.push_str(detail);
        let rendered = render_reasoning_wrapper(reasoning);

        if turn.lifecycle == Lifecycle::Thinking {
            turn.status = Some("Thinking…".to_string());
            turn.visible_text = rendered;
        }
    }
}

/// The UI renders markdown with inline HTML, so the reasoning accumulator is
/// wrapped in a collapsed `<details>` block.
pub(super) fn render_reasoning_wrapper(reasoning: &str) -> String {
    format!("<details><summary>Thinking</summary>\n\n{reasoning}\n\n</details>")
}
