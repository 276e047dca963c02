use gpui::*;
use gpui_component::{
    ActiveTheme, IconName, Sizable,
    button::{Button, ButtonVariants},
    input::{Input, InputEvent, InputState},
    v_flex,
};

use crate::chat::events::Submit;

/// True when a draft may produce a submission. Empty and whitespace-only
/// drafts leave the submit control inert.
pub fn draft_is_sendable(draft: &str) -> bool {
    !draft.trim().is_empty()
}

/// Message composer: a growing text input plus a send button.
pub struct MessageInput {
    input_state: Entity<InputState>,
    pending_newline: bool,
}

impl EventEmitter<Submit> for MessageInput {}

impl MessageInput {
    pub fn new(window: &mut Window, cx: &mut Context<Self>) -> Self {
        let input_state = cx.new(|cx| {
            InputState::new(window, cx)
                .placeholder("Say something nice…")
                .clean_on_escape()
                .auto_grow(1, 6)
        });

        cx.subscribe_in(
            &input_state,
            window,
            |this, _, event: &InputEvent, window, cx| {
                if let InputEvent::PressEnter { secondary } = event {
                    if *secondary {
                        this.pending_newline = false;
                        return;
                    }

                    if this.pending_newline {
                        // Shift+Enter inserts the newline manually and still
                        // emits PressEnter; swallow that synthetic enter.
                        this.pending_newline = false;
                    } else {
                        this.trim_trailing_newline(window, cx);
                        this.handle_submit(window, cx);
                    }
                }
            },
        )
        .detach();

        Self {
            input_state,
            pending_newline: false,
        }
    }

    pub fn clear(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        self.input_state.update(cx, |state, cx| {
            state.set_value("", window, cx);
        });
        self.pending_newline = false;
    }

    /// Puts a failed submission back into the composer, unless the user has
    /// already started typing something new.
    pub fn restore_draft(&mut self, draft: &str, window: &mut Window, cx: &mut Context<Self>) {
        let current = self.input_state.read(cx).value().to_string();
        if current.trim().is_empty() {
            self.input_state.update(cx, |state, cx| {
                state.set_value(draft.to_string(), window, cx);
            });
            cx.notify();
        }
    }

    fn handle_shift_enter(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        self.pending_newline = true;
        self.input_state.update(cx, |state, cx| {
            state.insert("\n", window, cx);
        });
        cx.notify();
    }

    fn trim_trailing_newline(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        self.input_state.update(cx, |state, cx| {
            let value = state.value().to_string();
            if let Some(trimmed) = value.strip_suffix('\n') {
                state.set_value(trimmed.to_string(), window, cx);
            }
        });
    }

    fn handle_submit(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        let draft = self.input_state.read(cx).value().to_string();
        if !draft_is_sendable(&draft) {
            return;
        }

        cx.emit(Submit::new(draft));
        self.clear(window, cx);
    }
}

impl Render for MessageInput {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();

        v_flex()
            .bg(theme.background)
            .gap_2()
            .p_3()
            .child(
                div()
                    .w_full()
                    .px_3()
                    .py_2()
                    .rounded_lg()
                    .border_1()
                    .border_color(theme.border)
                    .bg(theme.background)
                    .on_key_down(cx.listener(|this, event: &KeyDownEvent, window, cx| {
                        if event.keystroke.key == "enter" && event.keystroke.modifiers.shift {
                            this.handle_shift_enter(window, cx);
                        }
                    }))
                    .child(Input::new(&self.input_state).w_full()),
            )
            .child(
                div().w_full().flex().justify_end().child(
                    Button::new("send")
                        .small()
                        .primary()
                        .icon(IconName::ArrowUp)
                        .child("Send")
                        .on_click(cx.listener(|this, _, window, cx| {
                            this.handle_submit(window, cx);
                        })),
                ),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_whitespace_drafts_are_inert() {
        assert!(!draft_is_sendable(""));
        assert!(!draft_is_sendable("   "));
        assert!(!draft_is_sendable("\n\t"));
    }

    #[test]
    fn nonblank_drafts_are_sendable() {
        assert!(draft_is_sendable("hello"));
        assert!(draft_is_sendable("  hello  "));
    }
}
