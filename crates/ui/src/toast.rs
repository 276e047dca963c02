use std::time::Duration;

use emberchat_backend::{BackendError, FailureKind};
use gpui::*;
use gpui_component::{
    ActiveTheme, IconName, Sizable,
    button::{Button, ButtonVariants},
    h_flex,
    label::Label,
    v_flex,
};

/// How long a toast stays visible before dismissing itself.
pub const TOAST_DISMISS_AFTER: Duration = Duration::from_secs(6);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Error,
}

/// Emitted by views that want the shell to surface a transient message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToastRequested {
    pub level: ToastLevel,
    pub title: SharedString,
    pub message: SharedString,
}

impl ToastRequested {
    pub fn info(title: impl Into<SharedString>, message: impl Into<SharedString>) -> Self {
        Self {
            level: ToastLevel::Info,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn error(title: impl Into<SharedString>, message: impl Into<SharedString>) -> Self {
        Self {
            level: ToastLevel::Error,
            title: title.into(),
            message: message.into(),
        }
    }

    /// Maps a backend failure to its toast, titled by failure kind.
    pub fn from_backend_error(error: &BackendError) -> Self {
        Self::error(title_for(error.kind()), error.to_string())
    }
}

fn title_for(kind: FailureKind) -> &'static str {
    match kind {
        FailureKind::AuthFlowFailed => "Sign-in failed",
        FailureKind::MessageSubmitFailed => "Message not sent",
        FailureKind::FeedSubscriptionLost => "Feed connection lost",
    }
}

struct ToastEntry {
    id: u64,
    level: ToastLevel,
    title: SharedString,
    message: SharedString,
}

/// Bottom-right stack of self-dismissing toasts.
pub struct ToastStack {
    entries: Vec<ToastEntry>,
    next_id: u64,
}

impl ToastStack {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 1,
        }
    }

    pub fn push(&mut self, request: ToastRequested, cx: &mut Context<Self>) {
        let id = self.next_id;
        self.next_id = self.next_id.saturating_add(1);

        self.entries.push(ToastEntry {
            id,
            level: request.level,
            title: request.title,
            message: request.message,
        });
        cx.notify();

        cx.spawn(async move |this, cx| {
            cx.background_executor().timer(TOAST_DISMISS_AFTER).await;
            let _ = this.update(cx, |this, cx| {
                this.dismiss(id, cx);
            });
        })
        .detach();
    }

    pub fn dismiss(&mut self, id: u64, cx: &mut Context<Self>) {
        self.entries.retain(|entry| entry.id != id);
        cx.notify();
    }

    fn render_entry(&self, entry: &ToastEntry, cx: &Context<Self>) -> AnyElement {
        let theme = cx.theme();
        let id = entry.id;
        let accent = match entry.level {
            ToastLevel::Info => theme.primary,
            ToastLevel::Error => theme.danger,
        };

        h_flex()
            .w(px(320.))
            .items_start()
            .gap_2()
            .p_3()
            .rounded_lg()
            .border_1()
            .border_color(accent)
            .bg(theme.background)
            .child(
                v_flex()
                    .flex_1()
                    .min_w_0()
                    .gap_1()
                    .child(
                        Label::new(entry.title.clone())
                            .text_sm()
                            .text_color(accent),
                    )
                    .child(
                        Label::new(entry.message.clone())
                            .text_xs()
                            .text_color(theme.muted_foreground),
                    ),
            )
            .child(
                Button::new(format!("toast-dismiss-{id}"))
                    .ghost()
                    .small()
                    .icon(IconName::CircleX)
                    .on_click(cx.listener(move |this, _, _window, cx| {
                        this.dismiss(id, cx);
                    })),
            )
            .into_any_element()
    }
}

impl Default for ToastStack {
    fn default() -> Self {
        Self::new()
    }
}

impl Render for ToastStack {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        v_flex().gap_2().items_end().children(
            self.entries
                .iter()
                .map(|entry| self.render_entry(entry, cx))
                .collect::<Vec<_>>(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toast_titles_follow_the_failure_kind() {
        assert_eq!(title_for(FailureKind::AuthFlowFailed), "Sign-in failed");
        assert_eq!(
            title_for(FailureKind::MessageSubmitFailed),
            "Message not sent"
        );
        assert_eq!(
            title_for(FailureKind::FeedSubscriptionLost),
            "Feed connection lost"
        );
    }

    #[test]
    fn backend_errors_become_error_toasts() {
        let error = BackendError::SubmitStatus {
            stage: "append-http-status",
            status: 503,
            body: "unavailable".to_string(),
        };
        let toast = ToastRequested::from_backend_error(&error);
        assert_eq!(toast.level, ToastLevel::Error);
        assert_eq!(toast.title.as_ref(), "Message not sent");
        assert!(toast.message.as_ref().contains("503"));
    }
}
