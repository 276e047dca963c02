use emberchat_backend::{
    BackendResult, FeedEvent, FeedHandle, FeedQuery, MessageRecord, Session,
};
use gpui::prelude::FluentBuilder as _;
use gpui::*;
use gpui_component::{
    ActiveTheme, Sizable,
    button::{Button, ButtonVariants},
    h_flex,
    label::Label,
    v_flex,
};
use gpui_tokio_bridge::Tokio;
use tokio::sync::oneshot;

use crate::chat::events::Submit;
use crate::chat::feed::{Feed, FeedPhase};
use crate::chat::submission::prepare_submission;
use crate::chat::{MessageInput, MessageList};
use crate::services::AppServices;
use crate::toast::ToastRequested;

/// Chat screen coordinator: owns the feed subscription, the message list,
/// and the composer.
///
/// The entity is created once with the shell and stays dormant until a
/// session is handed in; the shell only renders it while signed in. Clearing
/// the session drops the subscription tasks, which unsubscribes.
pub struct ChatView {
    services: AppServices,
    session: Option<Session>,
    feed: Feed,
    phase: FeedPhase,
    message_list: Entity<MessageList>,
    message_input: Entity<MessageInput>,
    feed_worker_task: Option<Task<Result<(), gpui_tokio_bridge::JoinError>>>,
    feed_reader_task: Option<Task<()>>,
    /// Draft to put back into the composer after a failed append.
    pending_restore: Option<String>,
}

impl EventEmitter<ToastRequested> for ChatView {}

impl ChatView {
    pub fn new(services: AppServices, window: &mut Window, cx: &mut Context<Self>) -> Self {
        let message_list = cx.new(MessageList::new);
        let message_input = cx.new(|cx| MessageInput::new(window, cx));

        cx.subscribe(&message_input, |this, _, event: &Submit, cx| {
            this.handle_submit(event.clone(), cx);
        })
        .detach();

        Self {
            services,
            session: None,
            feed: Feed::with_default_limit(),
            phase: FeedPhase::default(),
            message_list,
            message_input,
            feed_worker_task: None,
            feed_reader_task: None,
            pending_restore: None,
        }
    }

    /// Installs or clears the session driving this view. With a session the
    /// feed subscription starts; without one everything is torn down.
    pub fn set_session(&mut self, session: Option<Session>, cx: &mut Context<Self>) {
        match session {
            Some(session) => {
                self.message_list.update(cx, |list, cx| {
                    list.set_viewer(Some(session.uid.clone()), cx);
                    list.reset_scroll_tracking(cx);
                });
                self.session = Some(session);
                self.resubscribe(cx);
            }
            None => {
                self.session = None;
                // Dropping the reader drops the event stream, which cancels
                // the worker.
                self.feed_worker_task = None;
                self.feed_reader_task = None;
                self.feed.clear();
                self.phase = FeedPhase::default();
                self.pending_restore = None;
                self.message_list.update(cx, |list, cx| {
                    list.set_viewer(None, cx);
                    list.set_messages(Vec::new(), cx);
                });
            }
        }

        cx.notify();
    }

    /// (Re)opens the live subscription. Also the target of the Reconnect
    /// affordance after a lost feed.
    pub fn resubscribe(&mut self, cx: &mut Context<Self>) {
        let Some(session) = self.session.clone() else {
            return;
        };

        self.feed_worker_task = None;
        self.feed_reader_task = None;
        self.feed.clear();
        self.phase = FeedPhase::Connecting;
        self.sync_messages(cx, true);

        match self
            .services
            .backend
            .subscribe_messages(&session, FeedQuery::default())
        {
            Ok(FeedHandle { stream, worker }) => {
                self.feed_worker_task = Some(Tokio::spawn(cx, worker));
                self.feed_reader_task = Some(cx.spawn(async move |this, cx| {
                    let mut stream = stream;
                    while let Some(event) = stream.recv().await {
                        if this
                            .update(cx, |this, cx| this.handle_feed_event(event, cx))
                            .is_err()
                        {
                            return;
                        }
                    }

                    let _ = this.update(cx, |this, cx| this.handle_feed_stream_closed(cx));
                }));
            }
            Err(error) => {
                self.mark_feed_lost(error.to_string(), cx);
            }
        }

        cx.notify();
    }

    fn handle_feed_event(&mut self, event: FeedEvent, cx: &mut Context<Self>) {
        match event {
            FeedEvent::Snapshot(records) => {
                self.feed.replace(records);
                self.phase = FeedPhase::Live;
                self.sync_messages(cx, false);
            }
            FeedEvent::Upserted(record) => {
                self.feed.upsert(record);
                self.phase = FeedPhase::Live;
                self.sync_messages(cx, false);
            }
            FeedEvent::Lost(reason) => {
                self.mark_feed_lost(reason, cx);
            }
        }

        cx.notify();
    }

    fn handle_feed_stream_closed(&mut self, cx: &mut Context<Self>) {
        self.feed_worker_task = None;
        self.feed_reader_task = None;

        // A stream that ends without a Lost event is still a dead
        // subscription; surface it unless teardown was deliberate.
        if self.session.is_some() && !matches!(self.phase, FeedPhase::Lost { .. }) {
            self.mark_feed_lost("feed stream ended unexpectedly".to_string(), cx);
        }
    }

    fn mark_feed_lost(&mut self, reason: String, cx: &mut Context<Self>) {
        tracing::warn!(reason = %reason, "feed subscription lost");
        self.phase = FeedPhase::Lost {
            reason: reason.clone(),
        };
        cx.emit(ToastRequested::error("Feed connection lost", reason));
        cx.notify();
    }

    fn handle_submit(&mut self, event: Submit, cx: &mut Context<Self>) {
        let Some(session) = self.session.clone() else {
            return;
        };

        let Some(new_message) =
            prepare_submission(&session, &event.text, self.services.filter.as_ref())
        else {
            return;
        };

        // Fire-and-forget append: the message shows up through the feed like
        // it does for every other viewer. Both tasks are detached so an
        // in-flight append survives view teardown.
        let draft_backup = event.text.clone();
        let append = self.services.backend.append_message(&session, new_message);
        let (result_tx, result_rx) = oneshot::channel();

        Tokio::spawn(cx, async move {
            let _ = result_tx.send(append.await);
        })
        .detach();

        cx.spawn(async move |this, cx| {
            let outcome = result_rx.await;
            let _ = this.update(cx, |this, cx| {
                this.finish_append(draft_backup, outcome, cx);
            });
        })
        .detach();

        self.message_list
            .update(cx, |list, cx| list.request_scroll_to_bottom(cx));
    }

    fn finish_append(
        &mut self,
        draft_backup: String,
        outcome: Result<BackendResult<MessageRecord>, oneshot::error::RecvError>,
        cx: &mut Context<Self>,
    ) {
        let toast = match outcome {
            Ok(Ok(record)) => {
                tracing::debug!(message_id = %record.id, "message appended");
                return;
            }
            Ok(Err(error)) => ToastRequested::from_backend_error(&error),
            Err(_) => {
                ToastRequested::error("Message not sent", "append worker stopped unexpectedly")
            }
        };

        tracing::warn!(error = %toast.message, "message append failed");
        cx.emit(toast);

        // Hand the draft back so the user can retry; applied on the next
        // frame because restoring needs the window.
        self.pending_restore = Some(draft_backup);
        cx.notify();
    }

    fn sync_messages(&mut self, cx: &mut Context<Self>, reset_scroll: bool) {
        let messages = self.feed.messages().to_vec();
        self.message_list.update(cx, |list, cx| {
            if reset_scroll {
                list.reset_scroll_tracking(cx);
            }
            list.set_messages(messages, cx);
        });
    }

    fn render_status_row(&self, cx: &Context<Self>) -> Option<AnyElement> {
        let theme = cx.theme();

        match &self.phase {
            FeedPhase::Live => None,
            FeedPhase::Connecting => Some(
                h_flex()
                    .w_full()
                    .px_4()
                    .py_1()
                    .border_b_1()
                    .border_color(theme.border)
                    .child(
                        Label::new("Connecting to the feed…")
                            .text_xs()
                            .text_color(theme.muted_foreground),
                    )
                    .into_any_element(),
            ),
            FeedPhase::Lost { reason } => Some(
                h_flex()
                    .w_full()
                    .items_center()
                    .justify_between()
                    .gap_2()
                    .px_4()
                    .py_2()
                    .border_b_1()
                    .border_color(theme.border)
                    .bg(theme.danger.opacity(0.1))
                    .child(
                        Label::new(format!("Feed connection lost: {reason}"))
                            .text_xs()
                            .text_color(theme.danger),
                    )
                    .child(
                        Button::new("reconnect-feed")
                            .small()
                            .primary()
                            .child("Reconnect")
                            .on_click(cx.listener(|this, _, _window, cx| {
                                this.resubscribe(cx);
                            })),
                    )
                    .into_any_element(),
            ),
        }
    }
}

impl Render for ChatView {
    fn render(&mut self, window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        if let Some(draft) = self.pending_restore.take() {
            self.message_input.update(cx, |input, cx| {
                input.restore_draft(&draft, window, cx);
            });
        }

        let theme = cx.theme();
        let status_row = self.render_status_row(cx);

        v_flex()
            .id("chat-view")
            .size_full()
            .min_h_0()
            .overflow_hidden()
            .bg(theme.background)
            .when_some(status_row, |el, status| el.child(status))
            .child(
                div()
                    .id("chat-view-feed")
                    .flex_1()
                    .min_h_0()
                    .child(self.message_list.clone()),
            )
            .child(
                div()
                    .id("chat-view-composer")
                    .flex_shrink_0()
                    .w_full()
                    .border_t_1()
                    .border_color(theme.border)
                    .child(self.message_input.clone()),
            )
    }
}
