use emberchat_backend::{BackendResult, IdentityProvider, Session};
use gpui::prelude::FluentBuilder as _;
use gpui::*;
use gpui_component::{
    ActiveTheme, Sizable,
    button::{Button, ButtonVariants},
    h_flex,
    v_flex,
};
use gpui_tokio_bridge::Tokio;
use tokio::sync::oneshot;

use crate::chat::{ChatView, SignInRequested};
use crate::services::AppServices;
use crate::sign_in::SignInView;
use crate::toast::{ToastRequested, ToastStack};

gpui::actions!(emberchat, [Quit]);

/// Root shell: the session gate.
///
/// Holds the only `Option<Session>` in the app. Without a session the
/// sign-in view renders and the chat view never mounts; with one the chat
/// view renders with the session passed down explicitly.
pub struct ChatAppShell {
    services: AppServices,
    session: Option<Session>,
    toasts: Entity<ToastStack>,
    sign_in_view: Entity<SignInView>,
    chat_view: Entity<ChatView>,
    auth_flow_task: Option<Task<Result<(), gpui_tokio_bridge::JoinError>>>,
    auth_result_task: Option<Task<()>>,
}

impl ChatAppShell {
    pub fn new(services: AppServices, window: &mut Window, cx: &mut Context<Self>) -> Self {
        let toasts = cx.new(|_| ToastStack::new());
        let sign_in_view = cx.new(|_| SignInView::new());
        let chat_view = cx.new(|cx| ChatView::new(services.clone(), window, cx));

        cx.subscribe(&sign_in_view, |this, _, event: &SignInRequested, cx| {
            this.handle_sign_in_requested(*event, cx);
        })
        .detach();

        cx.subscribe(&chat_view, |this, _, event: &ToastRequested, cx| {
            this.push_toast(event.clone(), cx);
        })
        .detach();

        Self {
            services,
            session: None,
            toasts,
            sign_in_view,
            chat_view,
            auth_flow_task: None,
            auth_result_task: None,
        }
    }

    fn push_toast(&mut self, request: ToastRequested, cx: &mut Context<Self>) {
        self.toasts.update(cx, |toasts, cx| toasts.push(request, cx));
    }

    fn handle_sign_in_requested(&mut self, event: SignInRequested, cx: &mut Context<Self>) {
        if self.auth_result_task.is_some() {
            // One flow at a time; the browser hand-off is not cancellable.
            return;
        }

        tracing::info!(provider = %event.provider.label(), "starting sign-in flow");

        self.sign_in_view.update(cx, |view, cx| {
            view.set_busy(Some(event.provider), cx);
            view.set_error(None, cx);
        });

        let flow = self.services.identity.sign_in(event.provider);
        let (result_tx, result_rx) = oneshot::channel();

        self.auth_flow_task = Some(Tokio::spawn(cx, async move {
            let _ = result_tx.send(flow.await);
        }));

        self.auth_result_task = Some(cx.spawn(async move |this, cx| {
            let outcome = result_rx.await;
            let _ = this.update(cx, |this, cx| {
                this.finish_sign_in(event.provider, outcome, cx);
            });
        }));
    }

    fn finish_sign_in(
        &mut self,
        provider: IdentityProvider,
        outcome: Result<BackendResult<Session>, oneshot::error::RecvError>,
        cx: &mut Context<Self>,
    ) {
        self.auth_flow_task = None;
        self.auth_result_task = None;
        self.sign_in_view
            .update(cx, |view, cx| view.set_busy(None, cx));

        let (failure, toast) = match outcome {
            Ok(Ok(session)) => {
                self.session = Some(session.clone());
                self.chat_view
                    .update(cx, |chat, cx| chat.set_session(Some(session), cx));
                self.push_toast(
                    ToastRequested::info(
                        "Signed in",
                        format!("Signed in with {}", provider.label()),
                    ),
                    cx,
                );
                cx.notify();
                return;
            }
            Ok(Err(error)) => (error.to_string(), ToastRequested::from_backend_error(&error)),
            Err(_) => {
                let message = "sign-in worker stopped unexpectedly".to_string();
                (
                    message.clone(),
                    ToastRequested::error("Sign-in failed", message),
                )
            }
        };

        tracing::warn!(provider = %provider.label(), error = %failure, "sign-in failed");

        self.sign_in_view
            .update(cx, |view, cx| view.set_error(Some(failure), cx));
        self.push_toast(toast, cx);
        cx.notify();
    }

    fn handle_sign_out(&mut self, cx: &mut Context<Self>) {
        let Some(session) = self.session.take() else {
            return;
        };

        tracing::info!(uid = %session.uid, "signing out");

        self.chat_view
            .update(cx, |chat, cx| chat.set_session(None, cx));

        // Best-effort token revocation; local teardown already happened.
        let revoke = self.services.identity.sign_out(&session);
        Tokio::spawn(cx, async move {
            if let Err(error) = revoke.await {
                tracing::warn!(error = %error, "sign-out revocation failed");
            }
        })
        .detach();

        cx.notify();
    }

    fn render_header(&self, cx: &Context<Self>) -> impl IntoElement {
        let theme = cx.theme();
        let signed_in = self.session.is_some();

        h_flex()
            .id("app-header")
            .w_full()
            .flex_shrink_0()
            .items_center()
            .justify_between()
            .px_4()
            .py_3()
            .bg(theme.background)
            .border_b_1()
            .border_color(theme.border)
            .child(div().text_lg().child("Emberchat"))
            .when(signed_in, |header| {
                header.child(
                    Button::new("sign-out")
                        .small()
                        .danger()
                        .child("Sign Out")
                        .on_click(cx.listener(|this, _, _window, cx| {
                            this.handle_sign_out(cx);
                        })),
                )
            })
    }
}

impl Render for ChatAppShell {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();
        let signed_in = self.session.is_some();

        div()
            .size_full()
            .relative()
            .bg(theme.background)
            .child(
                v_flex()
                    .size_full()
                    .child(self.render_header(cx))
                    .child(
                        div()
                            .id("app-body")
                            .flex_1()
                            .min_h_0()
                            .overflow_hidden()
                            .map(|body| {
                                if signed_in {
                                    body.child(self.chat_view.clone())
                                } else {
                                    body.child(self.sign_in_view.clone())
                                }
                            }),
                    ),
            )
            .child(
                div()
                    .absolute()
                    .bottom(px(16.))
                    .right(px(16.))
                    .child(self.toasts.clone()),
            )
    }
}
