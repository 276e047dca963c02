use emberchat_backend::IdentityProvider;
use gpui::prelude::FluentBuilder;
use gpui::*;
use gpui_component::{
    ActiveTheme,
    button::{Button, ButtonVariants},
    label::Label,
    v_flex,
};

use crate::chat::SignInRequested;

/// Sign-in gate: one button per identity provider.
///
/// A failed flow leaves the buttons enabled as the retry affordance; the
/// failure itself is shown inline and as a toast by the shell.
pub struct SignInView {
    busy_provider: Option<IdentityProvider>,
    last_error: Option<SharedString>,
}

impl EventEmitter<SignInRequested> for SignInView {}

impl SignInView {
    pub fn new() -> Self {
        Self {
            busy_provider: None,
            last_error: None,
        }
    }

    pub fn set_busy(&mut self, provider: Option<IdentityProvider>, cx: &mut Context<Self>) {
        self.busy_provider = provider;
        cx.notify();
    }

    pub fn set_error(&mut self, error: Option<String>, cx: &mut Context<Self>) {
        self.last_error = error.map(SharedString::from);
        cx.notify();
    }

    fn request(&mut self, provider: IdentityProvider, cx: &mut Context<Self>) {
        if self.busy_provider.is_some() {
            // One flow at a time; the in-flight browser hand-off is not
            // cancellable.
            return;
        }

        cx.emit(SignInRequested { provider });
    }

    fn render_provider_button(
        &self,
        provider: IdentityProvider,
        cx: &Context<Self>,
    ) -> AnyElement {
        let busy = self.busy_provider == Some(provider);
        let label = if busy {
            format!("Waiting for {}…", provider.label())
        } else {
            format!("Sign in with {}", provider.label())
        };

        let button = Button::new(format!("sign-in-{}", provider.id()))
            .child(label)
            .on_click(cx.listener(move |this, _, _window, cx| {
                this.request(provider, cx);
            }));

        match provider {
            IdentityProvider::Google => button.primary().into_any_element(),
            IdentityProvider::Github => button.into_any_element(),
        }
    }
}

impl Default for SignInView {
    fn default() -> Self {
        Self::new()
    }
}

impl Render for SignInView {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();
        let busy = self.busy_provider.is_some();

        v_flex()
            .id("sign-in-view")
            .size_full()
            .items_center()
            .justify_center()
            .gap_3()
            .bg(theme.background)
            .child(div().text_xl().child("Emberchat"))
            .child(
                div()
                    .text_sm()
                    .text_color(theme.muted_foreground)
                    .child("Say something nice."),
            )
            .child(
                v_flex()
                    .gap_2()
                    .pt_4()
                    .items_center()
                    .children(
                        IdentityProvider::ALL
                            .into_iter()
                            .map(|provider| self.render_provider_button(provider, cx)),
                    ),
            )
            .when(busy, |el| {
                el.child(
                    Label::new("Complete the sign-in in your browser…")
                        .text_xs()
                        .text_color(theme.muted_foreground),
                )
            })
            .when_some(self.last_error.clone(), |el, error| {
                el.child(Label::new(error).text_xs().text_color(theme.danger))
            })
    }
}
