use std::sync::Arc;

use gpui::*;
use gpui_component::Root;

use emberchat_backend::{BackendSettings, HttpIdentityClient, RemoteChatBackend};
use emberchat_filter::WordListFilter;
use ui::app::{ChatAppShell, Quit};
use ui::services::AppServices;

/// Application entry point.
///
/// Bootstraps the GPUI application with:
/// 1. Asset loading via gpui-component-assets
/// 2. gpui-component initialization (required for Root and inputs)
/// 3. Backend settings loaded from the config file and environment
/// 4. Service handles constructed once and passed down to the shell
fn main() {
    tracing_subscriber::fmt::init();

    let app = Application::new().with_assets(gpui_component_assets::Assets);

    app.run(|cx| {
        gpui_tokio_bridge::init(cx);

        // Initialize gpui-component - REQUIRED before any Root usage
        gpui_component::init(cx);

        let settings = BackendSettings::load();
        if !settings.is_configured() {
            tracing::warn!(
                "backend project credentials are not configured; set EMBERCHAT_PROJECT_ID and \
                 EMBERCHAT_API_KEY or edit {:?}",
                BackendSettings::default_config_path()
            );
        }

        let services = AppServices::new(
            Arc::new(HttpIdentityClient::new(settings.clone())),
            Arc::new(RemoteChatBackend::new(settings)),
            Arc::new(WordListFilter::with_default_terms()),
        );

        cx.on_action(|_: &Quit, cx| {
            cx.quit();
        });

        cx.bind_keys([KeyBinding::new("cmd-q", Quit, None)]);

        // Spawn async window creation to ensure all initialization is complete
        cx.spawn(async move |cx| {
            cx.update(|cx| {
                let options = WindowOptions {
                    window_bounds: Some(WindowBounds::Windowed(Bounds::centered(
                        None,
                        size(px(480.), px(720.)),
                        cx,
                    ))),
                    titlebar: Some(TitlebarOptions {
                        title: Some("Emberchat".into()),
                        ..Default::default()
                    }),
                    ..Default::default()
                };

                cx.open_window(options, |window, cx| {
                    let shell = cx.new(|cx| ChatAppShell::new(services.clone(), window, cx));

                    // Wrap in Root for gpui-component composition
                    cx.new(|cx| Root::new(shell, window, cx))
                })
                .expect("failed to open main window");

                cx.activate(true);
            })
        })
        .detach();
    });
}
