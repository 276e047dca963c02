#![deny(unsafe_code)]

/// Application shell: session gate, header bar, toast overlay.
pub mod app;
/// Chat feed, composer, and message rendering.
pub mod chat;
/// Injected service handles shared by the views.
pub mod services;
/// Provider sign-in view.
pub mod sign_in;
/// Transient toast overlay used for local error recovery.
pub mod toast;
