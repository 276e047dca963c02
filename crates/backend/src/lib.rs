//! Typed client SDK for the managed chat backend.
//!
//! Everything durable lives on the other side of these traits: the identity
//! service owns sessions, the realtime document store owns messages. This
//! crate provides the capability traits the UI depends on plus the HTTP and
//! WebSocket adapters that implement them against a real project.

pub mod auth;
pub mod config;
pub mod error;
pub mod feed;
pub mod remote;
pub mod types;
mod wire;

pub use auth::HttpIdentityClient;
pub use config::BackendSettings;
pub use error::{BackendError, BackendResult, FailureKind};
pub use feed::{BoxFuture, FeedEvent, FeedEventStream, FeedHandle, FeedWorker};
pub use remote::RemoteChatBackend;
pub use types::{
    DEFAULT_FEED_LIMIT, FeedQuery, IdentityProvider, MessageId, MessageRecord, NewMessage,
    Session, UserId,
};

/// Brokered sign-in/sign-out against the external identity service.
///
/// Implementations own the whole flow; callers only observe the resulting
/// `Session` or error. Injected as a handle so views can be driven by fakes.
pub trait IdentityClient: Send + Sync {
    fn sign_in(&self, provider: IdentityProvider) -> BoxFuture<'static, BackendResult<Session>>;
    fn sign_out(&self, session: &Session) -> BoxFuture<'static, BackendResult<()>>;
}

/// Live access to the message collection: one bounded, time-ordered
/// subscription plus fire-and-forget appends.
pub trait ChatBackend: Send + Sync {
    /// Opens a live query over the message collection. The returned worker
    /// must be spawned on the tokio runtime; dropping the stream
    /// unsubscribes.
    fn subscribe_messages(&self, session: &Session, query: FeedQuery)
    -> BackendResult<FeedHandle>;

    /// Appends one message. The backend assigns the document id and the
    /// creation timestamp.
    fn append_message(
        &self,
        session: &Session,
        new_message: NewMessage,
    ) -> BoxFuture<'static, BackendResult<MessageRecord>>;
}
