/// Event contracts for view wiring.
pub mod events;
/// Client-side feed aggregate and subscription lifecycle.
pub mod feed;
pub mod message_input;
pub mod message_list;
pub mod scroll;
/// Draft-to-append mapping.
pub mod submission;
pub mod view;

pub use events::{SignInRequested, Submit};
pub use feed::{Feed, FeedPhase};
pub use message_input::MessageInput;
pub use message_list::{AvatarSource, BubbleVariant, MessageList, avatar_source, bubble_variant};
pub use scroll::FollowScroll;
pub use submission::prepare_submission;
pub use view::ChatView;
