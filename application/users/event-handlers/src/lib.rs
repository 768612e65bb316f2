//! Reactions to user lifecycle events published by the authentication
//! service.

mod cascade;
mod payload;
mod publisher;

pub use cascade::CascadeHandler;
pub use payload::{UserDeleted, owner_from_payload};
pub use publisher::{PublishError, UserDeletionPublisher};

/// Topic of the event sent after a user account is deleted.
pub const USER_DELETE_TOPIC: &str = "user.delete";
