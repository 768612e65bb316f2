use async_trait::async_trait;
use event_bus::{Ack, InboundMessage, MessageHandler, PermanentFailure};
use todo_errors::TodoResult;
use todo_models::OwnerId;
use todo_repositories::{OwnerPurge, TodoServices};
use tracing::{instrument, warn};

use crate::payload::owner_from_payload;

/// Wipes everything a deleted user owned: tasks, lists and every cached
/// view of them. Safe to run any number of times for the same user.
#[derive(Clone)]
pub struct CascadeHandler {
    services: TodoServices,
}

impl CascadeHandler {
    pub fn new(services: TodoServices) -> Self { Self { services } }

    /// Tasks and lists go first, then every `users:<owner>:*` cache entry.
    pub async fn handle_owner_deleted(
        &self, owner: &OwnerId,
    ) -> TodoResult<OwnerPurge> {
        self.services.purge_owner(owner).await
    }
}

#[async_trait]
impl MessageHandler for CascadeHandler {
    #[instrument(
        skip_all,
        fields(tag = %message.tag, redelivered = message.redelivered)
    )]
    async fn handle(
        &self, message: InboundMessage,
    ) -> Result<Ack, PermanentFailure> {
        let owner = owner_from_payload(&message.payload).inspect_err(|e| {
            warn!(error = %e, "Ignoring user.delete without a usable userId");
        })?;

        self.handle_owner_deleted(&owner)
            .await
            .map(|_| Ack)
            .map_err(|e| PermanentFailure::Handler(e.to_string()))
    }
}
