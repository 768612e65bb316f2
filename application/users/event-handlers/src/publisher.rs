use std::sync::Arc;

use event_bus::{BrokerError, Envelope, MessageBroker};
use todo_models::OwnerId;
use tracing::{info, instrument};

use crate::{USER_DELETE_TOPIC, payload::UserDeleted};

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Broker(#[from] BrokerError),
}

/// Announces a deleted user so other services can drop their data.
#[derive(Clone)]
pub struct UserDeletionPublisher {
    broker: Arc<dyn MessageBroker>,
}

impl UserDeletionPublisher {
    pub fn new(broker: Arc<dyn MessageBroker>) -> Self { Self { broker } }

    #[instrument(skip(self), fields(owner_id = %user_id))]
    pub async fn publish(&self, user_id: &OwnerId) -> Result<(), PublishError> {
        let event = Envelope::new(USER_DELETE_TOPIC, UserDeleted {
            user_id: user_id.to_string(),
        });
        self.broker.publish(USER_DELETE_TOPIC, event.to_bytes()?).await?;
        info!("Published user deletion");
        Ok(())
    }
}
