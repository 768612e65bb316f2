//! Durable-store collaborators.
//!
//! Ownership is part of every query: a record that exists but belongs to
//! someone else is reported exactly like a record that does not exist
//! (`None` or zero rows affected), never as an error.

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};

/// Records that always belong to one owner.
#[async_trait]
pub trait OwnedDao: Send + Sync {
    type Model: Send + Sync + 'static;
    type CreateRequest: Send + Sync + 'static;
    type UpdateRequest: Send + Sync + 'static;
    type Error: Send + 'static;
    type ID: Serialize + DeserializeOwned + Copy + Send + Sync + 'static;
    type Owner: Send + Sync + 'static;

    async fn find_by_id(
        &self, id: Self::ID, owner: &Self::Owner,
    ) -> Result<Option<Self::Model>, Self::Error>;

    async fn all_for_owner(
        &self, owner: &Self::Owner,
    ) -> Result<Vec<Self::Model>, Self::Error>;

    async fn create(
        &self, owner: &Self::Owner, req: Self::CreateRequest,
    ) -> Result<Self::Model, Self::Error>;

    /// `None` when no row matched both id and owner.
    async fn update(
        &self, id: Self::ID, owner: &Self::Owner, req: Self::UpdateRequest,
    ) -> Result<Option<Self::Model>, Self::Error>;

    /// Returns the number of rows removed.
    async fn delete(
        &self, id: Self::ID, owner: &Self::Owner,
    ) -> Result<u64, Self::Error>;

    async fn delete_all_for_owner(
        &self, owner: &Self::Owner,
    ) -> Result<u64, Self::Error>;
}

/// Shared records with no owner.
#[async_trait]
pub trait ReferenceDao: Send + Sync {
    type Model: Send + Sync + 'static;
    type CreateRequest: Send + Sync + 'static;
    type UpdateRequest: Send + Sync + 'static;
    type Error: Send + 'static;
    type ID: Serialize + DeserializeOwned + Copy + Send + Sync + 'static;

    async fn find_by_id(
        &self, id: Self::ID,
    ) -> Result<Option<Self::Model>, Self::Error>;

    async fn all(&self) -> Result<Vec<Self::Model>, Self::Error>;

    async fn create(
        &self, req: Self::CreateRequest,
    ) -> Result<Self::Model, Self::Error>;

    async fn update(
        &self, id: Self::ID, req: Self::UpdateRequest,
    ) -> Result<Option<Self::Model>, Self::Error>;

    async fn delete(&self, id: Self::ID) -> Result<u64, Self::Error>;
}
