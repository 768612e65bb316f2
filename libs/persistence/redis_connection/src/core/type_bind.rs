use std::{borrow::Cow, marker::PhantomData, time::Duration};

use serde::{Serialize, de::DeserializeOwned};

use super::key::{CacheKey, CacheKeyArg1, CacheKeyAutoConstruct};
use crate::key_store::KeyStore;

/// A logical key bound to a [`KeyStore`], typed by the value stored under it.
pub struct Cached<'s, T> {
    store: &'s KeyStore,
    key: Cow<'static, str>,
    _value: PhantomData<fn() -> T>,
}

impl<'s, T> Cached<'s, T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    pub fn new(store: &'s KeyStore, key: Cow<'static, str>) -> Self {
        Self {
            store,
            key,
            _value: PhantomData,
        }
    }

    pub fn key(&self) -> &str { &self.key }

    /// A miss and an unreachable backend both read as `None`.
    pub async fn try_get(&self) -> Option<T> {
        self.store.get(&self.key).await
    }

    pub async fn set(&self, value: &T) { self.store.set(&self.key, value).await }

    pub async fn set_with_expire(&self, value: &T, ttl: Duration) {
        self.store.set_with_ttl(&self.key, value, ttl).await
    }

    pub async fn remove(&self) { self.store.delete(&self.key).await }
}

pub trait CacheTypeBind: CacheKey {
    fn bind_with_args<'s>(
        &self, store: &'s KeyStore, args: <Self as CacheKey>::Args<'_>,
    ) -> Cached<'s, Self::Value> {
        let key = CacheKey::get_key_with_args(self, args);
        Cached::new(store, key)
    }

    fn bind_with<'s>(
        &self, store: &'s KeyStore,
        arg: <<Self as CacheKey>::Args<'_> as CacheKeyArg1>::Arg0,
    ) -> Cached<'s, Self::Value>
    where
        for<'r> <Self as CacheKey>::Args<'r>: CacheKeyArg1,
    {
        CacheTypeBind::bind_with_args(
            self,
            store,
            <<Self as CacheKey>::Args<'_> as CacheKeyArg1>::construct(arg),
        )
    }

    fn bind<'s>(&self, store: &'s KeyStore) -> Cached<'s, Self::Value>
    where
        for<'r> <Self as CacheKey>::Args<'r>: CacheKeyAutoConstruct,
    {
        CacheTypeBind::bind_with_args(
            self,
            store,
            CacheKeyAutoConstruct::construct(),
        )
    }
}

impl<K: CacheKey> CacheTypeBind for K {}
