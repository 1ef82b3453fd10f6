//! Account demo service
//!
//! A complete model service over an in-memory account store, exposed as
//! `modelrpc.demo.AccountService`.

pub mod messages;
pub mod models;
pub mod serializer;
pub mod service;

pub use models::Account;
pub use serializer::AccountSerializer;
pub use service::{AccountAttributes, AccountService, ReadOnlyAccountService};

use crate::error::StoreError;
use crate::store::{BaseQuerySet, InMemoryStore};
use std::sync::Arc;

/// Account store with unique usernames, loaded with `seed`
pub fn account_store(seed: Vec<Account>) -> Result<InMemoryStore<Account>, StoreError> {
    let store = InMemoryStore::new().with_unique("username");
    store.seed(seed)?;
    Ok(store)
}

pub fn account_queryset(store: &InMemoryStore<Account>) -> BaseQuerySet<Account> {
    BaseQuerySet::new(Arc::new(store.clone()))
}
