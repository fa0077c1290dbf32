//! # Document Trait
//!
//! The contract a type must satisfy to be kept in a [`StoreActor`](crate::store::StoreActor).
//!
//! Associated types keep every request strongly typed: an order store accepts only order
//! creation payloads and order actions, and returns the order's own error type.
//!
//! # Provided Methods (Hooks)
//! - [`Document::on_create`] - validation after construction, before the first insert
//! - [`Document::on_commit`] - change-feed hook, awaited after every successful write
//!
//! Both default to doing nothing.

use async_trait::async_trait;
use std::fmt::{Debug, Display};
use std::hash::Hash;

#[async_trait]
pub trait Document: Clone + Send + Sync + 'static {
    /// Unique identifier. Generated by the store from a `u32` sequence.
    type Id: Eq + Hash + Ord + Clone + Send + Sync + Display + Debug + From<u32>;

    /// Payload required to create a new document.
    type Create: Send + Sync + Debug;

    /// Conditional operations applied atomically to one document.
    type Action: Send + Sync + Debug;

    /// What a successful action returns.
    type ActionResult: Send + Sync + Debug;

    /// Runtime dependencies injected into the hooks when the store starts.
    /// Use `()` if none are needed.
    type Context: Send + Sync;

    /// The document's error type. It crosses the store boundary boxed and can be
    /// recovered by downcasting.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Builds the document from its new id and creation payload.
    fn from_create_params(id: Self::Id, params: Self::Create) -> Result<Self, Self::Error>;

    /// Called after construction and before the document is inserted.
    async fn on_create(&mut self, _ctx: &Self::Context) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Applies an action to a draft copy of the document.
    ///
    /// The store commits the draft only when this returns `Ok`. An implementation may
    /// therefore mutate `self` freely before discovering that it has to fail.
    async fn handle_action(
        &mut self,
        action: Self::Action,
        ctx: &Self::Context,
    ) -> Result<Self::ActionResult, Self::Error>;

    /// Called with the committed state after every successful create or action.
    async fn on_commit(&self, _ctx: &Self::Context) {}
}
