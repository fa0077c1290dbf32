//! # Document Store
//!
//! A single-document store run as an actor. It is the persistence seam of the dispatch core:
//! every order lives here, and every order state change goes through it.
//!
//! ## Why an actor?
//!
//! The store owns its map of documents inside one Tokio task and processes requests one at a
//! time. That gives the one primitive the dispatch core needs from storage: an **atomic
//! conditional update**. A document action sees the current persisted state, decides whether
//! its precondition still holds, and either commits or fails, with no other request able to
//! interleave. Any durable store offering single-document compare-and-set could replace this
//! module without changing the callers.
//!
//! ## Layers
//!
//! 1. **Document Layer** ([`Document`]) - the data and its rules (creation, actions, commit hook)
//! 2. **Runtime Layer** ([`StoreActor`]) - the sequential request loop and the draft/commit cycle
//! 3. **Interface Layer** ([`StoreClient`], [`DocumentClient`]) - typed async requests
//!
//! ## Change feed
//!
//! After every successful create or action, the store awaits [`Document::on_commit`] before it
//! reads the next request. Whatever the hook forwards is therefore emitted in commit order,
//! which is how order status notifications keep their per-order ordering.
//!
//! ## Retention
//!
//! There is no delete request. Documents are retained for the life of the store.
//!
//! ## Testing
//!
//! See the [`mock`] module for a fluent [`MockStore`](mock::MockStore) and raw-channel helpers.

pub mod actor;
pub mod client;
pub mod client_trait;
pub mod document;
pub mod error;
pub mod message;
pub mod mock;

pub use actor::StoreActor;
pub use client::StoreClient;
pub use client_trait::DocumentClient;
pub use document::Document;
pub use error::StoreError;
pub use message::{Filter, Response, StoreRequest};
