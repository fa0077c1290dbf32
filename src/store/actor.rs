//! # Store Actor
//!
//! The server half of the store. It owns every document and drains its request channel one
//! message at a time, so no two writes to the same document can interleave.

use crate::store::client::StoreClient;
use crate::store::document::Document;
use crate::store::error::StoreError;
use crate::store::message::StoreRequest;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Generic store actor for one document type.
///
/// # Operations
///
/// * **Create**: takes the next id from the sequence, builds the document, runs
///   [`Document::on_create`], inserts it, then runs [`Document::on_commit`].
/// * **Get**: clones the document out, if present.
/// * **List**: clones out every matching document, sorted by id.
/// * **Action**: clones the document into a draft and runs [`Document::handle_action`] on it.
///   On `Ok` the draft replaces the stored document and [`Document::on_commit`] runs; on `Err`
///   the draft is discarded and the stored document is untouched.
pub struct StoreActor<T: Document> {
    receiver: mpsc::Receiver<StoreRequest<T>>,
    documents: HashMap<T::Id, T>,
    next_id: u32,
}

impl<T: Document> StoreActor<T> {
    /// Creates the actor and a client bound to it.
    ///
    /// `buffer_size` is the request channel capacity; clients wait when it is full.
    pub fn new(buffer_size: usize) -> (Self, StoreClient<T>) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let actor = Self {
            receiver,
            documents: HashMap::new(),
            next_id: 1,
        };
        (actor, StoreClient::new(sender))
    }

    /// Runs the request loop until every client has been dropped.
    ///
    /// `context` is handed to each document hook.
    pub async fn run(mut self, context: T::Context) {
        let document_type = std::any::type_name::<T>()
            .split("::")
            .last()
            .unwrap_or("Unknown");
        info!(document_type, "Store started");

        while let Some(msg) = self.receiver.recv().await {
            match msg {
                StoreRequest::Create { params, respond_to } => {
                    debug!(document_type, ?params, "Create");
                    let id = T::Id::from(self.next_id);

                    let mut document = match T::from_create_params(id.clone(), params) {
                        Ok(document) => document,
                        Err(e) => {
                            warn!(document_type, error = %e, "Create failed");
                            let _ = respond_to.send(Err(StoreError::Document(Box::new(e))));
                            continue;
                        }
                    };
                    if let Err(e) = document.on_create(&context).await {
                        warn!(document_type, error = %e, "on_create failed");
                        let _ = respond_to.send(Err(StoreError::Document(Box::new(e))));
                        continue;
                    }
                    self.next_id += 1;
                    document.on_commit(&context).await;
                    self.documents.insert(id.clone(), document);
                    info!(document_type, %id, size = self.documents.len(), "Created");
                    let _ = respond_to.send(Ok(id));
                }
                StoreRequest::Get { id, respond_to } => {
                    let document = self.documents.get(&id).cloned();
                    debug!(document_type, %id, found = document.is_some(), "Get");
                    let _ = respond_to.send(Ok(document));
                }
                StoreRequest::List { filter, respond_to } => {
                    let mut found: Vec<(&T::Id, &T)> =
                        self.documents.iter().filter(|(_, d)| filter(d)).collect();
                    found.sort_by(|a, b| a.0.cmp(b.0));
                    let matches: Vec<T> = found.into_iter().map(|(_, d)| d.clone()).collect();
                    debug!(document_type, count = matches.len(), "List");
                    let _ = respond_to.send(Ok(matches));
                }
                StoreRequest::Action { id, action, respond_to } => {
                    debug!(document_type, %id, ?action, "Action");
                    let Some(stored) = self.documents.get_mut(&id) else {
                        warn!(document_type, %id, "Not found");
                        let _ = respond_to.send(Err(StoreError::NotFound(id.to_string())));
                        continue;
                    };
                    let mut draft = stored.clone();
                    match draft.handle_action(action, &context).await {
                        Ok(result) => {
                            *stored = draft;
                            stored.on_commit(&context).await;
                            info!(document_type, %id, "Action committed");
                            let _ = respond_to.send(Ok(result));
                        }
                        Err(e) => {
                            warn!(document_type, %id, error = %e, "Action rejected");
                            let _ = respond_to.send(Err(StoreError::Document(Box::new(e))));
                        }
                    }
                }
            }
        }

        info!(document_type, size = self.documents.len(), "Shutdown");
    }
}
