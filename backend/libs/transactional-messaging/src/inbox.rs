//! Inbox processor: transactional insert-dispatch-mark for incoming messages.

use std::sync::Arc;

use crate::error::{HandlerError, MessagingError, StoreError};
use crate::handler::MessageHandler;
use crate::model::Message;
use crate::store::InboxStore;

/// Runs each incoming message through insert → handler dispatch → mark
/// accepted, all inside one database transaction. A handler failure rolls
/// the whole transaction back, so neither the insert nor the mark persists
/// and the caller must not store the broker offset for this message.
pub struct InboxProcessor<S: InboxStore, H: MessageHandler> {
    store: Arc<S>,
    handler: Arc<H>,
}

impl<S: InboxStore, H: MessageHandler> InboxProcessor<S, H> {
    pub fn new(store: Arc<S>, handler: Arc<H>) -> Self {
        Self { store, handler }
    }

    pub async fn process_message(&self, message: &Message) -> Result<(), MessagingError> {
        let mut tx = self.store.begin().await?;

        let entry = self
            .store
            .insert_pending(&mut tx, &message.topic, message.key.as_deref(), message.payload.clone())
            .await?;

        if let Err(e) = self.handler.dispatch(message).await {
            // tx is dropped here without a commit, rolling back the insert.
            return Err(HandlerError::Failed(e).into());
        }

        self.store.mark_accepted(&mut tx, entry.id).await?;
        tx.commit()
            .await
            .map_err(StoreError::from)?;

        Ok(())
    }
}
