use std::sync::Arc;

use crate::auth::SessionKeys;
use crate::config::BucketConfig;
use crate::services::pdf::Renderer;
use crate::services::signature::SignatureVerifier;
use crate::services::{
    BookingPipeline, EntryVerifier, Notifier, ObjectStore, PaymentGateway,
};
use crate::store::Ledger;

/// The external systems the server talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub ledger: Arc<dyn Ledger>,
    pub store: Arc<dyn ObjectStore>,
    pub notifier: Arc<dyn Notifier>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub renderer: Arc<dyn Renderer>,
}

/// Shared, immutable process state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<dyn Ledger>,
    pub store: Arc<dyn ObjectStore>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub pipeline: BookingPipeline,
    pub entry: EntryVerifier,
    pub signatures: SignatureVerifier,
    pub sessions: SessionKeys,
    pub buckets: BucketConfig,
}

impl AppState {
    pub fn new(
        collaborators: Collaborators,
        signatures: SignatureVerifier,
        sessions: SessionKeys,
        buckets: BucketConfig,
    ) -> Self {
        let Collaborators {
            ledger,
            store,
            notifier,
            gateway,
            renderer,
        } = collaborators;

        Self {
            pipeline: BookingPipeline::new(
                ledger.clone(),
                store.clone(),
                notifier,
                renderer,
                buckets.clone(),
            ),
            entry: EntryVerifier::new(ledger.clone()),
            ledger,
            store,
            gateway,
            signatures,
            sessions,
            buckets,
        }
    }
}
