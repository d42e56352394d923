//! In-process collaborators with failure injection, plus fixture builders.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{Event, Role, User};
use crate::services::fonts::FontStyle;
use crate::services::gateway::{CreateOrder, GatewayError, GatewayOrder, PaymentGateway};
use crate::services::notifier::{BookingConfirmation, NotificationError, Notifier};
use crate::services::pdf::{DocumentRenderer, InvoiceDocument, RenderError, Renderer, TicketDocument};
use crate::services::storage::{MemoryObjectStore, ObjectStore, StorageError};

pub fn user(name: &str, email: &str, role: Role) -> User {
    let now = Utc::now();
    User {
        id: Uuid::new_v4(),
        name: name.to_string(),
        email: email.to_string(),
        role,
        created_at: now,
        updated_at: now,
    }
}

pub fn event(title: &str, price: Decimal) -> Event {
    let now = Utc::now();
    Event {
        id: Uuid::new_v4(),
        title: title.to_string(),
        description: None,
        location: "Kasturchand Park, Nagpur".to_string(),
        time: Some("7:00 PM".to_string()),
        date: Utc
            .with_ymd_and_hms(2024, 12, 14, 13, 30, 0)
            .single()
            .unwrap_or(now),
        price,
        created_at: now,
        updated_at: now,
    }
}

/// Keeps every confirmation it is asked to send.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<BookingConfirmation>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<BookingConfirmation> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_booking_confirmation(
        &self,
        confirmation: &BookingConfirmation,
    ) -> Result<(), NotificationError> {
        self.sent.lock().push(confirmation.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn send_booking_confirmation(
        &self,
        _confirmation: &BookingConfirmation,
    ) -> Result<(), NotificationError> {
        Err(NotificationError::Message("smtp relay unavailable".to_string()))
    }
}

/// Renders tickets normally and fails every invoice.
#[derive(Debug, Clone)]
pub struct FailingRenderer {
    inner: DocumentRenderer,
}

impl FailingRenderer {
    pub fn on_invoice() -> Self {
        Self {
            inner: DocumentRenderer::new(FontStyle::builtin()),
        }
    }
}

#[async_trait]
impl Renderer for FailingRenderer {
    async fn ticket(&self, doc: TicketDocument) -> Result<Vec<u8>, RenderError> {
        self.inner.ticket(doc).await
    }

    async fn invoice(&self, _doc: InvoiceDocument) -> Result<Vec<u8>, RenderError> {
        Err(RenderError::Pdf("invoice layout overflowed the page".to_string()))
    }
}

/// Wraps a [`MemoryObjectStore`] and rejects uploads whose object name starts
/// with `fail_prefix`. Deletes are forwarded and recorded.
#[derive(Debug, Clone)]
pub struct FlakyObjectStore {
    inner: MemoryObjectStore,
    fail_prefix: String,
    deleted: Arc<Mutex<Vec<(String, String)>>>,
}

impl FlakyObjectStore {
    pub fn failing_on(inner: MemoryObjectStore, fail_prefix: &str) -> Self {
        Self {
            inner,
            fail_prefix: fail_prefix.to_string(),
            deleted: Arc::default(),
        }
    }

    pub fn deleted(&self) -> Vec<(String, String)> {
        self.deleted.lock().clone()
    }
}

#[async_trait]
impl ObjectStore for FlakyObjectStore {
    async fn put(
        &self,
        bucket: &str,
        name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        if name.starts_with(&self.fail_prefix) {
            return Err(StorageError::Status {
                status: 403,
                body: format!("upload of {bucket}/{name} rejected"),
            });
        }
        self.inner.put(bucket, name, bytes, content_type).await
    }

    async fn get(&self, bucket: &str, name: &str) -> Result<Vec<u8>, StorageError> {
        self.inner.get(bucket, name).await
    }

    async fn delete(&self, bucket: &str, name: &str) -> Result<(), StorageError> {
        self.deleted
            .lock()
            .push((bucket.to_string(), name.to_string()));
        self.inner.delete(bucket, name).await
    }
}

/// Answers every order request with a fixed order id and records the requests.
#[derive(Debug, Clone, Default)]
pub struct StaticGateway {
    orders: Arc<Mutex<Vec<CreateOrder>>>,
}

impl StaticGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn orders(&self) -> Vec<CreateOrder> {
        self.orders.lock().clone()
    }
}

#[async_trait]
impl PaymentGateway for StaticGateway {
    async fn create_order(&self, order: &CreateOrder) -> Result<GatewayOrder, GatewayError> {
        let mut orders = self.orders.lock();
        orders.push(order.clone());
        Ok(GatewayOrder {
            id: format!("order_test_{}", orders.len()),
            amount: order.amount,
            currency: order.currency.clone(),
            receipt: Some(order.receipt.clone()),
            status: Some("created".to_string()),
        })
    }
}
