//! Booking issuance.
//!
//! [`BookingPipeline::issue`] turns a verified payment into a booking with its
//! QR code, ticket and invoice. Both trigger adapters call it and it is safe
//! to call any number of times for the same payment: the first call issues,
//! every later or concurrent call gets the existing booking back.

use chrono::Utc;
use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use super::ids;
use super::notifier::{BookingConfirmation, Notifier};
use super::pdf::{InvoiceDocument, RenderError, Renderer, TicketDocument};
use super::qr::{QrError, QrMatrix};
use super::storage::{ObjectStore, StorageError};
use crate::config::BucketConfig;
use crate::models::{
    ArtifactRef, BookingRecord, BookingStatus, Event, NewBooking, NewPayment, PaymentStatus, User,
};
use crate::store::{Ledger, LedgerError, UnitOfWork};

const PDF: &str = "application/pdf";
const PNG: &str = "image/png";

#[derive(Debug, Clone)]
pub struct IssueRequest {
    pub payer_id: Uuid,
    pub event_id: Uuid,
    pub payment_id: String,
    pub order_id: String,
    /// Rupees.
    pub amount: Decimal,
    pub quantity: i32,
}

#[derive(Debug, Clone)]
pub enum Issuance {
    /// This call created the booking.
    Issued(BookingRecord),
    /// The payment had already been turned into a booking.
    AlreadyProcessed(BookingRecord),
}

impl Issuance {
    pub fn booking(&self) -> &BookingRecord {
        match self {
            Self::Issued(booking) | Self::AlreadyProcessed(booking) => booking,
        }
    }

    pub fn into_booking(self) -> BookingRecord {
        match self {
            Self::Issued(booking) | Self::AlreadyProcessed(booking) => booking,
        }
    }

    pub fn is_fresh(&self) -> bool {
        matches!(self, Self::Issued(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Lookup,
    Resolve,
    Payment,
    Qr,
    TicketPdf,
    InvoicePdf,
    Upload,
    Booking,
    Commit,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Lookup => "lookup",
            Self::Resolve => "resolve",
            Self::Payment => "payment",
            Self::Qr => "qr",
            Self::TicketPdf => "ticket_pdf",
            Self::InvoicePdf => "invoice_pdf",
            Self::Upload => "upload",
            Self::Booking => "booking",
            Self::Commit => "commit",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Qr(#[from] QrError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Error)]
pub enum IssuanceError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("issuance failed at {stage}: {cause}")]
    Failed {
        stage: Stage,
        #[source]
        cause: StageError,
    },
}

fn at<E: Into<StageError>>(stage: Stage) -> impl FnOnce(E) -> (Stage, StageError) {
    move |err| (stage, err.into())
}

impl From<(Stage, StageError)> for IssuanceError {
    fn from((stage, cause): (Stage, StageError)) -> Self {
        Self::Failed { stage, cause }
    }
}

/// An object written during this invocation, removed again if it fails.
#[derive(Debug, Clone)]
struct StoredObject {
    bucket: String,
    name: String,
}

/// What a successful run hands to the notification step.
struct Staged {
    booking: BookingRecord,
    ticket_pdf: Vec<u8>,
    invoice_pdf: Vec<u8>,
}

#[derive(Clone)]
pub struct BookingPipeline {
    ledger: Arc<dyn Ledger>,
    store: Arc<dyn ObjectStore>,
    notifier: Arc<dyn Notifier>,
    renderer: Arc<dyn Renderer>,
    buckets: BucketConfig,
}

impl BookingPipeline {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        store: Arc<dyn ObjectStore>,
        notifier: Arc<dyn Notifier>,
        renderer: Arc<dyn Renderer>,
        buckets: BucketConfig,
    ) -> Self {
        Self {
            ledger,
            store,
            notifier,
            renderer,
            buckets,
        }
    }

    pub async fn issue(&self, request: IssueRequest) -> Result<Issuance, IssuanceError> {
        if let Some(existing) = self
            .ledger
            .find_booking_by_payment(&request.payment_id)
            .await
            .map_err(at(Stage::Lookup))?
        {
            tracing::info!(
                payment_id = %request.payment_id,
                booking_id = %existing.booking_id,
                "payment already processed"
            );
            return Ok(Issuance::AlreadyProcessed(existing));
        }

        let user = self
            .ledger
            .find_user(request.payer_id)
            .await
            .map_err(at(Stage::Resolve))?
            .ok_or(IssuanceError::NotFound {
                entity: "user",
                id: request.payer_id,
            })?;
        let event = self
            .ledger
            .find_event(request.event_id)
            .await
            .map_err(at(Stage::Resolve))?
            .ok_or(IssuanceError::NotFound {
                entity: "event",
                id: request.event_id,
            })?;

        let mut uow = self.ledger.begin().await.map_err(at(Stage::Payment))?;
        let mut stored = Vec::new();

        let staged = match self
            .stage(uow.as_mut(), &request, &user, &event, &mut stored)
            .await
        {
            Ok(staged) => staged,
            Err((stage, cause)) => {
                if let Err(err) = uow.rollback().await {
                    tracing::warn!(payment_id = %request.payment_id, error = %err, "rollback failed");
                }
                return self.abandon(&request, &stored, stage, cause).await;
            }
        };

        let commit_err = match uow.commit().await {
            Ok(()) => {
                tracing::info!(
                    payment_id = %request.payment_id,
                    booking_id = %staged.booking.booking_id,
                    ticket_id = %staged.booking.ticket_id,
                    "booking issued"
                );
                self.notify(&user, &event, &staged).await;
                return Ok(Issuance::Issued(staged.booking));
            }
            Err(err) => err,
        };

        // The commit may have landed with only its acknowledgement lost. Our
        // artifacts stay unless the ledger shows our booking is not there.
        match self
            .ledger
            .find_booking_by_payment(&request.payment_id)
            .await
        {
            Ok(Some(booking)) if booking.ticket_id == staged.booking.ticket_id => {
                tracing::warn!(
                    payment_id = %request.payment_id,
                    booking_id = %booking.booking_id,
                    error = %commit_err,
                    "commit reported failure but booking is durable"
                );
                self.notify(&user, &event, &staged).await;
                Ok(Issuance::AlreadyProcessed(booking))
            }
            Ok(_) => {
                self.abandon(&request, &stored, Stage::Commit, commit_err.into())
                    .await
            }
            Err(err) => {
                tracing::error!(
                    payment_id = %request.payment_id,
                    error = %err,
                    "commit outcome unknown, keeping artifacts"
                );
                Err(IssuanceError::Failed {
                    stage: Stage::Commit,
                    cause: commit_err.into(),
                })
            }
        }
    }

    /// Removes this invocation's artifacts after its unit of work was
    /// discarded. A lost race for the same payment resolves to the winner.
    async fn abandon(
        &self,
        request: &IssueRequest,
        stored: &[StoredObject],
        stage: Stage,
        cause: StageError,
    ) -> Result<Issuance, IssuanceError> {
        self.discard(stored).await;

        if matches!(&cause, StageError::Ledger(err) if err.is_duplicate_payment()) {
            // A concurrent invocation for the same payment committed first.
            if let Some(winner) = self
                .ledger
                .find_booking_by_payment(&request.payment_id)
                .await
                .map_err(at(Stage::Lookup))?
            {
                tracing::info!(
                    payment_id = %request.payment_id,
                    booking_id = %winner.booking_id,
                    "lost issuance race, returning existing booking"
                );
                return Ok(Issuance::AlreadyProcessed(winner));
            }
        }

        tracing::error!(
            payment_id = %request.payment_id,
            %stage,
            error = %cause,
            "booking issuance failed"
        );
        Err(IssuanceError::Failed { stage, cause })
    }

    async fn stage(
        &self,
        uow: &mut dyn UnitOfWork,
        request: &IssueRequest,
        user: &User,
        event: &Event,
        stored: &mut Vec<StoredObject>,
    ) -> Result<Staged, (Stage, StageError)> {
        let now = Utc::now();
        let payment = uow
            .insert_payment(NewPayment {
                user_id: user.id,
                event_id: event.id,
                order_id: request.order_id.clone(),
                payment_id: request.payment_id.clone(),
                amount: request.amount,
                status: PaymentStatus::Captured,
                paid_at: Some(now),
            })
            .await
            .map_err(at(Stage::Payment))?;

        let ticket_id = ids::ticket_id(now);
        let booking_id = ids::booking_id(now);
        tracing::debug!(payment_id = %request.payment_id, %ticket_id, "payment recorded");

        let qr = QrMatrix::encode(&ticket_id).map_err(at(Stage::Qr))?;
        let qr_png = qr.to_png().map_err(at(Stage::Qr))?;

        let ticket_pdf = self
            .renderer
            .ticket(TicketDocument {
                booking_id: booking_id.clone(),
                ticket_id: ticket_id.clone(),
                event_name: event.title.clone(),
                event_date: event.display_date(),
                event_time: event.display_time().to_string(),
                venue: event.location.clone(),
                attendee_name: user.name.clone(),
                qr,
            })
            .await
            .map_err(at(Stage::TicketPdf))?;

        let invoice_pdf = self
            .renderer
            .invoice(InvoiceDocument {
                invoice_no: ids::invoice_number(now),
                date: now.format("%d %b %Y").to_string(),
                billed_to_name: user.name.clone(),
                billed_to_email: user.email.clone(),
                event_name: event.title.clone(),
                amount: request.amount,
                payment_id: request.payment_id.clone(),
            })
            .await
            .map_err(at(Stage::InvoicePdf))?;

        let ticket_ref = self
            .upload(
                stored,
                &self.buckets.tickets,
                format!("ticket-{ticket_id}.pdf"),
                ticket_pdf.clone(),
                PDF,
            )
            .await?;
        let invoice_ref = self
            .upload(
                stored,
                &self.buckets.invoices,
                format!("invoice-{ticket_id}.pdf"),
                invoice_pdf.clone(),
                PDF,
            )
            .await?;
        let qr_ref = self
            .upload(
                stored,
                &self.buckets.qr_codes,
                format!("qr-{ticket_id}.png"),
                qr_png,
                PNG,
            )
            .await?;

        let booking = uow
            .insert_booking(NewBooking {
                booking_id,
                user_id: user.id,
                event_id: event.id,
                quantity: request.quantity,
                payment_ref: payment.id,
                payment_id: payment.payment_id,
                order_id: payment.order_id,
                amount: payment.amount,
                ticket_id,
                qr_code: qr_ref,
                ticket_pdf: ticket_ref,
                invoice_pdf: invoice_ref,
                status: BookingStatus::Completed,
            })
            .await
            .map_err(at(Stage::Booking))?;

        Ok(Staged {
            booking,
            ticket_pdf,
            invoice_pdf,
        })
    }

    /// Records the object for cleanup before the upload is attempted, so a
    /// partially written object is removed too.
    async fn upload(
        &self,
        stored: &mut Vec<StoredObject>,
        bucket: &str,
        name: String,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<ArtifactRef, (Stage, StageError)> {
        stored.push(StoredObject {
            bucket: bucket.to_string(),
            name: name.clone(),
        });
        let url = self
            .store
            .put(bucket, &name, bytes, content_type)
            .await
            .map_err(at(Stage::Upload))?;
        Ok(ArtifactRef { path: name, url })
    }

    async fn discard(&self, stored: &[StoredObject]) {
        for object in stored {
            if let Err(err) = self.store.delete(&object.bucket, &object.name).await {
                tracing::warn!(
                    bucket = %object.bucket,
                    name = %object.name,
                    error = %err,
                    "failed to remove artifact after aborted issuance"
                );
            }
        }
    }

    async fn notify(&self, user: &User, event: &Event, staged: &Staged) {
        let confirmation = BookingConfirmation {
            to_email: user.email.clone(),
            user_name: user.name.clone(),
            event_name: event.title.clone(),
            ticket_id: staged.booking.ticket_id.clone(),
            ticket_pdf: staged.ticket_pdf.clone(),
            invoice_pdf: staged.invoice_pdf.clone(),
        };
        if let Err(err) = self.notifier.send_booking_confirmation(&confirmation).await {
            tracing::error!(
                ticket_id = %confirmation.ticket_id,
                error = %err,
                "confirmation email failed, booking kept"
            );
        }
    }
}
