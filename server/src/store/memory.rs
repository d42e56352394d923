//! In-process ledger with the same uniqueness and visibility rules as the
//! Postgres schema. Used by the test suites and for local experiments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::{EntryMark, Ledger, LedgerError, UniqueKey, UnitOfWork};
use crate::models::{
    BookingRecord, BookingStatus, EntryStatus, Event, NewBooking, NewPayment, NewReservation,
    PaymentRecord, PaymentStatus, Reservation, User, PAY_LATER_METHOD,
};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    events: HashMap<Uuid, Event>,
    payments: Vec<PaymentRecord>,
    bookings: Vec<BookingRecord>,
    reservations: Vec<Reservation>,
}

impl Tables {
    fn check_payment(&self, payment: &PaymentRecord) -> Result<(), LedgerError> {
        if self
            .payments
            .iter()
            .any(|p| p.payment_id == payment.payment_id)
        {
            return Err(LedgerError::Duplicate(UniqueKey::PaymentPaymentId));
        }
        Ok(())
    }

    fn check_booking(&self, booking: &BookingRecord) -> Result<(), LedgerError> {
        for existing in &self.bookings {
            if existing.payment_id == booking.payment_id {
                return Err(LedgerError::Duplicate(UniqueKey::BookingPaymentId));
            }
            if existing.ticket_id == booking.ticket_id {
                return Err(LedgerError::Duplicate(UniqueKey::TicketId));
            }
            if existing.booking_id == booking.booking_id {
                return Err(LedgerError::Duplicate(UniqueKey::BookingId));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MemoryLedger {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_user(&self, user: User) {
        self.tables.lock().users.insert(user.id, user);
    }

    pub fn insert_event(&self, event: Event) {
        self.tables.lock().events.insert(event.id, event);
    }

    /// Committed payment records.
    pub fn payments(&self) -> Vec<PaymentRecord> {
        self.tables.lock().payments.clone()
    }

    /// Committed booking records.
    pub fn bookings(&self) -> Vec<BookingRecord> {
        self.tables.lock().bookings.clone()
    }

    pub fn reservations(&self) -> Vec<Reservation> {
        self.tables.lock().reservations.clone()
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, LedgerError> {
        Ok(self.tables.lock().users.get(&id).cloned())
    }

    async fn find_event(&self, id: Uuid) -> Result<Option<Event>, LedgerError> {
        Ok(self.tables.lock().events.get(&id).cloned())
    }

    async fn find_booking_by_payment(
        &self,
        payment_id: &str,
    ) -> Result<Option<BookingRecord>, LedgerError> {
        let tables = self.tables.lock();
        Ok(tables
            .bookings
            .iter()
            .find(|b| b.payment_id == payment_id)
            .cloned())
    }

    async fn find_booking_by_reference(
        &self,
        booking_id: &str,
    ) -> Result<Option<BookingRecord>, LedgerError> {
        let tables = self.tables.lock();
        Ok(tables
            .bookings
            .iter()
            .find(|b| b.booking_id == booking_id)
            .cloned())
    }

    async fn find_booking_by_ticket(
        &self,
        ticket_id: &str,
    ) -> Result<Option<BookingRecord>, LedgerError> {
        let tables = self.tables.lock();
        Ok(tables
            .bookings
            .iter()
            .find(|b| b.ticket_id == ticket_id)
            .cloned())
    }

    async fn list_bookings_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<BookingRecord>, LedgerError> {
        let mut bookings: Vec<BookingRecord> = self
            .tables
            .lock()
            .bookings
            .iter()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bookings)
    }

    async fn insert_reservation(
        &self,
        reservation: NewReservation,
    ) -> Result<Reservation, LedgerError> {
        let now = Utc::now();
        let record = Reservation {
            id: Uuid::new_v4(),
            user_id: reservation.user_id,
            event_id: reservation.event_id,
            is_custom: reservation.is_custom(),
            amount: reservation.amount,
            status: BookingStatus::Pending,
            payment_status: PaymentStatus::PayLater,
            payment_method: PAY_LATER_METHOD.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.tables.lock().reservations.push(record.clone());
        Ok(record)
    }

    async fn list_reservations_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<Reservation>, LedgerError> {
        let mut reservations: Vec<Reservation> = self
            .tables
            .lock()
            .reservations
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        reservations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reservations)
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, LedgerError> {
        Ok(Box::new(MemoryUnitOfWork {
            tables: Arc::clone(&self.tables),
            payments: Vec::new(),
            bookings: Vec::new(),
        }))
    }

    async fn mark_entry_used(
        &self,
        ticket_id: &str,
        at: DateTime<Utc>,
    ) -> Result<EntryMark, LedgerError> {
        let mut tables = self.tables.lock();
        let Some(booking) = tables.bookings.iter_mut().find(|b| b.ticket_id == ticket_id) else {
            return Ok(EntryMark::Unknown);
        };

        if booking.entry_status == EntryStatus::Used {
            return Ok(EntryMark::AlreadyUsed(booking.clone()));
        }

        booking.entry_status = EntryStatus::Used;
        booking.used_at = Some(at);
        booking.updated_at = at;
        Ok(EntryMark::Marked(booking.clone()))
    }
}

/// Staged writes are invisible to readers until commit, where uniqueness is
/// re-checked against whatever committed in the meantime.
struct MemoryUnitOfWork {
    tables: Arc<Mutex<Tables>>,
    payments: Vec<PaymentRecord>,
    bookings: Vec<BookingRecord>,
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn insert_payment(&mut self, payment: NewPayment) -> Result<PaymentRecord, LedgerError> {
        let now = Utc::now();
        let record = PaymentRecord {
            id: Uuid::new_v4(),
            user_id: payment.user_id,
            event_id: payment.event_id,
            order_id: payment.order_id,
            payment_id: payment.payment_id,
            amount: payment.amount,
            status: payment.status,
            paid_at: payment.paid_at,
            created_at: now,
            updated_at: now,
        };

        self.tables.lock().check_payment(&record)?;
        if self.payments.iter().any(|p| p.payment_id == record.payment_id) {
            return Err(LedgerError::Duplicate(UniqueKey::PaymentPaymentId));
        }

        self.payments.push(record.clone());
        Ok(record)
    }

    async fn insert_booking(&mut self, booking: NewBooking) -> Result<BookingRecord, LedgerError> {
        let now = Utc::now();
        let record = BookingRecord {
            id: Uuid::new_v4(),
            booking_id: booking.booking_id,
            user_id: booking.user_id,
            event_id: booking.event_id,
            quantity: booking.quantity,
            payment_ref: booking.payment_ref,
            payment_id: booking.payment_id,
            order_id: booking.order_id,
            amount: booking.amount,
            ticket_id: booking.ticket_id,
            qr_code_path: booking.qr_code.path,
            qr_code_url: booking.qr_code.url,
            ticket_pdf_path: booking.ticket_pdf.path,
            ticket_pdf_url: booking.ticket_pdf.url,
            invoice_pdf_path: booking.invoice_pdf.path,
            invoice_pdf_url: booking.invoice_pdf.url,
            entry_status: EntryStatus::NotUsed,
            used_at: None,
            status: booking.status,
            created_at: now,
            updated_at: now,
        };

        self.tables.lock().check_booking(&record)?;
        self.bookings.push(record.clone());
        Ok(record)
    }

    async fn commit(self: Box<Self>) -> Result<(), LedgerError> {
        let mut tables = self.tables.lock();
        for payment in &self.payments {
            tables.check_payment(payment)?;
        }
        for booking in &self.bookings {
            tables.check_booking(booking)?;
        }

        tables.payments.extend(self.payments.iter().cloned());
        tables.bookings.extend(self.bookings.iter().cloned());
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), LedgerError> {
        Ok(())
    }
}
