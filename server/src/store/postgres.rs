use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use std::time::Duration;
use uuid::Uuid;

use super::{EntryMark, Ledger, LedgerError, UnitOfWork};
use crate::config::DatabaseConfig;
use crate::models::{
    BookingRecord, BookingStatus, EntryStatus, Event, NewBooking, NewPayment, NewReservation,
    PaymentRecord, PaymentStatus, Reservation, User, PAY_LATER_METHOD,
};

/// Builds the process-wide pool without opening a connection. The first query
/// establishes one, later queries reuse pooled connections.
pub fn lazy_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect_lazy(&config.url)
}

#[derive(Clone)]
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Ledger for PgLedger {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, LedgerError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_event(&self, id: Uuid) -> Result<Option<Event>, LedgerError> {
        let event = sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(event)
    }

    async fn find_booking_by_payment(
        &self,
        payment_id: &str,
    ) -> Result<Option<BookingRecord>, LedgerError> {
        let booking =
            sqlx::query_as::<_, BookingRecord>("SELECT * FROM bookings WHERE payment_id = $1")
                .bind(payment_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(booking)
    }

    async fn find_booking_by_reference(
        &self,
        booking_id: &str,
    ) -> Result<Option<BookingRecord>, LedgerError> {
        let booking =
            sqlx::query_as::<_, BookingRecord>("SELECT * FROM bookings WHERE booking_id = $1")
                .bind(booking_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(booking)
    }

    async fn find_booking_by_ticket(
        &self,
        ticket_id: &str,
    ) -> Result<Option<BookingRecord>, LedgerError> {
        let booking =
            sqlx::query_as::<_, BookingRecord>("SELECT * FROM bookings WHERE ticket_id = $1")
                .bind(ticket_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(booking)
    }

    async fn list_bookings_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<BookingRecord>, LedgerError> {
        let bookings = sqlx::query_as::<_, BookingRecord>(
            "SELECT * FROM bookings WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(bookings)
    }

    async fn insert_reservation(
        &self,
        reservation: NewReservation,
    ) -> Result<Reservation, LedgerError> {
        let record = sqlx::query_as::<_, Reservation>(
            r#"
            INSERT INTO reservations
                (id, user_id, event_id, is_custom, amount, status, payment_status, payment_method)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(reservation.user_id)
        .bind(reservation.event_id)
        .bind(reservation.is_custom())
        .bind(reservation.amount)
        .bind(BookingStatus::Pending)
        .bind(PaymentStatus::PayLater)
        .bind(PAY_LATER_METHOD)
        .fetch_one(&self.pool)
        .await?;
        Ok(record)
    }

    async fn list_reservations_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<Reservation>, LedgerError> {
        let reservations = sqlx::query_as::<_, Reservation>(
            "SELECT * FROM reservations WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(reservations)
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, LedgerError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }

    async fn mark_entry_used(
        &self,
        ticket_id: &str,
        at: DateTime<Utc>,
    ) -> Result<EntryMark, LedgerError> {
        // Conditional update: two gates scanning the same ticket race on the
        // row lock and only one of them sees NOT_USED.
        let marked = sqlx::query_as::<_, BookingRecord>(
            r#"
            UPDATE bookings
               SET entry_status = $2, used_at = $3, updated_at = $3
             WHERE ticket_id = $1 AND entry_status = $4
            RETURNING *
            "#,
        )
        .bind(ticket_id)
        .bind(EntryStatus::Used)
        .bind(at)
        .bind(EntryStatus::NotUsed)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(booking) = marked {
            return Ok(EntryMark::Marked(booking));
        }

        Ok(match self.find_booking_by_ticket(ticket_id).await? {
            Some(booking) => EntryMark::AlreadyUsed(booking),
            None => EntryMark::Unknown,
        })
    }
}

pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn insert_payment(&mut self, payment: NewPayment) -> Result<PaymentRecord, LedgerError> {
        let record = sqlx::query_as::<_, PaymentRecord>(
            r#"
            INSERT INTO payments
                (id, user_id, event_id, order_id, payment_id, amount, status, paid_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(payment.user_id)
        .bind(payment.event_id)
        .bind(&payment.order_id)
        .bind(&payment.payment_id)
        .bind(payment.amount)
        .bind(payment.status)
        .bind(payment.paid_at)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(record)
    }

    async fn insert_booking(&mut self, booking: NewBooking) -> Result<BookingRecord, LedgerError> {
        let record = sqlx::query_as::<_, BookingRecord>(
            r#"
            INSERT INTO bookings
                (id, booking_id, user_id, event_id, quantity, payment_ref, payment_id, order_id,
                 amount, ticket_id, qr_code_path, qr_code_url, ticket_pdf_path, ticket_pdf_url,
                 invoice_pdf_path, invoice_pdf_url, entry_status, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&booking.booking_id)
        .bind(booking.user_id)
        .bind(booking.event_id)
        .bind(booking.quantity)
        .bind(booking.payment_ref)
        .bind(&booking.payment_id)
        .bind(&booking.order_id)
        .bind(booking.amount)
        .bind(&booking.ticket_id)
        .bind(&booking.qr_code.path)
        .bind(&booking.qr_code.url)
        .bind(&booking.ticket_pdf.path)
        .bind(&booking.ticket_pdf.url)
        .bind(&booking.invoice_pdf.path)
        .bind(&booking.invoice_pdf.url)
        .bind(EntryStatus::NotUsed)
        .bind(booking.status)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(record)
    }

    async fn commit(self: Box<Self>) -> Result<(), LedgerError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), LedgerError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
