//! Observability collaborator injected into the services.
//!
//! Services report outcomes through [`Observer`] instead of logging directly,
//! so tests can assert on them and hosts decide where they go.

use uuid::Uuid;

use crate::{
    error::AppError,
    models::{Book, Booking, User},
};

#[cfg_attr(test, mockall::automock)]
pub trait Observer: Send + Sync {
    fn borrowed(&self, booking: &Booking);

    fn borrow_rejected(&self, user_id: Uuid, book_id: Uuid, error: &AppError);

    /// `was_overdue` is true when the booking was past due at return time.
    fn returned(&self, booking: &Booking, was_overdue: bool);

    fn return_rejected(&self, booking_id: Uuid, error: &AppError);

    fn overdue_swept(&self, transitioned: u64);

    fn overdue_sweep_failed(&self, error: &AppError);

    fn book_created(&self, book: &Book);

    fn book_updated(&self, book: &Book);

    fn book_update_conflict(&self, book_id: Uuid, expected_version: i32);

    fn book_deleted(&self, book_id: Uuid);

    fn user_registered(&self, user: &User);

    fn login_failed(&self, username: &str);
}

/// Emits every outcome as a `tracing` event under the `library_bookings::events` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn borrowed(&self, booking: &Booking) {
        tracing::info!(
            target: "library_bookings::events",
            booking_id = %booking.id,
            user_id = %booking.user_id,
            book_id = %booking.book_id,
            due_date = %booking.due_date,
            "book borrowed"
        );
    }

    fn borrow_rejected(&self, user_id: Uuid, book_id: Uuid, error: &AppError) {
        tracing::warn!(
            target: "library_bookings::events",
            %user_id,
            %book_id,
            kind = ?error.kind(),
            "borrow rejected: {}",
            error
        );
    }

    fn returned(&self, booking: &Booking, was_overdue: bool) {
        tracing::info!(
            target: "library_bookings::events",
            booking_id = %booking.id,
            book_id = %booking.book_id,
            late = was_overdue,
            "book returned"
        );
    }

    fn return_rejected(&self, booking_id: Uuid, error: &AppError) {
        tracing::warn!(
            target: "library_bookings::events",
            %booking_id,
            kind = ?error.kind(),
            "return rejected: {}",
            error
        );
    }

    fn overdue_swept(&self, transitioned: u64) {
        if transitioned > 0 {
            tracing::info!(target: "library_bookings::events", transitioned, "overdue sweep completed");
        } else {
            tracing::debug!(target: "library_bookings::events", "overdue sweep found nothing to do");
        }
    }

    fn overdue_sweep_failed(&self, error: &AppError) {
        tracing::error!(
            target: "library_bookings::events",
            retryable = error.is_retryable(),
            "overdue sweep failed: {}",
            error
        );
    }

    fn book_created(&self, book: &Book) {
        tracing::info!(target: "library_bookings::events", book_id = %book.id, title = %book.title, "book created");
    }

    fn book_updated(&self, book: &Book) {
        tracing::info!(
            target: "library_bookings::events",
            book_id = %book.id,
            version = book.version,
            "book updated"
        );
    }

    fn book_update_conflict(&self, book_id: Uuid, expected_version: i32) {
        tracing::warn!(
            target: "library_bookings::events",
            %book_id,
            expected_version,
            "book update lost an optimistic lock race"
        );
    }

    fn book_deleted(&self, book_id: Uuid) {
        tracing::info!(target: "library_bookings::events", %book_id, "book deleted");
    }

    fn user_registered(&self, user: &User) {
        tracing::info!(
            target: "library_bookings::events",
            user_id = %user.id,
            role = %user.role,
            "user registered"
        );
    }

    fn login_failed(&self, username: &str) {
        tracing::warn!(target: "library_bookings::events", %username, "login failed");
    }
}

/// Discards every outcome.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl Observer for NoopObserver {
    fn borrowed(&self, _booking: &Booking) {}
    fn borrow_rejected(&self, _user_id: Uuid, _book_id: Uuid, _error: &AppError) {}
    fn returned(&self, _booking: &Booking, _was_overdue: bool) {}
    fn return_rejected(&self, _booking_id: Uuid, _error: &AppError) {}
    fn overdue_swept(&self, _transitioned: u64) {}
    fn overdue_sweep_failed(&self, _error: &AppError) {}
    fn book_created(&self, _book: &Book) {}
    fn book_updated(&self, _book: &Book) {}
    fn book_update_conflict(&self, _book_id: Uuid, _expected_version: i32) {}
    fn book_deleted(&self, _book_id: Uuid) {}
    fn user_registered(&self, _user: &User) {}
    fn login_failed(&self, _username: &str) {}
}
