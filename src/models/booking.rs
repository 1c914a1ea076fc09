//! Booking (borrow) model and related types

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use super::enums::BookingStatus;

/// Shortest allowed borrow, in days
pub const MIN_BORROW_DAYS: i32 = 1;
/// Longest allowed borrow, in days
pub const MAX_BORROW_DAYS: i32 = 30;

/// Booking model from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub book_id: Uuid,
    pub borrowed_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn is_past_due(&self, now: DateTime<Utc>) -> bool {
        self.due_date < now
    }
}

/// Values for a new ACTIVE booking; identifiers and timestamps come from the store
#[derive(Debug, Clone, PartialEq)]
pub struct NewBooking {
    pub user_id: Uuid,
    pub book_id: Uuid,
    pub borrowed_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
}

impl NewBooking {
    pub fn starting_at(user_id: Uuid, book_id: Uuid, borrowed_at: DateTime<Utc>, borrow_days: i32) -> Self {
        Self {
            user_id,
            book_id,
            borrowed_at,
            due_date: due_date(borrowed_at, borrow_days),
        }
    }
}

/// Borrow request. `borrow_days` is range-checked by the booking engine,
/// after the user, book and active-booking checks.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct BorrowRequest {
    pub book_id: Uuid,
    /// Number of days, 1 to 30
    pub borrow_days: i32,
}

pub fn borrow_days_in_range(days: i32) -> bool {
    (MIN_BORROW_DAYS..=MAX_BORROW_DAYS).contains(&days)
}

pub fn due_date(borrowed_at: DateTime<Utc>, borrow_days: i32) -> DateTime<Utc> {
    borrowed_at + Duration::days(i64::from(borrow_days))
}
