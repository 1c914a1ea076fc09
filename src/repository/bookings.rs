//! Bookings repository for database operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use super::{map_booking_insert_error, BookingStore};
use crate::{
    error::{AppError, AppResult},
    models::{Booking, BookingStatus, NewBooking},
};

const BOOKING_COLUMNS: &str =
    "id, user_id, book_id, borrowed_at, due_date, returned_at, status, created_at, updated_at";

#[derive(Clone)]
pub struct BookingsRepository {
    pool: Pool<Postgres>,
}

impl BookingsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookingStore for BookingsRepository {
    async fn get(&self, id: Uuid) -> AppResult<Booking> {
        sqlx::query_as::<_, Booking>(&format!(
            "SELECT {} FROM bookings WHERE id = $1",
            BOOKING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Booking with id {} not found", id)))
    }

    async fn find_active(&self, user_id: Uuid, book_id: Uuid) -> AppResult<Option<Booking>> {
        let booking = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {} FROM bookings WHERE user_id = $1 AND book_id = $2 AND status = $3",
            BOOKING_COLUMNS
        ))
        .bind(user_id)
        .bind(book_id)
        .bind(BookingStatus::Active)
        .fetch_optional(&self.pool)
        .await?;

        Ok(booking)
    }

    async fn insert(&self, booking: &NewBooking) -> AppResult<Booking> {
        // bookings_one_active_per_user_book closes the check-then-insert race
        let created = sqlx::query_as::<_, Booking>(&format!(
            r#"
            INSERT INTO bookings (id, user_id, book_id, borrowed_at, due_date, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $4, $4)
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(booking.user_id)
        .bind(booking.book_id)
        .bind(booking.borrowed_at)
        .bind(booking.due_date)
        .bind(BookingStatus::Active)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| map_booking_insert_error(error, booking))?;

        Ok(created)
    }

    async fn mark_returned(&self, id: Uuid, returned_at: DateTime<Utc>) -> AppResult<Option<Booking>> {
        let updated = sqlx::query_as::<_, Booking>(&format!(
            r#"
            UPDATE bookings
            SET status = $1, returned_at = $2, updated_at = $2
            WHERE id = $3 AND status <> $1
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        ))
        .bind(BookingStatus::Returned)
        .bind(returned_at)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(updated)
    }

    async fn mark_overdue(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE bookings SET status = $1, updated_at = $2 WHERE status = $3 AND due_date < $2",
        )
        .bind(BookingStatus::Overdue)
        .bind(now)
        .bind(BookingStatus::Active)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn list_by_user(&self, user_id: Uuid, limit: i64, offset: i64) -> AppResult<Vec<Booking>> {
        let bookings = sqlx::query_as::<_, Booking>(&format!(
            r#"
            SELECT {} FROM bookings
            WHERE user_id = $1
            ORDER BY borrowed_at DESC
            LIMIT $2 OFFSET $3
            "#,
            BOOKING_COLUMNS
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(bookings)
    }

    async fn list(&self, limit: i64, offset: i64) -> AppResult<Vec<Booking>> {
        let bookings = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {} FROM bookings ORDER BY borrowed_at DESC LIMIT $1 OFFSET $2",
            BOOKING_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(bookings)
    }
}
