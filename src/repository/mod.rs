//! Repository layer: store traits and their Postgres and in-memory backends

pub mod bookings;
pub mod books;
pub mod memory;
pub mod users;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{Book, BookChanges, Booking, CreateBook, NewBooking, NewUser, User, UserCredentials},
};

/// User persistence
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn exists(&self, id: Uuid) -> AppResult<bool>;

    /// Duplicate username or email yields [`AppError::Conflict`].
    async fn create(&self, user: &NewUser) -> AppResult<User>;

    async fn get_by_id(&self, id: Uuid) -> AppResult<User>;

    async fn get_credentials_by_username(&self, username: &str) -> AppResult<Option<UserCredentials>>;

    async fn list(&self, limit: i64, offset: i64) -> AppResult<Vec<User>>;

    async fn update_email(&self, id: Uuid, email: &str, now: DateTime<Utc>) -> AppResult<User>;

    async fn delete(&self, id: Uuid) -> AppResult<u64>;
}

/// Book persistence, owner of the version-based optimistic lock
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookStore: Send + Sync {
    async fn list(&self, limit: i64, offset: i64) -> AppResult<Vec<Book>>;

    /// Missing rows yield [`AppError::NotFound`].
    async fn get(&self, id: Uuid) -> AppResult<Book>;

    /// Inserts with `version = 1`.
    async fn insert(&self, book: &CreateBook, now: DateTime<Utc>) -> AppResult<Book>;

    /// Writes `changes` only if the stored version still equals `expected_version`,
    /// bumping it by one. `None` means no row matched.
    async fn update_versioned(
        &self,
        id: Uuid,
        expected_version: i32,
        changes: &BookChanges,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Book>>;

    async fn delete(&self, id: Uuid) -> AppResult<u64>;
}

/// Booking persistence
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Missing rows yield [`AppError::NotFound`].
    async fn get(&self, id: Uuid) -> AppResult<Booking>;

    async fn find_active(&self, user_id: Uuid, book_id: Uuid) -> AppResult<Option<Booking>>;

    /// Inserts an ACTIVE booking. A second ACTIVE booking for the same
    /// (user, book) pair yields [`AppError::Conflict`].
    async fn insert(&self, booking: &NewBooking) -> AppResult<Booking>;

    /// Sets RETURNED unless already RETURNED; `None` when nothing changed.
    async fn mark_returned(&self, id: Uuid, returned_at: DateTime<Utc>) -> AppResult<Option<Booking>>;

    /// Moves every ACTIVE booking due before `now` to OVERDUE, returning the row count.
    async fn mark_overdue(&self, now: DateTime<Utc>) -> AppResult<u64>;

    async fn list_by_user(&self, user_id: Uuid, limit: i64, offset: i64) -> AppResult<Vec<Booking>>;

    async fn list(&self, limit: i64, offset: i64) -> AppResult<Vec<Booking>>;
}

/// Main repository struct holding the store backends
#[derive(Clone)]
pub struct Repository {
    pub pool: Option<Pool<Postgres>>,
    pub users: Arc<dyn UserStore>,
    pub books: Arc<dyn BookStore>,
    pub bookings: Arc<dyn BookingStore>,
}

impl Repository {
    /// Create a Postgres-backed repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            users: Arc::new(users::UsersRepository::new(pool.clone())),
            books: Arc::new(books::BooksRepository::new(pool.clone())),
            bookings: Arc::new(bookings::BookingsRepository::new(pool.clone())),
            pool: Some(pool),
        }
    }

    /// Create a repository backed by a single in-process store
    pub fn in_memory() -> Self {
        let store = Arc::new(memory::InMemoryStore::default());
        Self {
            pool: None,
            users: store.clone(),
            books: store.clone(),
            bookings: store,
        }
    }

    pub fn from_stores(
        users: Arc<dyn UserStore>,
        books: Arc<dyn BookStore>,
        bookings: Arc<dyn BookingStore>,
    ) -> Self {
        Self {
            pool: None,
            users,
            books,
            bookings,
        }
    }

    /// Round-trip to the database, when there is one
    pub async fn ping(&self) -> AppResult<()> {
        if let Some(pool) = &self.pool {
            sqlx::query("SELECT 1").execute(pool).await?;
        }
        Ok(())
    }
}

/// Translate constraint violations into domain conflicts, leave the rest as database errors.
///
/// Foreign-key violations only reach this mapping from deletes, hence the
/// "cannot be deleted" wording. Booking inserts use [`map_booking_insert_error`].
pub(crate) fn map_constraint_error(error: sqlx::Error) -> AppError {
    let mapped = violated_constraint(&error)
        .and_then(conflict_message)
        .map(|message| AppError::Conflict(message.to_string()));
    mapped.unwrap_or_else(|| AppError::Database(error))
}

/// Constraint violations raised by a booking insert: a user or book removed
/// since the engine read it is `NotFound`, a second active booking is `Conflict`.
pub(crate) fn map_booking_insert_error(error: sqlx::Error, booking: &NewBooking) -> AppError {
    let mapped = violated_constraint(&error).and_then(|constraint| booking_insert_violation(constraint, booking));
    mapped.unwrap_or_else(|| AppError::Database(error))
}

fn violated_constraint(error: &sqlx::Error) -> Option<&str> {
    match error {
        sqlx::Error::Database(db_error) => db_error.constraint(),
        _ => None,
    }
}

fn conflict_message(constraint: &str) -> Option<&'static str> {
    match constraint {
        "bookings_one_active_per_user_book" => Some("An active booking already exists for this book"),
        "users_username_key" => Some("Username already exists"),
        "users_email_key" => Some("Email already exists"),
        "bookings_user_id_fkey" => Some("User has bookings and cannot be deleted"),
        "bookings_book_id_fkey" => Some("Book has bookings and cannot be deleted"),
        _ => None,
    }
}

fn booking_insert_violation(constraint: &str, booking: &NewBooking) -> Option<AppError> {
    match constraint {
        "bookings_user_id_fkey" => Some(AppError::NotFound(format!(
            "User with id {} not found",
            booking.user_id
        ))),
        "bookings_book_id_fkey" => Some(AppError::NotFound(format!(
            "Book with id {} not found",
            booking.book_id
        ))),
        "bookings_one_active_per_user_book" => {
            conflict_message(constraint).map(|message| AppError::Conflict(message.to_string()))
        }
        _ => None,
    }
}
