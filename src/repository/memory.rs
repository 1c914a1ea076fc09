//! In-process store implementing every store trait.
//!
//! Holds the same guarantees as the Postgres schema: unique usernames and
//! emails, one ACTIVE booking per (user, book), version compare-and-swap on
//! books, and restricted deletes for rows referenced by bookings. A single
//! `RwLock` serializes writers, so each operation is atomic.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{BookStore, BookingStore, UserStore};
use crate::{
    error::{AppError, AppResult},
    models::{
        Book, BookChanges, Booking, BookingStatus, CreateBook, NewBooking, NewUser, User,
        UserCredentials,
    },
};

struct StoredUser {
    user: User,
    password_hash: String,
}

#[derive(Default)]
struct MemoryState {
    users: HashMap<Uuid, StoredUser>,
    books: HashMap<Uuid, Book>,
    bookings: HashMap<Uuid, Booking>,
}

#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Newest first, then the requested window.
fn page<T: Clone>(mut rows: Vec<T>, key: impl Fn(&T) -> DateTime<Utc>, limit: i64, offset: i64) -> Vec<T> {
    rows.sort_by_key(|row| std::cmp::Reverse(key(row)));
    rows.into_iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn exists(&self, id: Uuid) -> AppResult<bool> {
        Ok(self.state.read().await.users.contains_key(&id))
    }

    async fn create(&self, user: &NewUser) -> AppResult<User> {
        let mut state = self.state.write().await;
        if state.users.values().any(|u| u.user.username == user.username) {
            return Err(AppError::Conflict("Username already exists".to_string()));
        }
        if state.users.values().any(|u| u.user.email == user.email) {
            return Err(AppError::Conflict("Email already exists".to_string()));
        }

        let now = Utc::now();
        let created = User {
            id: Uuid::new_v4(),
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(
            created.id,
            StoredUser {
                user: created.clone(),
                password_hash: user.password_hash.clone(),
            },
        );
        Ok(created)
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<User> {
        self.state
            .read()
            .await
            .users
            .get(&id)
            .map(|stored| stored.user.clone())
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    async fn get_credentials_by_username(&self, username: &str) -> AppResult<Option<UserCredentials>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|stored| stored.user.username == username)
            .map(|stored| UserCredentials {
                id: stored.user.id,
                username: stored.user.username.clone(),
                role: stored.user.role,
                password_hash: stored.password_hash.clone(),
            }))
    }

    async fn list(&self, limit: i64, offset: i64) -> AppResult<Vec<User>> {
        let state = self.state.read().await;
        let users = state.users.values().map(|stored| stored.user.clone()).collect();
        Ok(page(users, |u| u.created_at, limit, offset))
    }

    async fn update_email(&self, id: Uuid, email: &str, now: DateTime<Utc>) -> AppResult<User> {
        let mut state = self.state.write().await;
        if state
            .users
            .values()
            .any(|stored| stored.user.email == email && stored.user.id != id)
        {
            return Err(AppError::Conflict("Email already exists".to_string()));
        }

        let stored = state
            .users
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))?;
        stored.user.email = email.to_string();
        stored.user.updated_at = now;
        Ok(stored.user.clone())
    }

    async fn delete(&self, id: Uuid) -> AppResult<u64> {
        let mut state = self.state.write().await;
        if state.bookings.values().any(|b| b.user_id == id) {
            return Err(AppError::Conflict(
                "User has bookings and cannot be deleted".to_string(),
            ));
        }
        Ok(state.users.remove(&id).map_or(0, |_| 1))
    }
}

#[async_trait]
impl BookStore for InMemoryStore {
    async fn list(&self, limit: i64, offset: i64) -> AppResult<Vec<Book>> {
        let state = self.state.read().await;
        let books = state.books.values().cloned().collect();
        Ok(page(books, |b| b.created_at, limit, offset))
    }

    async fn get(&self, id: Uuid) -> AppResult<Book> {
        self.state
            .read()
            .await
            .books
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    async fn insert(&self, book: &CreateBook, now: DateTime<Utc>) -> AppResult<Book> {
        let created = Book {
            id: Uuid::new_v4(),
            title: book.title.clone(),
            author: book.author.clone(),
            published_year: book.published_year,
            isbn: book.isbn.clone(),
            created_at: now,
            updated_at: now,
            version: 1,
        };
        self.state.write().await.books.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_versioned(
        &self,
        id: Uuid,
        expected_version: i32,
        changes: &BookChanges,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Book>> {
        let mut state = self.state.write().await;
        let Some(book) = state.books.get_mut(&id) else {
            return Ok(None);
        };
        if book.version != expected_version {
            return Ok(None);
        }

        book.title = changes.title.clone();
        book.author = changes.author.clone();
        book.published_year = changes.published_year;
        book.isbn = changes.isbn.clone();
        book.updated_at = now;
        book.version += 1;
        Ok(Some(book.clone()))
    }

    async fn delete(&self, id: Uuid) -> AppResult<u64> {
        let mut state = self.state.write().await;
        if state.bookings.values().any(|b| b.book_id == id) {
            return Err(AppError::Conflict(
                "Book has bookings and cannot be deleted".to_string(),
            ));
        }
        Ok(state.books.remove(&id).map_or(0, |_| 1))
    }
}

#[async_trait]
impl BookingStore for InMemoryStore {
    async fn get(&self, id: Uuid) -> AppResult<Booking> {
        self.state
            .read()
            .await
            .bookings
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Booking with id {} not found", id)))
    }

    async fn find_active(&self, user_id: Uuid, book_id: Uuid) -> AppResult<Option<Booking>> {
        let state = self.state.read().await;
        Ok(state
            .bookings
            .values()
            .find(|b| b.user_id == user_id && b.book_id == book_id && b.status == BookingStatus::Active)
            .cloned())
    }

    async fn insert(&self, booking: &NewBooking) -> AppResult<Booking> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&booking.user_id) {
            return Err(AppError::NotFound(format!("User with id {} not found", booking.user_id)));
        }
        if !state.books.contains_key(&booking.book_id) {
            return Err(AppError::NotFound(format!("Book with id {} not found", booking.book_id)));
        }
        let duplicate = state.bookings.values().any(|b| {
            b.user_id == booking.user_id
                && b.book_id == booking.book_id
                && b.status == BookingStatus::Active
        });
        if duplicate {
            return Err(AppError::Conflict(
                "An active booking already exists for this book".to_string(),
            ));
        }

        let created = Booking {
            id: Uuid::new_v4(),
            user_id: booking.user_id,
            book_id: booking.book_id,
            borrowed_at: booking.borrowed_at,
            due_date: booking.due_date,
            returned_at: None,
            status: BookingStatus::Active,
            created_at: booking.borrowed_at,
            updated_at: booking.borrowed_at,
        };
        state.bookings.insert(created.id, created.clone());
        Ok(created)
    }

    async fn mark_returned(&self, id: Uuid, returned_at: DateTime<Utc>) -> AppResult<Option<Booking>> {
        let mut state = self.state.write().await;
        match state.bookings.get_mut(&id) {
            Some(booking) if !booking.status.is_terminal() => {
                booking.status = BookingStatus::Returned;
                booking.returned_at = Some(returned_at);
                booking.updated_at = returned_at;
                Ok(Some(booking.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn mark_overdue(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let mut state = self.state.write().await;
        let mut transitioned = 0;
        for booking in state.bookings.values_mut() {
            if booking.status == BookingStatus::Active && booking.is_past_due(now) {
                booking.status = BookingStatus::Overdue;
                booking.updated_at = now;
                transitioned += 1;
            }
        }
        Ok(transitioned)
    }

    async fn list_by_user(&self, user_id: Uuid, limit: i64, offset: i64) -> AppResult<Vec<Booking>> {
        let state = self.state.read().await;
        let bookings = state
            .bookings
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        Ok(page(bookings, |b| b.borrowed_at, limit, offset))
    }

    async fn list(&self, limit: i64, offset: i64) -> AppResult<Vec<Booking>> {
        let state = self.state.read().await;
        let bookings = state.bookings.values().cloned().collect();
        Ok(page(bookings, |b| b.borrowed_at, limit, offset))
    }
}
