//! Booking engine: borrow/return rules and booking state transitions

use std::{sync::Arc, time::Duration};

use uuid::Uuid;

use super::{
    clock::{Clock, SystemClock},
    observer::Observer,
    within, DEFAULT_STORE_DEADLINE,
};
use crate::{
    error::{AppError, AppResult},
    models::{
        booking::{borrow_days_in_range, MAX_BORROW_DAYS, MIN_BORROW_DAYS},
        Booking, BookingStatus, NewBooking, Pagination,
    },
    repository::{BookStore, BookingStore, Repository, UserStore},
};

#[derive(Clone)]
pub struct BookingsService {
    users: Arc<dyn UserStore>,
    books: Arc<dyn BookStore>,
    bookings: Arc<dyn BookingStore>,
    observer: Arc<dyn Observer>,
    clock: Arc<dyn Clock>,
    deadline: Duration,
}

impl BookingsService {
    pub fn new(repository: &Repository, observer: Arc<dyn Observer>) -> Self {
        Self {
            users: repository.users.clone(),
            books: repository.books.clone(),
            bookings: repository.bookings.clone(),
            observer,
            clock: Arc::new(SystemClock),
            deadline: DEFAULT_STORE_DEADLINE,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Borrow `book_id` for `borrow_days` days on behalf of `user_id`.
    ///
    /// Checks, in order: the user exists, the book exists, the user holds no
    /// ACTIVE booking for the book, and `borrow_days` is within 1..=30.
    pub async fn borrow(&self, user_id: Uuid, book_id: Uuid, borrow_days: i32) -> AppResult<Booking> {
        match self.try_borrow(user_id, book_id, borrow_days).await {
            Ok(booking) => {
                self.observer.borrowed(&booking);
                Ok(booking)
            }
            Err(error) => {
                self.observer.borrow_rejected(user_id, book_id, &error);
                Err(error)
            }
        }
    }

    async fn try_borrow(&self, user_id: Uuid, book_id: Uuid, borrow_days: i32) -> AppResult<Booking> {
        if !within(self.deadline, "users.exists", self.users.exists(user_id)).await? {
            return Err(AppError::NotFound(format!("User with id {} not found", user_id)));
        }

        within(self.deadline, "books.get", self.books.get(book_id)).await?;

        let active = within(
            self.deadline,
            "bookings.find_active",
            self.bookings.find_active(user_id, book_id),
        )
        .await?;
        if active.is_some() {
            return Err(AppError::Conflict(
                "You already have an active booking for this book".to_string(),
            ));
        }

        if !borrow_days_in_range(borrow_days) {
            return Err(AppError::InvalidArgument(format!(
                "borrow_days must be between {} and {}",
                MIN_BORROW_DAYS, MAX_BORROW_DAYS
            )));
        }

        // A concurrent borrow that slipped past find_active is caught by the
        // store's uniqueness guarantee and comes back as Conflict.
        let booking = NewBooking::starting_at(user_id, book_id, self.clock.now(), borrow_days);
        within(self.deadline, "bookings.insert", self.bookings.insert(&booking)).await
    }

    /// Return a booking. ACTIVE and OVERDUE bookings both become RETURNED;
    /// returning twice fails with [`AppError::AlreadyReturned`].
    pub async fn return_booking(&self, booking_id: Uuid) -> AppResult<Booking> {
        match self.try_return(booking_id).await {
            Ok((booking, was_overdue)) => {
                self.observer.returned(&booking, was_overdue);
                Ok(booking)
            }
            Err(error) => {
                self.observer.return_rejected(booking_id, &error);
                Err(error)
            }
        }
    }

    async fn try_return(&self, booking_id: Uuid) -> AppResult<(Booking, bool)> {
        let current = within(self.deadline, "bookings.get", self.bookings.get(booking_id)).await?;
        if current.status.is_terminal() {
            return Err(AppError::AlreadyReturned(booking_id));
        }

        let now = self.clock.now();
        let was_overdue = current.status == BookingStatus::Overdue || current.is_past_due(now);

        // Conditional on status <> RETURNED: a concurrent return makes this a no-op.
        let returned = within(
            self.deadline,
            "bookings.mark_returned",
            self.bookings.mark_returned(booking_id, now),
        )
        .await?
        .ok_or(AppError::AlreadyReturned(booking_id))?;

        Ok((returned, was_overdue))
    }

    /// Move every ACTIVE booking past its due date to OVERDUE. Returns how many moved.
    pub async fn update_overdue(&self) -> AppResult<u64> {
        let now = self.clock.now();
        match within(self.deadline, "bookings.mark_overdue", self.bookings.mark_overdue(now)).await {
            Ok(transitioned) => {
                self.observer.overdue_swept(transitioned);
                Ok(transitioned)
            }
            Err(error) => {
                self.observer.overdue_sweep_failed(&error);
                Err(error)
            }
        }
    }

    pub async fn get_by_user(&self, user_id: Uuid, page: Pagination) -> AppResult<Vec<Booking>> {
        within(
            self.deadline,
            "bookings.list_by_user",
            self.bookings.list_by_user(user_id, page.limit(), page.offset()),
        )
        .await
    }

    pub async fn get_by_id(&self, booking_id: Uuid) -> AppResult<Booking> {
        within(self.deadline, "bookings.get", self.bookings.get(booking_id)).await
    }

    pub async fn list(&self, page: Pagination) -> AppResult<Vec<Booking>> {
        within(
            self.deadline,
            "bookings.list",
            self.bookings.list(page.limit(), page.offset()),
        )
        .await
    }
}
