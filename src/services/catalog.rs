//! Catalog management service

use std::{sync::Arc, time::Duration};

use uuid::Uuid;
use validator::Validate;

use super::{
    clock::{Clock, SystemClock},
    observer::Observer,
    within, DEFAULT_STORE_DEADLINE,
};
use crate::{
    error::{AppError, AppResult},
    models::{Book, BookChanges, BookPatch, CreateBook, Pagination},
    repository::{BookStore, Repository},
};

#[derive(Clone)]
pub struct CatalogService {
    books: Arc<dyn BookStore>,
    observer: Arc<dyn Observer>,
    clock: Arc<dyn Clock>,
    deadline: Duration,
}

impl CatalogService {
    pub fn new(repository: &Repository, observer: Arc<dyn Observer>) -> Self {
        Self {
            books: repository.books.clone(),
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

    pub async fn list(&self, page: Pagination) -> AppResult<Vec<Book>> {
        within(
            self.deadline,
            "books.list",
            self.books.list(page.limit(), page.offset()),
        )
        .await
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Book> {
        within(self.deadline, "books.get", self.books.get(id)).await
    }

    pub async fn create(&self, book: CreateBook) -> AppResult<Book> {
        book.validate()?;
        let created = within(
            self.deadline,
            "books.insert",
            self.books.insert(&book, self.clock.now()),
        )
        .await?;
        self.observer.book_created(&created);
        Ok(created)
    }

    /// Apply `patch` to a book under optimistic locking.
    ///
    /// When the patch carries a version it must match the stored one. The write
    /// itself is conditional on the version read here, so a concurrent update
    /// between read and write also ends in [`AppError::Conflict`].
    pub async fn update(&self, id: Uuid, patch: BookPatch) -> AppResult<Book> {
        patch.validate()?;
        let current = within(self.deadline, "books.get", self.books.get(id)).await?;

        if let Some(expected) = patch.version {
            if expected != current.version {
                self.observer.book_update_conflict(id, expected);
                return Err(version_conflict(id, expected, current.version));
            }
        }

        let expected = current.version;
        let changes = BookChanges::merge(&current, patch);
        let updated = within(
            self.deadline,
            "books.update_versioned",
            self.books
                .update_versioned(id, expected, &changes, self.clock.now()),
        )
        .await?;

        match updated {
            Some(book) => {
                self.observer.book_updated(&book);
                Ok(book)
            }
            None => {
                self.observer.book_update_conflict(id, expected);
                Err(AppError::Conflict(format!(
                    "Book {} was modified concurrently, reload and retry",
                    id
                )))
            }
        }
    }

    /// Delete a book. Books with bookings cannot be deleted.
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        let removed = within(self.deadline, "books.delete", self.books.delete(id)).await?;
        if removed == 0 {
            return Err(AppError::NotFound(format!("Book with id {} not found", id)));
        }
        self.observer.book_deleted(id);
        Ok(())
    }
}

fn version_conflict(id: Uuid, expected: i32, actual: i32) -> AppError {
    AppError::Conflict(format!(
        "Book {} is at version {}, update was based on version {}",
        id, actual, expected
    ))
}
