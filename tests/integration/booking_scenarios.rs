//! Booking and catalog behaviour against the in-memory store

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use library_bookings::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::{user::RegisterUser, Book, BookChanges, BookPatch, BookingStatus, CreateBook},
    repository::{BookStore, Repository},
    services::{
        bookings::BookingsService, catalog::CatalogService, clock::Clock, observer::NoopObserver,
        users::UsersService,
    },
};
use tokio::sync::Barrier;
use uuid::Uuid;

/// Clock the test moves by hand
struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    fn starting_at(at: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self(Mutex::new(at)))
    }

    fn advance(&self, by: Duration) {
        *self.0.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

struct Library {
    clock: Arc<ManualClock>,
    users: UsersService,
    catalog: CatalogService,
    bookings: BookingsService,
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

fn library() -> Library {
    let repository = Repository::in_memory();
    let clock = ManualClock::starting_at(t0());
    let observer = Arc::new(NoopObserver);
    let auth = AuthConfig {
        jwt_secret: "scenario-secret".into(),
        jwt_expiration_hours: 1,
        admin_registration_key: None,
    };

    Library {
        users: UsersService::new(&repository, auth, observer.clone()).with_clock(clock.clone()),
        catalog: CatalogService::new(&repository, observer.clone()).with_clock(clock.clone()),
        bookings: BookingsService::new(&repository, observer).with_clock(clock.clone()),
        clock,
    }
}

impl Library {
    async fn reader(&self, name: &str) -> Uuid {
        self.users
            .register(RegisterUser {
                username: name.into(),
                email: format!("{}@example.org", name),
                password: "a long enough password".into(),
            })
            .await
            .unwrap()
            .id
    }

    async fn book(&self, title: &str) -> Uuid {
        self.catalog
            .create(CreateBook {
                title: title.into(),
                author: "Ursula K. Le Guin".into(),
                published_year: Some(1969),
                isbn: None,
            })
            .await
            .unwrap()
            .id
    }
}

fn retitle(title: &str, version: Option<i32>) -> BookPatch {
    BookPatch {
        title: Some(title.into()),
        version,
        ..Default::default()
    }
}

#[tokio::test]
async fn version_counts_successful_updates() {
    let lib = library();
    let id = lib.book("The Left Hand of Darkness").await;

    for n in 1..=5 {
        let updated = lib
            .catalog
            .update(id, retitle(&format!("Edition {}", n), Some(n)))
            .await
            .unwrap();
        assert_eq!(updated.version, n + 1);
    }

    // A rejected update leaves the version alone
    assert!(matches!(
        lib.catalog.update(id, retitle("stale", Some(2))).await,
        Err(AppError::Conflict(_))
    ));
    assert_eq!(lib.catalog.get(id).await.unwrap().version, 6);
}

/// Book store that holds every reader at a barrier after `get`, so that both
/// updaters have read the same version before either one writes.
struct LockstepBooks {
    inner: Arc<dyn BookStore>,
    after_read: Barrier,
}

#[async_trait]
impl BookStore for LockstepBooks {
    async fn list(&self, limit: i64, offset: i64) -> AppResult<Vec<Book>> {
        self.inner.list(limit, offset).await
    }

    async fn get(&self, id: Uuid) -> AppResult<Book> {
        let book = self.inner.get(id).await?;
        self.after_read.wait().await;
        Ok(book)
    }

    async fn insert(&self, book: &CreateBook, now: DateTime<Utc>) -> AppResult<Book> {
        self.inner.insert(book, now).await
    }

    async fn update_versioned(
        &self,
        id: Uuid,
        expected_version: i32,
        changes: &BookChanges,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Book>> {
        self.inner.update_versioned(id, expected_version, changes, now).await
    }

    async fn delete(&self, id: Uuid) -> AppResult<u64> {
        self.inner.delete(id).await
    }
}

#[tokio::test]
async fn concurrent_updates_from_one_version_let_exactly_one_win() {
    let repository = Repository::in_memory();
    let plain = CatalogService::new(&repository, Arc::new(NoopObserver));
    let id = plain
        .create(CreateBook {
            title: "The Dispossessed".into(),
            author: "Ursula K. Le Guin".into(),
            published_year: Some(1974),
            isbn: None,
        })
        .await
        .unwrap()
        .id;

    let lockstep = Repository::from_stores(
        repository.users.clone(),
        Arc::new(LockstepBooks {
            inner: repository.books.clone(),
            after_read: Barrier::new(2),
        }),
        repository.bookings.clone(),
    );
    let racing = CatalogService::new(&lockstep, Arc::new(NoopObserver));

    // No client version: only the conditional write can reject the loser
    let (a, b) = tokio::join!(
        racing.update(id, retitle("first", None)),
        racing.update(id, retitle("second", None)),
    );

    let outcomes = [a, b];
    let wins = outcomes.iter().filter(|r| r.is_ok()).count();
    let lost_race = outcomes
        .iter()
        .filter(|r| matches!(r, Err(AppError::Conflict(message)) if message.contains("modified concurrently")))
        .count();
    assert_eq!((wins, lost_race), (1, 1));

    let stored = plain.get(id).await.unwrap();
    assert_eq!(stored.version, 2);
    let winner = outcomes.iter().find_map(|r| r.as_ref().ok()).unwrap();
    assert_eq!(stored.title, winner.title);
}

#[tokio::test]
async fn stale_version_after_another_update_is_a_conflict() {
    let lib = library();
    let id = lib.book("A Wizard of Earthsea").await;

    lib.catalog.update(id, retitle("revised", Some(1))).await.unwrap();

    let err = lib
        .catalog
        .update(id, retitle("clobber", Some(1)))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    assert_eq!(lib.catalog.get(id).await.unwrap().title, "revised");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_borrows_create_at_most_one_active_booking() {
    let lib = Arc::new(library());
    let user = lib.reader("shevek").await;
    let book = lib.book("The Dispossessed").await;

    let attempts: Vec<_> = (0..8)
        .map(|_| {
            let lib = lib.clone();
            tokio::spawn(async move { lib.bookings.borrow(user, book, 7).await })
        })
        .collect();

    let mut created = 0;
    for attempt in attempts {
        match attempt.await.unwrap() {
            Ok(_) => created += 1,
            Err(AppError::Conflict(_)) => {}
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }
    assert_eq!(created, 1);

    let active: Vec<_> = lib
        .bookings
        .get_by_user(user, Default::default())
        .await
        .unwrap()
        .into_iter()
        .filter(|b| b.status == BookingStatus::Active)
        .collect();
    assert_eq!(active.len(), 1);
}

#[tokio::test]
async fn late_return_then_sweep_keeps_booking_returned() {
    let lib = library();
    let user = lib.reader("genly").await;
    let book = lib.book("The Left Hand of Darkness").await;

    let booking = lib.bookings.borrow(user, book, 14).await.unwrap();
    assert_eq!(booking.status, BookingStatus::Active);
    assert_eq!(booking.due_date, t0() + Duration::days(14));

    lib.clock.advance(Duration::days(20));
    let returned = lib.bookings.return_booking(booking.id).await.unwrap();
    assert_eq!(returned.status, BookingStatus::Returned);
    assert_eq!(returned.returned_at, Some(t0() + Duration::days(20)));

    assert_eq!(lib.bookings.update_overdue().await.unwrap(), 0);
    let after = lib.bookings.get_by_id(booking.id).await.unwrap();
    assert_eq!(after.status, BookingStatus::Returned);

    assert!(matches!(
        lib.bookings.return_booking(booking.id).await,
        Err(AppError::AlreadyReturned(_))
    ));
}

#[tokio::test]
async fn overdue_sweep_is_idempotent_and_overdue_books_can_come_back() {
    let lib = library();
    let user = lib.reader("ged").await;
    let late = lib.book("A Wizard of Earthsea").await;
    let on_time = lib.book("The Tombs of Atuan").await;

    let late_booking = lib.bookings.borrow(user, late, 3).await.unwrap();
    lib.bookings.borrow(user, on_time, 30).await.unwrap();

    // Exactly at the due date nothing is overdue yet
    lib.clock.advance(Duration::days(3));
    assert_eq!(lib.bookings.update_overdue().await.unwrap(), 0);

    lib.clock.advance(Duration::seconds(1));
    assert_eq!(lib.bookings.update_overdue().await.unwrap(), 1);
    assert_eq!(lib.bookings.update_overdue().await.unwrap(), 0);
    assert_eq!(
        lib.bookings.get_by_id(late_booking.id).await.unwrap().status,
        BookingStatus::Overdue
    );

    let returned = lib.bookings.return_booking(late_booking.id).await.unwrap();
    assert_eq!(returned.status, BookingStatus::Returned);

    // The pair is free again
    let again = lib.bookings.borrow(user, late, 7).await.unwrap();
    assert_eq!(again.status, BookingStatus::Active);
}

#[tokio::test]
async fn borrow_reports_missing_user_before_missing_book() {
    let lib = library();
    let book = lib.book("Lavinia").await;

    assert!(matches!(
        lib.bookings.borrow(Uuid::new_v4(), book, 99).await,
        Err(AppError::NotFound(message)) if message.starts_with("User")
    ));

    let user = lib.reader("lavinia").await;
    assert!(matches!(
        lib.bookings.borrow(user, Uuid::new_v4(), 99).await,
        Err(AppError::NotFound(message)) if message.starts_with("Book")
    ));
    assert!(matches!(
        lib.bookings.borrow(user, book, 99).await,
        Err(AppError::InvalidArgument(_))
    ));
}
