//! Business logic services

pub mod bookings;
pub mod catalog;
pub mod clock;
pub mod observer;
pub mod sweeper;
pub mod users;

use std::{future::Future, sync::Arc, time::Duration};

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    repository::Repository,
};

/// Deadline for a single store call when none is configured
pub const DEFAULT_STORE_DEADLINE: Duration = Duration::from_secs(5);

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub users: users::UsersService,
    pub catalog: catalog::CatalogService,
    pub bookings: bookings::BookingsService,
}

impl Services {
    /// Create all services over `repository`, sharing one observer and store deadline
    pub fn new(
        repository: &Repository,
        auth_config: AuthConfig,
        store_deadline: Duration,
        observer: Arc<dyn observer::Observer>,
    ) -> Self {
        Self {
            users: users::UsersService::new(repository, auth_config, observer.clone())
                .with_deadline(store_deadline),
            catalog: catalog::CatalogService::new(repository, observer.clone())
                .with_deadline(store_deadline),
            bookings: bookings::BookingsService::new(repository, observer)
                .with_deadline(store_deadline),
        }
    }
}

/// Run one store call under `deadline`, reporting expiry as [`AppError::Timeout`].
pub(crate) async fn within<T, F>(deadline: Duration, operation: &'static str, call: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    match tokio::time::timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => Err(AppError::Timeout(format!(
            "{} exceeded {}ms",
            operation,
            deadline.as_millis()
        ))),
    }
}
