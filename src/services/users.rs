//! Authentication and user management service

use std::{sync::Arc, time::Duration};

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

use super::{
    clock::{Clock, SystemClock},
    observer::Observer,
    within, DEFAULT_STORE_DEADLINE,
};
use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::{
        user::{LoginRequest, RegisterUser, UpdateUser},
        NewUser, Pagination, Role, User, UserClaims,
    },
    repository::{Repository, UserStore},
};

/// Issued bearer token
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

#[derive(Clone)]
pub struct UsersService {
    users: Arc<dyn UserStore>,
    config: AuthConfig,
    observer: Arc<dyn Observer>,
    clock: Arc<dyn Clock>,
    deadline: Duration,
}

impl UsersService {
    pub fn new(repository: &Repository, config: AuthConfig, observer: Arc<dyn Observer>) -> Self {
        Self {
            users: repository.users.clone(),
            config,
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

    /// Register a regular user
    pub async fn register(&self, request: RegisterUser) -> AppResult<User> {
        self.create(request, Role::User).await
    }

    /// Register an admin. `provided_key` must equal the configured registration key.
    pub async fn register_admin(&self, request: RegisterUser, provided_key: Option<&str>) -> AppResult<User> {
        let expected = self
            .config
            .admin_registration_key
            .as_deref()
            .ok_or_else(|| AppError::Authorization("Admin registration is disabled".to_string()))?;

        if provided_key != Some(expected) {
            return Err(AppError::Authorization("Invalid admin registration key".to_string()));
        }

        self.create(request, Role::Admin).await
    }

    async fn create(&self, request: RegisterUser, role: Role) -> AppResult<User> {
        request.validate()?;

        let new_user = NewUser {
            username: request.username,
            email: request.email,
            password_hash: hash_password(&request.password)?,
            role,
        };
        let user = within(self.deadline, "users.create", self.users.create(&new_user)).await?;
        self.observer.user_registered(&user);
        Ok(user)
    }

    /// Authenticate by username and password and issue a JWT
    pub async fn authenticate(&self, request: &LoginRequest) -> AppResult<Session> {
        let credentials = within(
            self.deadline,
            "users.get_credentials_by_username",
            self.users.get_credentials_by_username(&request.username),
        )
        .await?;

        let credentials = match credentials {
            Some(credentials) if verify_password(&credentials.password_hash, &request.password)? => {
                credentials
            }
            _ => {
                self.observer.login_failed(&request.username);
                return Err(AppError::Authentication("Invalid username or password".to_string()));
            }
        };

        let user = within(self.deadline, "users.get_by_id", self.users.get_by_id(credentials.id)).await?;
        let (token, expires_at) = self.create_token_for_user(&user)?;
        Ok(Session {
            token,
            expires_at,
            user,
        })
    }

    /// Exchange a valid token for a fresh one. The user must still exist.
    pub async fn refresh(&self, token: &str) -> AppResult<Session> {
        let claims = UserClaims::from_token(token, &self.config.jwt_secret)
            .map_err(|_| AppError::Authentication("Invalid token".to_string()))?;

        let user = within(self.deadline, "users.get_by_id", self.users.get_by_id(claims.user_id())).await?;
        let (token, expires_at) = self.create_token_for_user(&user)?;
        Ok(Session {
            token,
            expires_at,
            user,
        })
    }

    /// Create JWT token for a user
    fn create_token_for_user(&self, user: &User) -> AppResult<(String, DateTime<Utc>)> {
        let now = self.clock.now();
        let expires_at = now + chrono::Duration::hours(self.config.jwt_expiration_hours as i64);

        let claims = UserClaims {
            sub: user.id,
            username: user.username.clone(),
            role: user.role,
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
        };

        let token = claims
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))?;
        Ok((token, expires_at))
    }

    pub async fn get(&self, id: Uuid) -> AppResult<User> {
        within(self.deadline, "users.get_by_id", self.users.get_by_id(id)).await
    }

    pub async fn list(&self, page: Pagination) -> AppResult<Vec<User>> {
        within(
            self.deadline,
            "users.list",
            self.users.list(page.limit(), page.offset()),
        )
        .await
    }

    pub async fn update(&self, id: Uuid, update: UpdateUser) -> AppResult<User> {
        update.validate()?;
        within(
            self.deadline,
            "users.update_email",
            self.users.update_email(id, &update.email, self.clock.now()),
        )
        .await
    }

    /// Delete a user. Users with bookings cannot be deleted.
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        let removed = within(self.deadline, "users.delete", self.users.delete(id)).await?;
        if removed == 0 {
            return Err(AppError::NotFound(format!("User with id {} not found", id)));
        }
        Ok(())
    }
}

/// Hash a password using Argon2
fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

fn verify_password(hash: &str, password: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
