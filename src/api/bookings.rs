//! Booking (borrow/return) endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppResult,
    models::{Booking, BorrowRequest, Pagination},
    AppState,
};

use super::AuthenticatedUser;

/// Result of a manual overdue sweep
#[derive(Serialize, ToSchema)]
pub struct OverdueSweepResponse {
    /// Bookings moved from ACTIVE to OVERDUE
    pub transitioned: u64,
}

/// Borrow a book for the authenticated user
#[utoipa::path(
    post,
    path = "/bookings",
    tag = "bookings",
    security(("bearer_auth" = [])),
    request_body = BorrowRequest,
    responses(
        (status = 201, description = "Booking created", body = Booking),
        (status = 400, description = "borrow_days outside 1..=30", body = crate::error::ErrorResponse),
        (status = 404, description = "User or book not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Book already actively borrowed by this user", body = crate::error::ErrorResponse)
    )
)]
pub async fn borrow(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<BorrowRequest>,
) -> AppResult<(StatusCode, Json<Booking>)> {
    let booking = state
        .services
        .bookings
        .borrow(claims.user_id(), request.book_id, request.borrow_days)
        .await?;

    Ok((StatusCode::CREATED, Json(booking)))
}

/// List the authenticated user's bookings
#[utoipa::path(
    get,
    path = "/bookings",
    tag = "bookings",
    security(("bearer_auth" = [])),
    params(Pagination),
    responses(
        (status = 200, description = "Page of bookings", body = Vec<Booking>),
        (status = 400, description = "Invalid pagination", body = crate::error::ErrorResponse)
    )
)]
pub async fn my_bookings(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(page): Query<Pagination>,
) -> AppResult<Json<Vec<Booking>>> {
    page.validate()?;
    let bookings = state
        .services
        .bookings
        .get_by_user(claims.user_id(), page)
        .await?;
    Ok(Json(bookings))
}

/// Get a booking. Users only see their own bookings.
#[utoipa::path(
    get,
    path = "/bookings/{id}",
    tag = "bookings",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Booking ID")
    ),
    responses(
        (status = 200, description = "Booking details", body = Booking),
        (status = 403, description = "Booking belongs to another user", body = crate::error::ErrorResponse),
        (status = 404, description = "Booking not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_booking(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Booking>> {
    let booking = state.services.bookings.get_by_id(id).await?;
    claims.require_owner_or_admin(booking.user_id)?;
    Ok(Json(booking))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/bookings/{id}/return",
    tag = "bookings",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Booking ID")
    ),
    responses(
        (status = 200, description = "Booking returned", body = Booking),
        (status = 403, description = "Booking belongs to another user", body = crate::error::ErrorResponse),
        (status = 404, description = "Booking not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Booking already returned", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_booking(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Booking>> {
    let booking = state.services.bookings.get_by_id(id).await?;
    claims.require_owner_or_admin(booking.user_id)?;

    let returned = state.services.bookings.return_booking(id).await?;
    Ok(Json(returned))
}

/// List all bookings (admin)
#[utoipa::path(
    get,
    path = "/admin/bookings",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(Pagination),
    responses(
        (status = 200, description = "Page of bookings", body = Vec<Booking>),
        (status = 403, description = "Admin role required", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_bookings(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(page): Query<Pagination>,
) -> AppResult<Json<Vec<Booking>>> {
    claims.require_admin()?;
    page.validate()?;

    let bookings = state.services.bookings.list(page).await?;
    Ok(Json(bookings))
}

/// Run the overdue sweep now (admin)
#[utoipa::path(
    post,
    path = "/admin/bookings/mark-overdue",
    tag = "admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Sweep completed", body = OverdueSweepResponse),
        (status = 403, description = "Admin role required", body = crate::error::ErrorResponse)
    )
)]
pub async fn mark_overdue(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<OverdueSweepResponse>> {
    claims.require_admin()?;

    let transitioned = state.services.bookings.update_overdue().await?;
    Ok(Json(OverdueSweepResponse { transitioned }))
}
