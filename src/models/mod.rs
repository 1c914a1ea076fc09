//! Data models for the library bookings server

pub mod book;
pub mod booking;
pub mod enums;
pub mod pagination;
pub mod user;

// Re-export commonly used types
pub use book::{Book, BookChanges, BookPatch, CreateBook};
pub use booking::{Booking, BorrowRequest, NewBooking};
pub use enums::{BookingStatus, Role};
pub use pagination::Pagination;
pub use user::{NewUser, User, UserClaims, UserCredentials};
