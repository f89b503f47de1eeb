//! Face authentication core: embedding types, the Euclidean match policy,
//! the single-slot enrollment store and the session controller that
//! sequences model warm-up, camera acquisition, capture and matching.

pub mod capture;
pub mod errors;
pub mod faces;
pub mod session;

pub use errors::{AppError, AppResult};
