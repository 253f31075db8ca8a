//! # Flash Notes Common
//!
//! Shared types, rejections, and constants used across Flash Notes components.
//!
//! ## Modules
//! - `types` - Wire DTOs returned by the gatehouse endpoints
//! - `error` - Verification rejections and the service error type
//! - `constants` - Shared configuration defaults

pub mod constants;
pub mod error;
pub mod types;

pub use error::{ChallengeRejection, GatehouseError, OtpRejection, TokenRejection};
pub use types::*;
