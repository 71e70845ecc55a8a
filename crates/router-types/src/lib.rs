//! Shared types for the split router.
//!
//! Everything in this crate is a plain value: constructed per request,
//! consumed by the caller and dropped. The only long-lived state in the
//! system (the source registry) lives in `router-sources`.

pub mod asset;
pub mod events;
pub mod query;
pub mod quote;
pub mod source;
pub mod swap;
pub mod validation;

pub use alloy_primitives::{Address, U256};
pub use asset::*;
pub use events::*;
pub use query::*;
pub use quote::*;
pub use source::*;
pub use swap::*;
pub use validation::*;
