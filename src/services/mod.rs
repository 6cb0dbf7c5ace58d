//! Application services.
//!
//! Each function here is one use case: it takes [`AppState`](crate::state::AppState),
//! talks to the repositories and integrations, and returns domain rows or a
//! [`EcommerceError`](crate::EcommerceError). Handlers stay thin.

pub mod catalog;
pub mod checkout;
pub mod coupons;
pub mod orders;
pub mod payments;
pub mod users;
