//! Business rules with no I/O: pricing, coupons, order lifecycle, catalog validation.
pub mod aggregates;
pub mod events;
pub mod value_objects;
