//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;
pub mod coupon;

pub use product::{image_prefix, ProductDraft, ProductError, ProductStatus, ValidProduct};
pub use order::{generate_order_number, Capture, Order, OrderError, OrderPricing, OrderStatus, PaymentStatus, ShippingPolicy};
pub use cart::{Cart, CartError, CartItem};
pub use coupon::{Coupon, CouponDraft, CouponError, DiscountOutcome, DiscountType};
