//! Aggregates module
pub mod account;
pub mod cart;
pub mod coupon;
pub mod doctor;
pub mod order;
pub mod prescription;
pub mod product;

pub use account::{ProfileUpdate, RegistrationError, RegistrationForm, User, UserId, UserProfile, WishlistItem};
pub use cart::{Cart, CartError, CartLine, CartSummary, CatalogLookup};
pub use coupon::{Coupon, CouponError, CouponId, DiscountKind, NewCoupon};
pub use doctor::{Doctor, Specialization};
pub use order::{DeliveryDetails, Order, OrderError, OrderId, OrderItem, OrderStatus, StatusChange};
pub use prescription::{Prescription, PrescriptionError, PrescriptionId, PrescriptionStatus, PrescriptionUpload};
pub use product::{Banner, Category, CategoryId, PaymentMethod, Product, ProductId, Review};
