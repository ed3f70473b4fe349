//! Checkout session handlers.

mod create_checkout;

pub use create_checkout::{CreateCheckoutSessionCommand, CreateCheckoutSessionHandler};
