//! Stripe adapter - provider API integration.

mod checkout_adapter;

pub use checkout_adapter::{StripeCheckoutAdapter, StripeConfig};
