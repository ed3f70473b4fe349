//! Payment domain - internal, provider-agnostic payment events.

mod amount;
mod currency;
mod events;
mod translator;

pub use amount::MinorUnits;
pub use currency::Currency;
pub use events::PaymentEvent;
pub use translator::{translate, TranslationError};

#[cfg(test)]
pub(crate) use events::test_event;
