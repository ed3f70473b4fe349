//! Webhook domain - inbound provider notification handling.

mod errors;
mod provider_event;
mod signature;

pub use errors::WebhookError;
pub use provider_event::{ProviderEvent, ProviderEventData, ProviderEventType};
pub use signature::{sign_payload, SignatureHeader, VerifiedEvent, WebhookVerifier};

#[cfg(test)]
pub use provider_event::ProviderEventBuilder;
