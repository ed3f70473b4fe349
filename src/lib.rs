//! Payment Relay - Webhook-to-event ingestion pipeline
//!
//! This crate accepts payment-provider webhook notifications, verifies their
//! authenticity, deduplicates redeliveries, and publishes durable domain
//! events to a message broker with at-least-once delivery guarantees.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
