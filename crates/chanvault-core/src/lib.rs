//! Core types, errors, and shared utilities for the chanvault backup engine.
//!
//! This crate provides:
//! - Strongly-typed ids for servers, channels, categories, messages and
//!   attachments
//! - The message/channel model consumed by the sync engine
//! - Prometheus metrics and tracing-init helpers
//! - Shared error types

mod error;
mod ids;
mod model;
pub mod logging;
pub mod metrics;

pub use error::{Error, Result};
pub use ids::{AttachmentId, CategoryId, ChannelId, MessageId, ServerId};
pub use model::{Attachment, ChannelInfo, ChannelKind, Message};
