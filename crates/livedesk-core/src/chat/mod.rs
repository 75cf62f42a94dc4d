//! Support-chat session lifecycle, message delivery, and forwarding.
//!
//! `repository` defines the storage port, `lifecycle` enforces the session
//! state machine and the watermark polling contract, and `forward` runs the
//! post-close transcript workflow.

pub mod forward;
pub mod lifecycle;
pub mod repository;

#[cfg(test)]
pub(crate) mod testutil;
