//! Shared domain types for Livedesk.
//!
//! This crate contains the core domain types used across the Livedesk
//! support-chat platform: chat sessions, messages, settings, users, and
//! their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod chat;
pub mod config;
pub mod error;
pub mod user;
