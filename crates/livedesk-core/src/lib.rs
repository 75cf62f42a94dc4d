//! Business logic and repository trait definitions for Livedesk.
//!
//! This crate defines the "ports" (repository and collaborator traits) that
//! the infrastructure layer implements, plus the session lifecycle manager
//! and the post-close forwarding workflow. It depends only on
//! `livedesk-types` -- never on `livedesk-infra` or any database/IO crate.

pub mod chat;
pub mod directory;
pub mod settings;
