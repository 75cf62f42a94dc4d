//! Infrastructure layer for Livedesk.
//!
//! Contains implementations of the ports defined in `livedesk-core`:
//! SQLite storage for sessions, messages, parameters, and the user
//! directory, plus the outbound transcript delivery collaborator.

pub mod delivery;
pub mod sqlite;
