//! Streaming chat client for a multi-agent network troubleshooting backend.
//!
//! The backend answers a query with Server-Sent Events. Each event carries a
//! labeled record; the client decodes the stream, sorts records into
//! planning, troubleshooting and summarizing messages, and keeps the result
//! in a [`agent::SharedStore`] that a UI can observe.

pub mod agent;
pub mod logging;
pub mod render;
pub mod server;
