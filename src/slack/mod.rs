//! Slack integration.
//!
//! The Web API client doubles as the relay's file fetcher and message sink;
//! the poller is the event source.

pub mod client;
pub mod poller;
