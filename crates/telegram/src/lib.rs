//! Telegram interface for the driver report bot.
//!
//! - `update` — inbound message and reply types
//! - `keyboards` — the four fixed reply keyboards
//! - `service` — per-user message handling: dialog, build, submit
//! - `runner` — long-poll loop with bounded reconnect
//!
//! The actual HTTP transport lives in the server crate; everything here is
//! written against the `UpdateTransport` trait so the loop and the service
//! are testable with scripted fakes.

pub mod keyboards;
pub mod runner;
pub mod service;
pub mod update;
