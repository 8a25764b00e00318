//! Gateway: HTTP listener and bot startup.
//!
//! Single port serves the health check and, in webhook mode, `POST /webhook`.
//! In polling mode the Telegram long-poll loop feeds the relay instead.

mod server;

pub use server::{build_relay, router, run_gateway, GatewayState};
