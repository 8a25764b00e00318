//! askbot core library — relay gateway, inference client, Telegram channel, secrets and
//! configuration used by the `askbot` binary.

pub mod channels;
pub mod config;
pub mod gateway;
pub mod inference;
pub mod relay;
pub mod secrets;
