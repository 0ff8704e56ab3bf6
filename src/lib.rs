//! Logwarden - log tailing daemon that reports error blocks to a webhook.

pub mod config;
pub mod notifier;
pub mod watch;
