//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use std::sync::Arc;
use textpoll_core::ports::{PollStore, SmsSender};

/// The shared application state, created once at startup and passed to all
/// handlers. The store handle is caller-owned and injected here; nothing
/// in the request path constructs its own client.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn PollStore>,
    pub sms: Arc<dyn SmsSender>,
    pub config: Arc<Config>,
}
