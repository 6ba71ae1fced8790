//! Development server for folio blogs.
//!
//! Serves the built site, rebuilds it when posts change and tells open pages
//! to reload over a WebSocket. Live code panels talk to evaluators through
//! [`live_router`], which `folio serve` mounts as well.

pub mod live;
pub mod server;
pub mod watcher;
pub mod websocket;

pub use live::live_router;
pub use server::{DevServer, DevServerConfig, ServerError};
pub use watcher::{FileWatcher, WatchEvent};
pub use websocket::{HmrHub, HmrMessage};
