#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::unused_async)]

//! Development server for strand.
//!
//! Serves the current bundle from memory, watches the module graph for
//! changes, rebuilds with debouncing and coalescing, pushes live
//! updates over a WebSocket, and proxies configured path prefixes to
//! backend servers. A failed rebuild never interrupts serving; the last
//! good bundle stays active until a build succeeds again.

pub mod live;
pub mod proxy;
pub mod server;
pub mod state;
pub mod watch;

pub use live::{LiveMessage, CLIENT_PATH, SOCKET_PATH};
pub use server::{router, run_server, DevError};
pub use state::DevState;
