//! # Grid World State Server
//!
//! This library provides the authoritative state server for the multiplayer
//! grid world. It owns the canonical roster of connected players, advances
//! their interpolated movement, and broadcasts a consistent view of the
//! world to every client over a line-oriented text protocol.
//!
//! ## Core Responsibilities
//!
//! ### Session Lifecycle
//! Every connection becomes a session with a stable, never-reused id.
//! Sessions move through a small state machine: new connections complete a
//! three-part handshake (map chunk, full roster, in-flight moves), active
//! sessions receive the shared per-tick broadcasts, and failed sessions
//! have their departure announced to all peers exactly once before their
//! connection is closed.
//!
//! ### Per-Tick Synchronization
//! The server is single-threaded and cooperative. Each tick accepts at
//! most one new connection, drains client input, applies commands, composes
//! the tick's broadcast payloads, and drives non-blocking sends. A short
//! write never blocks the tick; the remainder waits in the session's
//! outbound queue for the next pass.
//!
//! ### State Broadcasting
//! Steady-state bandwidth is bounded to the players that changed: the
//! incremental update carries only arrivals, completed moves and
//! departures, while the moves broadcast carries interpolation parameters
//! for moves that just started. Only a fresh handshake receives full
//! snapshots.
//!
//! ## Module Organization
//!
//! - [`framing`]: inbound `#`-terminated message extraction and the
//!   outbound queue that survives partial sends
//! - [`session`]: player sessions and the registry that owns them
//! - [`broadcast`]: composition of the three broadcast payload classes
//! - [`map`]: the terrain chunk collaborator seam
//! - [`transport`]: non-blocking accept/receive/send over TCP
//! - [`network`]: the tick loop driving all of the above
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::map::FlatChunkProvider;
//! use server::network::Server;
//! use server::transport::TcpAcceptor;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let listener = TcpAcceptor::bind("127.0.0.1:5077")?;
//!     let mut server = Server::new(
//!         listener,
//!         Box::new(FlatChunkProvider::default()),
//!         Duration::from_millis(50),
//!     );
//!     server.run(async { let _ = tokio::signal::ctrl_c().await; }).await;
//!     Ok(())
//! }
//! ```

pub mod broadcast;
pub mod framing;
pub mod map;
pub mod network;
pub mod session;
pub mod transport;
