//! # Match Server Library
//!
//! This library provides the authoritative server for the two-player paddle
//! game. It pairs incoming connections into sessions, drives each pair
//! through the match lifecycle, and simulates the game at a fixed tick rate,
//! broadcasting the resulting state to both peers.
//!
//! ## Core Responsibilities
//!
//! ### Matchmaking
//! A peer that asks to search is either seated opposite a peer already
//! waiting alone, or becomes the first peer of a new session. Pairing and the
//! decision to start the session's game loop happen under one registry lock,
//! so every session gets exactly one loop.
//!
//! ### Lifecycle
//! Both peers of a session move through the same phases:
//! searching → ready → countdown → playing → finished. Peers mark themselves
//! ready; the game loop performs every phase transition.
//!
//! ### Authoritative Simulation
//! Paddles, ball and score are simulated only on the server using integer
//! arithmetic, so a given input sequence always yields the same match.
//! Clients send paddle directions and render whatever state they receive.
//!
//! ## Architecture Design
//!
//! ### Tasks
//! - one accept loop (`network`)
//! - one reader and one writer task per connection (`connection`)
//! - one game loop per paired session (`game_loop`)
//!
//! ### Shared State
//! The registry is the only process-wide structure and sits behind a single
//! async mutex. Each session is shared between its two handlers and its game
//! loop with a single-writer split: handlers write their own ready flag and
//! input, the loop writes phases and owns the simulation outright.
//!
//! ### Framed TCP
//! Every message is a length-prefixed bincode frame (see `shared::codec`).
//! Broadcasts go through per-connection queues, so a slow or dead peer never
//! stalls its session's loop.
//!
//! ## Module Organization
//!
//! - `config`: match rules, pacing and bind address
//! - `registry`: session ownership and matchmaking
//! - `session`: per-match shared state and broadcast helpers
//! - `connection`: per-peer message handling and cleanup
//! - `game_loop`: phase machine and tick scheduling
//! - `game`: paddle and ball physics
//! - `network`: TCP listener
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Listen on 0.0.0.0:3001, 60 Hz, first to 10
//!     let server = Server::new(ServerConfig::default()).await?;
//!     server.run().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod connection;
pub mod game;
pub mod game_loop;
pub mod network;
pub mod registry;
pub mod session;
