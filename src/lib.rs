//! txcost-sim: real-time transaction-cost simulator for a crypto L2 order
//! book.
//!
//! Exposes the core pipeline (`book`, `fees`, `impact`, `slippage`,
//! `maker_taker`, `simulator`), the wire schema, and the HTTP control
//! surface for use by the binary and integration tests.

pub mod api;
pub mod benchmark;
pub mod book;
pub mod config;
pub mod error;
pub mod fees;
pub mod impact;
pub mod maker_taker;
pub mod middleware;
pub mod parameter;
pub mod simulator;
pub mod slippage;
pub mod transport;
pub mod wire;
