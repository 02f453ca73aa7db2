//! Ingest transport: the live L2-orderbook WebSocket client feeding the
//! simulator.

pub mod websocket;

pub use websocket::{WebsocketIngest, WebsocketMetrics};
