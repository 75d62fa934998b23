//! Realtime gateway for live job viewers.
//!
//! Each WebSocket connection joins the broker group for its session and
//! forwards every published update to its viewer.

mod handler;

pub use handler::router;
