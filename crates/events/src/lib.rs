//! Session-group publish/subscribe broker.
//!
//! This crate provides [`Broker`], the in-process fan-out hub that
//! delivers job progress updates to every live viewer of a session.
//! It is constructed once in `main` and shared via `Arc` — there is no
//! process-global instance.

pub mod broker;

pub use broker::{Broker, SubscriberId, Subscription};
