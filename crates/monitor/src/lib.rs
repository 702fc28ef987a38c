//! Feed monitor service
//!
//! Wires settings, RPC-backed aggregators, the local feed and its poller.

pub mod service;

pub use service::MonitorService;
