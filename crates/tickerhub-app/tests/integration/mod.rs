//! Integration tests for tickerhub.
//!
//! These tests run real connectors against in-process servers:
//! - Stream connection lifecycle
//! - Subscription replay after reconnect
//! - Pushed tickers reaching the orchestrator cache

pub mod common;
