//! Autopilot - verified issue-tracker webhooks feeding a priority task queue.
//!
//! This library provides the webhook verification gate, the task queue with
//! bounded retries, and the glue that turns tracker events into tasks.

pub mod config;
pub mod ingest;
pub mod queue;
pub mod server;
pub mod types;
pub mod webhooks;
pub mod worker;

#[cfg(test)]
pub mod test_utils;
