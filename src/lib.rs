//! insight-client - an async client for the Jira Insight (Assets) REST API
//!
//! Covers Data Center (`rest/insight/1.0`) and cloud workspaces, with a
//! token bucket rate limiter, retries, a GET response cache and bounded
//! concurrent pagination of IQL/AQL queries.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod logging;
pub mod schema;

#[cfg(test)]
mod test_utils;
