//! Insight API client and types.
//!
//! This module provides the interface for communicating with the Jira
//! Insight (Assets) REST API on Data Center and cloud.

pub mod auth;
mod client;
mod endpoints;
mod error;
mod pagination;
mod query;
mod rate_limit;
pub mod types;

pub use auth::Auth;
pub use client::{ClientOptions, InsightClient, CLOUD_API_URL, DATA_CENTER_API_ROOT};
pub use error::{ApiError, Result};
pub use pagination::{Paged, Paginator, DEFAULT_PAGE_CONCURRENCY};
pub use query::{AttributeQuery, IqlQuery, NavlistQuery, DEFAULT_RESULTS_PER_PAGE};
pub use rate_limit::RateLimiter;
pub use types::{
    AttributeInput, InsightObject, ObjectCollection, ObjectPage, ObjectPayload, ObjectSchema,
    ObjectType, ObjectTypeAttribute, StatusType,
};
