//! API client module
//!
//! Wraps a [`Session`](crate::auth::Session) and exposes object describe,
//! bulk query and standard (paginated) query behind [`SalesforceApi`].

mod api;
mod bulk;
mod types;

pub use api::{ApiClient, PageStream, SalesforceApi};
pub use types::{BatchState, FieldDescriptor, ObjectSchema, QueryPage};
