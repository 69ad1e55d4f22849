//! Authentication module
//!
//! Supports: security token, organization id, consumer key/secret,
//! JWT bearer, direct session, client credentials
//!
//! A [`Credential`] is validated when it is built; the [`SessionResolver`]
//! turns it into a [`Session`] for one extraction run.

mod resolver;
mod types;

pub use resolver::SessionResolver;
pub use types::{Credential, CredentialKind, Instance, PrivateKey, Session};
