//! `SessionSource` backed by the Supabase Auth (GoTrue) REST API.
//!
//! Tokens are persisted in their own key/value store under
//! [`TOKEN_STORAGE_KEY`]; push events are emitted on sign-in, token refresh
//! and sign-out so the reconciler can apply them immediately.

mod client;
mod error;
mod redirect;
mod token;

pub use client::SupabaseSessionSource;
pub use error::{SupabaseError, SupabaseResult};
pub use redirect::{authorize_url, parse_redirect, RedirectTokens};
pub use token::{AppMetadata, SupabaseUser, TokenRecord, TokenResponse, TokenStore, TOKEN_STORAGE_KEY};
