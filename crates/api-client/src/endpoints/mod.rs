//! Typed wrappers over the Supabase service endpoints
//!
//! | Module | Service | Path |
//! |--------|---------|------|
//! | `rest` | PostgREST | `/rest/v1` |
//! | `storage` | Storage | `/storage/v1` |
//! | `auth` | GoTrue | `/auth/v1` |

pub mod auth;
pub mod rest;
pub mod storage;

pub use auth::AuthApi;
pub use rest::RestApi;
pub use storage::StorageApi;
