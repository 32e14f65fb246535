//! Remote data gateway for the SOW field tools
//!
//! Every backend interaction (table reads and writes, RPC, realtime change
//! feeds, photo storage and auth) goes through the [`Gateway`] trait. The
//! [`SupabaseGateway`] implementation talks to a Supabase project:
//!
//! - **PostgREST** for tables, views and RPC (`/rest/v1`)
//! - **Storage** for report photos (`/storage/v1`)
//! - **GoTrue** for password sign-in and password changes (`/auth/v1`)
//! - **Realtime** websocket for insert/update feeds (`/realtime/v1/websocket`)
//!
//! Calls are never retried; a failure is returned to the calling flow, which
//! decides what the user sees.
//!
//! # Example
//!
//! ```rust,no_run
//! use sow_api_client::{Gateway, Query, SupabaseGateway};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let gateway = SupabaseGateway::from_env()?;
//!
//!     let sites = gateway
//!         .query("locations", &Query::new().eq("branch", "台北分會").order_asc("location_name"))
//!         .await?;
//!     println!("{} sites", sites.len());
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod gateway;
pub mod realtime;
pub mod supabase;

pub use client::SupabaseClient;
pub use config::ClientConfig;
pub use error::{ApiError, ApiResult};
pub use gateway::{AuthUser, ChangeEvent, Filter, Gateway, Order, Query, Session, Subscription};
pub use supabase::SupabaseGateway;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::ClientConfig;
    pub use crate::error::{ApiError, ApiResult};
    pub use crate::gateway::{ChangeEvent, Filter, Gateway, Query, Session, Subscription};
    pub use crate::supabase::SupabaseGateway;
}
