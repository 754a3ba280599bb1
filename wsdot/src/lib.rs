//! Validated, cache-aware accessors for the WSDOT and WSF traveler
//! information REST APIs.
//!
//! Endpoints are described as data in `wsdot-define` (and shipped for real
//! API domains in `wsdot-definitions`). This crate turns those descriptors
//! into working accessors:
//!
//! - [`endpoint`] - fetch functions: validate input, build the URL, fetch,
//!   validate output
//! - [`hooks`] - the same accessors behind a shared, strategy-aware cache
//! - [`transport`] - direct HTTP or script injection
//! - [`schema`] - the validation gate both sides pass through
//! - [`date`] - the services' `/Date(ms)/` literal
//!
//! Every failure is a [`RequestError`] of exactly one kind: `API_ERROR`,
//! `NETWORK_ERROR` or `VALIDATION_ERROR`.
//!
//! ## Examples
//!
//! ```rust,ignore
//! use wsdot::{ApiClient, define_endpoint};
//! use wsdot_definitions::wsf_vessels::{self, VesselBasic, VesselIdInput};
//!
//! let client = ApiClient::from_env()?;
//! let endpoint = define_endpoint::<VesselIdInput, VesselBasic>(
//!     &wsf_vessels::api(),
//!     &wsf_vessels::vessel_basics_group(),
//!     "vesselBasicsByVesselId",
//! )?;
//! let vessel = endpoint.fetch(&client, Some(&VesselIdInput { vessel_id: 74 })).await?;
//! println!("{}", vessel.vessel_name.unwrap_or_default());
//! ```

pub mod client;
pub mod date;
pub mod endpoint;
pub mod error;
pub mod hooks;
pub mod schema;
pub mod transport;
pub mod url_builder;

pub use client::{ApiClient, ApiClientBuilder, ClientConfig};
pub use endpoint::{DynEndpoint, Endpoint, FetchFunctions, create_fetch_functions, define_endpoint};
pub use error::{ApiError, ConfigError, ErrorKind, NetworkError, RequestError, ValidationError};
pub use hooks::{
    DynHook, Hook, Hooks, QueryCache, QueryHandle, QueryKey, QueryOptions, QueryResult,
    QueryStatus, create_hooks,
};
pub use schema::{SafeParse, SchemaGate};
pub use transport::{Transport, TransportKind};

pub use wsdot_define;
