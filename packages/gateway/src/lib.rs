//! # docstore-gateway
//!
//! Blocking access to the document storage service, where projects contain
//! folders and files addressed by UUID or by slash-separated path.
//!
//! The [`StorageGateway`] trait is the surface the entity tree consumes. Two
//! implementations ship here:
//!
//! ### ApiClient
//!
//! REST client over an [`HttpExecutor`], by default reqwest's blocking client:
//!
//! ```ignore
//! use docstore_gateway::{ApiClient, GatewayConfig, StorageGateway, ListOptions};
//!
//! let client = ApiClient::from_config(GatewayConfig::from_env()?)?;
//! let page = client.list_folder_content(folder_id, &ListOptions::page_by_name(1))?;
//! ```
//!
//! ### StorageClient
//!
//! Path based operations (`list`, `exists`, `mkdir`, `upload_file`,
//! `download_file`, `delete`) over any gateway.
//!
//! ### InMemoryGateway
//!
//! A fake store for tests, available with the `test-utils` feature.

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod gateway;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod record;
pub mod types;

pub use api::ApiClient;
pub use client::{copy_in_chunks, StorageClient, CHUNK_SIZE};
pub use config::GatewayConfig;
pub use error::Error;
pub use executor::{HttpExecutor, HttpStream, ReqwestExecutor};
pub use gateway::{EntityQuery, ListOptions, StorageGateway};
#[cfg(any(test, feature = "test-utils"))]
pub use memory::InMemoryGateway;
pub use record::{EntityKind, EntityRecord, Page};
pub use types::{HttpRequest, HttpResponse, Method, RequestBody};
