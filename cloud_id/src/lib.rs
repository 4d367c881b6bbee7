//! Client-side access to an identity service
//!
//! This library lets a service act as a client of an identity service. It
//! obtains access tokens for configured credentials, resolves the keys used to
//! verify or sign JWTs, and fetches service resources on behalf of a project.
//! Every value obtained over the network is held in a shared cache so that
//! many instances can cooperate without repeatedly reaching the identity
//! service.
//!
//! * [`IdManager`] resolves verification and signing keys according to a
//!   [`ValidationStrategy`], and verifies or signs tokens with them.
//! * [`TokenBroker`] exchanges [`Credentials`] for access tokens, keeping
//!   them encrypted with a [`CredentialCipher`] while cached.
//! * [`ResourceClient`] fetches resources, optionally authenticated with a
//!   token from the broker.
//! * [`rules`] holds simple authorization checks over verified [`Claims`].
//!
//! Caching is provided by the [`cache`] crate. Without a cache configured,
//! nothing is cached.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use aliri::jwt;
//! use cloud_id::{
//!     cache::MemoryCacheAdapter, CredentialCipher, Credentials, IdManager, ReqwestTransport,
//!     TokenBroker, ValidationStrategy, VerifyOptions,
//! };
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = Arc::new(
//!     IdManager::new(Arc::new(ReqwestTransport::new()?))
//!         .with_host("https://id.example.com")
//!         .with_cache(Arc::new(MemoryCacheAdapter::new()))
//!         .with_validation(
//!             ValidationStrategy::load_key("/id/key")
//!                 .with_audience(jwt::Audience::from_static("my_api")),
//!         ),
//! );
//!
//! let broker = TokenBroker::new(manager.clone(), CredentialCipher::new([0x42; 32])?);
//! let credentials: Credentials = serde_json::from_str(
//!     r#"{ "type": "oauth", "client_id": "svc", "client_secret": "s3cr3t", "aud": "my_api" }"#,
//! )?;
//!
//! if let Some(token) = broker.acquire(&credentials).await? {
//!     let claims = manager
//!         .verify(aliri::JwtRef::from_str(token.access_token.as_str()), &VerifyOptions::new())
//!         .await?;
//!     println!("issued to {:?}", claims.sub);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! * `reqwest` (default): Provides [`ReqwestTransport`].
//! * `redis` (default): Provides a Redis-backed shared cache.
//! * `rustls-tls`/`default-tls`: Selects the TLS stack used by `reqwest`.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

mod braids;
mod broker;
mod cipher;
mod claims;
pub mod error;
mod keys;
mod manager;
mod options;
mod resource;
pub mod rules;
mod strategy;
#[cfg(test)]
mod test;
mod transport;

pub use braids::*;
pub use broker::{BrokerConfig, Credentials, TokenBroker, TokenEnvelope};
pub use cipher::{CredentialCipher, SECRET_LEN};
pub use claims::Claims;
pub use cloud_id_cache as cache;
pub use manager::IdManager;
pub use options::{IdManagerConfig, SignOptions, VerifyOptions};
pub use resource::ResourceClient;
pub use strategy::{KeySource, ValidationStrategy};
#[cfg(feature = "reqwest")]
pub use transport::ReqwestTransport;
pub use transport::{ClientConfig, Transport, TransportResponse, DEFAULT_USER_AGENT};
