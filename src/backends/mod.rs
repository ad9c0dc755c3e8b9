//! Built-in candidate sources and probes.
//!
//! ## Available Backends
//!
//! - [`mock`] - Mock sources and probes for testing
//! - [`static_list`] - A fixed list of candidate names
//! - [`wordlist`] - Active enumeration from a wordlist
//! - [`dns`] - DNS resolution through the system resolver
//! - [`classifier`] - Cloudflare classification from the `Server` header
//! - [`http`] - HTTP(S) probing and the crt.sh, HackerTarget and OTX sources
//!   (requires `http` feature)
//!
//! ## Implementing a Custom Probe
//!
//! ```rust,ignore
//! use subscout::core::{Probe, ProbeError, ProbeTarget, ResultRecord};
//! use async_trait::async_trait;
//!
//! #[derive(Debug)]
//! pub struct MyProbe;
//!
//! #[async_trait]
//! impl Probe for MyProbe {
//!     fn name(&self) -> &str {
//!         "my-probe"
//!     }
//!
//!     async fn probe(&self, target: &ProbeTarget) -> Result<Option<ResultRecord>, ProbeError> {
//!         Ok(Some(ResultRecord::new(&target.subdomain).with_server("example")))
//!     }
//! }
//! ```

pub mod classifier;
pub mod dns;
pub mod mock;
pub mod static_list;
pub mod wordlist;

#[cfg(feature = "http")]
pub mod http;

// Re-exports
pub use classifier::ServerHeaderClassifier;
pub use dns::DnsProbe;
pub use mock::{MockProbe, MockSource};
pub use static_list::StaticSource;
pub use wordlist::{WordlistSource, DEFAULT_WORDLIST};

#[cfg(feature = "http")]
pub use http::{CrtShSource, HackerTargetSource, HttpProbe, HttpProbeConfig, OtxSource, Scheme};
