//! In-memory TLS credentials backed by a freshly generated, self-signed
//! P-384 certificate.
//!
//! ```no_run
//! use selfsigned::{common_name, tls_config};
//!
//! let config = tls_config([common_name("example.com")])?;
//! let server = config.server_config()?;
//! # let _ = server;
//! # Ok::<(), selfsigned::Error>(())
//! ```

pub mod config;
pub mod error;
pub mod generate;
pub mod inspect;
pub mod tls;

pub use config::{
    CertificateConfig, ConfigFile, ConfigOption, common_name, not_after, organization,
};
pub use error::{Error, InspectError, KeyPairError, Result};
pub use generate::{generate, load_key_pair, tls_config, tls_config_from};
pub use inspect::{CertDetails, Leaf, inspect_cert_pem, verify_hostname};
pub use tls::{Certificate, TlsConfig};
