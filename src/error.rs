//! Error types for credential generation
//!
//! Every generation stage has its own variant so callers can tell which step
//! failed. None of them are retried: a failed call produces no credential.
//! Messages name the stage only; the underlying cause is reachable through
//! [`std::error::Error::source`].

use rustls::pki_types::InvalidDnsNameError;
use thiserror::Error;
use x509_parser::error::X509Error;

/// Central error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    // === Generation stages ===
    #[error("failed to generate private key")]
    KeyGeneration(#[source] rcgen::Error),

    #[error("failed to generate serial number")]
    SerialNumber(#[source] getrandom::Error),

    #[error("failed to create certificate")]
    CertificateCreation(#[source] rcgen::Error),

    #[error("failed to marshal private key")]
    KeyEncoding(#[source] p384::pkcs8::Error),

    #[error("failed to load key pair")]
    KeyPairReload(#[source] KeyPairError),

    // === Consumers of the credential ===
    #[error("TLS configuration error")]
    Tls(#[from] rustls::Error),

    #[error("TLS config holds no certificate")]
    NoCertificate,

    #[error("certificate inspection failed")]
    Inspect(#[from] InspectError),

    #[error("'{host}' is not a valid DNS name or IP address")]
    InvalidHostname {
        host: String,
        #[source]
        source: InvalidDnsNameError,
    },

    #[error("hostname verification failed for '{host}'")]
    Hostname {
        host: String,
        #[source]
        source: webpki::Error,
    },

    // === Configuration ===
    #[error("invalid configuration")]
    Config(#[source] toml::de::Error),

    #[error("I/O error")]
    Io(#[from] std::io::Error),
}

/// Why a certificate and private key could not be put back together
#[derive(Error, Debug)]
pub enum KeyPairError {
    #[error("failed to decode certificate PEM")]
    CertificatePem(#[source] std::io::Error),

    #[error("no certificate found in PEM")]
    MissingCertificate,

    #[error("failed to decode private key PEM")]
    PrivateKeyPem(#[source] std::io::Error),

    #[error("no private key found in PEM")]
    MissingPrivateKey,

    #[error("expected an EC private key")]
    NotEcKey,

    #[error("invalid P-384 private key")]
    InvalidKey(#[source] p384::elliptic_curve::Error),

    #[error("failed to encode public key")]
    PublicKey(#[source] p384::pkcs8::spki::Error),

    #[error("unreadable certificate")]
    Certificate(#[source] InspectError),

    #[error("private key does not match certificate public key")]
    Mismatch,
}

/// Why a certificate could not be parsed or summarised
#[derive(Error, Debug)]
pub enum InspectError {
    #[error("failed to decode PEM")]
    Pem(#[source] pem::PemError),

    #[error("PEM contained no certificates")]
    NoCertificate,

    #[error("PEM contained multiple certificates; expected exactly one")]
    MultipleCertificates,

    #[error("x509 parse error")]
    Parse(#[source] X509Error),

    #[error("certificate DN contains non-UTF8 or unsupported ASN.1 string")]
    DistinguishedName(#[source] X509Error),

    #[error("invalid subjectAltName extension")]
    SubjectAltName(#[source] X509Error),
}

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;
