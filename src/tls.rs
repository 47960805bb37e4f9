//! Transport-security configuration built from a generated credential
//!
//! [`TlsConfig`] owns the certificate and private key and turns them into
//! rustls server and client configurations on demand. Every config built here
//! uses its own ring [`CryptoProvider`]; the process-wide default provider is
//! never read or installed.

use std::sync::Arc;

use log::warn;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::{
    ClientConfig, DigitallySignedStruct, RootCertStore, ServerConfig, SignatureAlgorithm,
    SignatureScheme,
};

use crate::error::{Error, Result};
use crate::inspect::Leaf;

/// The ring provider used for every config this crate builds
pub fn crypto_provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

/// A leaf certificate together with its private key
#[derive(Debug)]
pub struct Certificate {
    /// DER certificate chain; the generated leaf is the only entry
    pub chain: Vec<CertificateDer<'static>>,
    /// SEC1 EC private key
    pub private_key: PrivateKeyDer<'static>,
    /// Parsed view of `chain[0]`
    pub leaf: Leaf,
    /// `CERTIFICATE` PEM block
    pub cert_pem: String,
    /// `EC PRIVATE KEY` PEM block
    pub key_pem: String,
}

impl Clone for Certificate {
    fn clone(&self) -> Self {
        Self {
            chain: self.chain.clone(),
            private_key: self.private_key.clone_key(),
            leaf: self.leaf.clone(),
            cert_pem: self.cert_pem.clone(),
            key_pem: self.key_pem.clone(),
        }
    }
}

impl Certificate {
    /// Algorithm of the signing key as rustls loads it
    pub fn signing_key_algorithm(&self) -> Result<SignatureAlgorithm> {
        let key = crypto_provider()
            .key_provider
            .load_private_key(self.private_key.clone_key())?;
        Ok(key.algorithm())
    }

    /// Whether the private key is an elliptic-curve (SEC1) key
    pub fn is_ec_key(&self) -> bool {
        matches!(self.private_key, PrivateKeyDer::Sec1(_))
    }
}

/// Certificates plus peer-verification policy, handed to a TLS server or client
#[derive(Debug, Clone)]
pub struct TlsConfig {
    pub certificates: Vec<Certificate>,
    /// Accept any server certificate when used client-side. Off unless the
    /// caller turns it on.
    pub insecure_skip_verify: bool,
}

impl TlsConfig {
    /// Config holding exactly `certificate`
    pub fn new(certificate: Certificate) -> Self {
        Self {
            certificates: vec![certificate],
            insecure_skip_verify: false,
        }
    }

    /// The certificate presented by servers built from this config
    pub fn certificate(&self) -> Option<&Certificate> {
        self.certificates.first()
    }

    pub fn with_insecure_skip_verify(mut self, skip: bool) -> Self {
        self.insecure_skip_verify = skip;
        self
    }

    fn require_certificate(&self) -> Result<&Certificate> {
        self.certificate().ok_or(Error::NoCertificate)
    }

    /// Server configuration presenting the certificate, without client auth
    pub fn server_config(&self) -> Result<Arc<ServerConfig>> {
        let cert = self.require_certificate()?;

        let config = ServerConfig::builder_with_provider(crypto_provider())
            .with_safe_default_protocol_versions()?
            .with_no_client_auth()
            .with_single_cert(cert.chain.clone(), cert.private_key.clone_key())?;

        Ok(Arc::new(config))
    }

    /// Client configuration that trusts exactly this certificate.
    ///
    /// With `insecure_skip_verify` set, any server certificate is accepted;
    /// handshake signatures are still checked.
    pub fn client_config(&self) -> Result<Arc<ClientConfig>> {
        let provider = crypto_provider();
        let builder = ClientConfig::builder_with_provider(provider.clone())
            .with_safe_default_protocol_versions()?;

        let config = if self.insecure_skip_verify {
            warn!("TLS certificate verification disabled - DO NOT USE IN PRODUCTION");
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(SkipServerVerification(provider)))
                .with_no_client_auth()
        } else {
            let cert = self.require_certificate()?;
            let mut roots = RootCertStore::empty();
            roots.add(cert.chain[0].clone())?;
            builder.with_root_certificates(roots).with_no_client_auth()
        };

        Ok(Arc::new(config))
    }
}

/// Accepts any server certificate but still verifies handshake signatures
#[derive(Debug)]
struct SkipServerVerification(Arc<CryptoProvider>);

impl ServerCertVerifier for SkipServerVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}
