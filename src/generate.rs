//! Self-signed credential generation
//!
//! One call produces one fresh P-384 key pair and one self-signed leaf
//! certificate. Nothing is cached or written anywhere; the key lives only in
//! the returned [`Certificate`].

use std::net::IpAddr;

use log::{debug, info};
use p384::pkcs8::{DecodePrivateKey, EncodePublicKey};
use pem::Pem;
use rcgen::string::Ia5String;
use rcgen::{
    CertificateParams, DistinguishedName, DnType, ExtendedKeyUsagePurpose, IsCa, KeyPair,
    KeyUsagePurpose, PKCS_ECDSA_P384_SHA384, SanType, SerialNumber,
};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use time::OffsetDateTime;

use crate::config::{CertificateConfig, ConfigOption};
use crate::error::{Error, KeyPairError, Result};
use crate::inspect::{CERTIFICATE_TAG, Leaf};
use crate::tls::{Certificate, TlsConfig};

/// PEM label of a SEC1 elliptic-curve private key block
pub const EC_PRIVATE_KEY_TAG: &str = "EC PRIVATE KEY";

/// Serial numbers are drawn uniformly from [0, 2^128)
const SERIAL_LEN: usize = 16;

/// Build a TLS config around a new self-signed certificate.
///
/// `opts` are applied in order over the defaults (`localhost`, organization
/// `self-signed`, valid for ten years).
///
/// The common name is repeated as the only subjectAltName entry. A common
/// name that parses as an IP address is written as an `iPAddress` SAN rather
/// than a `dNSName`, so clients connecting by IP can verify it.
pub fn tls_config<I>(opts: I) -> Result<TlsConfig>
where
    I: IntoIterator<Item = ConfigOption>,
{
    tls_config_from(&CertificateConfig::from_options(opts))
}

/// Same as [`tls_config`] for an already resolved configuration
pub fn tls_config_from(config: &CertificateConfig) -> Result<TlsConfig> {
    Ok(TlsConfig::new(generate(config)?))
}

/// Generate a key pair and a self-signed certificate for `config`
pub fn generate(config: &CertificateConfig) -> Result<Certificate> {
    debug!(
        "Generating self-signed certificate (CN={}, O={:?}, not_after={})",
        config.common_name, config.organization, config.not_after
    );

    let key_pair = KeyPair::generate_for(&PKCS_ECDSA_P384_SHA384).map_err(Error::KeyGeneration)?;

    let serial = random_serial()?;
    debug!("Certificate serial: {}", hex::encode(serial));

    let params = certificate_params(config, &serial)?;
    let cert = params
        .self_signed(&key_pair)
        .map_err(Error::CertificateCreation)?;

    let key_pem = encode_ec_private_key(&key_pair)?;
    let cert_pem = pem::encode(&Pem::new(CERTIFICATE_TAG, cert.der().to_vec()));

    let certificate = load_key_pair(cert_pem, key_pem)?;

    info!(
        "Issued self-signed certificate for '{}' valid until {}",
        config.common_name, certificate.leaf.not_after
    );

    Ok(certificate)
}

fn random_serial() -> Result<[u8; SERIAL_LEN]> {
    let mut serial = [0u8; SERIAL_LEN];
    getrandom::fill(&mut serial).map_err(Error::SerialNumber)?;
    Ok(serial)
}

fn certificate_params(config: &CertificateConfig, serial: &[u8]) -> Result<CertificateParams> {
    let mut params = CertificateParams::default();

    params.serial_number = Some(SerialNumber::from_slice(serial));

    let mut dn = DistinguishedName::new();
    if let Some(org) = &config.organization {
        dn.push(DnType::OrganizationName, org.clone());
    }
    dn.push(DnType::CommonName, config.common_name.clone());
    params.distinguished_name = dn;

    params.not_before = OffsetDateTime::now_utc();
    params.not_after = config.not_after;

    params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyEncipherment,
    ];
    params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];
    params.is_ca = IsCa::ExplicitNoCa;

    params.subject_alt_names = vec![subject_alt_name(&config.common_name)?];

    Ok(params)
}

/// IP literals become iPAddress entries, everything else a dNSName
fn subject_alt_name(common_name: &str) -> Result<SanType> {
    if let Ok(ip) = common_name.parse::<IpAddr>() {
        return Ok(SanType::IpAddress(ip));
    }
    let dns = Ia5String::try_from(common_name.to_string()).map_err(Error::CertificateCreation)?;
    Ok(SanType::DnsName(dns))
}

/// SEC1 DER wrapped in an `EC PRIVATE KEY` PEM block
fn encode_ec_private_key(key_pair: &KeyPair) -> Result<String> {
    let secret = p384::SecretKey::from_pkcs8_der(key_pair.serialized_der())
        .map_err(Error::KeyEncoding)?;
    let sec1 = secret
        .to_sec1_der()
        .map_err(|e| Error::KeyEncoding(e.into()))?;

    Ok(pem::encode(&Pem::new(EC_PRIVATE_KEY_TAG, sec1.to_vec())))
}

/// Reassemble a certificate and its P-384 private key from PEM.
///
/// Fails unless the key is a SEC1 EC key whose public half matches the
/// certificate's SubjectPublicKeyInfo.
pub fn load_key_pair(cert_pem: String, key_pem: String) -> Result<Certificate> {
    let (chain, private_key, leaf) =
        parse_key_pair(&cert_pem, &key_pem).map_err(Error::KeyPairReload)?;

    Ok(Certificate {
        chain,
        private_key,
        leaf,
        cert_pem,
        key_pem,
    })
}

type KeyPairParts = (Vec<CertificateDer<'static>>, PrivateKeyDer<'static>, Leaf);

fn parse_key_pair(
    cert_pem: &str,
    key_pem: &str,
) -> std::result::Result<KeyPairParts, KeyPairError> {
    let mut cert_slice = cert_pem.as_bytes();
    let chain = rustls_pemfile::certs(&mut cert_slice)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(KeyPairError::CertificatePem)?;

    let leaf_der = chain.first().ok_or(KeyPairError::MissingCertificate)?;

    let mut key_slice = key_pem.as_bytes();
    let private_key = rustls_pemfile::private_key(&mut key_slice)
        .map_err(KeyPairError::PrivateKeyPem)?
        .ok_or(KeyPairError::MissingPrivateKey)?;

    let PrivateKeyDer::Sec1(sec1) = &private_key else {
        return Err(KeyPairError::NotEcKey);
    };

    let secret = p384::SecretKey::from_sec1_der(sec1.secret_sec1_der())
        .map_err(KeyPairError::InvalidKey)?;
    let public_key_info = secret
        .public_key()
        .to_public_key_der()
        .map_err(KeyPairError::PublicKey)?;

    let leaf = Leaf::parse(leaf_der).map_err(KeyPairError::Certificate)?;

    if leaf.public_key_info != public_key_info.as_bytes() {
        return Err(KeyPairError::Mismatch);
    }

    Ok((chain, private_key, leaf))
}
