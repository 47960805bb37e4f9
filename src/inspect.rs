//! Certificate inspection and hostname verification
//!
//! Parses X.509 certificates into plain Rust values and checks whether a
//! certificate names a given host. The host check looks at the name only;
//! validity dates and the issuer are not considered.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use rustls::pki_types::{CertificateDer, ServerName};
use serde::Serialize;
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};
use x509_parser::certificate::X509Certificate;
use x509_parser::error::X509Error;
use x509_parser::extensions::GeneralName;
use x509_parser::nom;
use x509_parser::parse_x509_certificate;
use x509_parser::x509::AttributeTypeAndValue;

use crate::error::{Error, InspectError, Result};

/// PEM label of an X.509 certificate block
pub const CERTIFICATE_TAG: &str = "CERTIFICATE";

type Parsed<T> = std::result::Result<T, InspectError>;

/// Parsed view of a leaf certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaf {
    pub subject: String,
    pub issuer: String,
    pub common_name: Option<String>,
    pub organization: Option<String>,
    /// Big-endian serial number without leading zero bytes
    pub serial: Vec<u8>,
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
    /// DNS names and IP addresses from the subjectAltName extension
    pub subject_alt_names: Vec<String>,
    pub fingerprint_sha256: String,
    pub self_signed: bool,
    /// DER-encoded SubjectPublicKeyInfo
    pub public_key_info: Vec<u8>,
}

impl Leaf {
    /// Parse a DER certificate
    pub fn from_der(der: &[u8]) -> Result<Self> {
        Ok(Self::parse(der)?)
    }

    pub(crate) fn parse(der: &[u8]) -> Parsed<Self> {
        let (_rem, x509) = parse_x509_certificate(der).map_err(|e| match e {
            nom::Err::Error(e) | nom::Err::Failure(e) => InspectError::Parse(e),
            nom::Err::Incomplete(_) => InspectError::Parse(X509Error::InvalidCertificate),
        })?;

        let validity = x509.validity();
        let serial = x509.raw_serial();
        let first_nonzero = serial.iter().position(|b| *b != 0).unwrap_or(serial.len());

        Ok(Self {
            subject: x509.subject().to_string(),
            issuer: x509.issuer().to_string(),
            common_name: first_attr(x509.subject().iter_common_name())?,
            organization: first_attr(x509.subject().iter_organization())?,
            serial: serial[first_nonzero..].to_vec(),
            not_before: validity.not_before.to_datetime(),
            not_after: validity.not_after.to_datetime(),
            subject_alt_names: extract_sans_from_cert(&x509)?,
            fingerprint_sha256: fingerprint_sha256(der),
            self_signed: x509.issuer() == x509.subject(),
            public_key_info: x509.public_key().raw.to_vec(),
        })
    }

    /// Serial number as lowercase hex
    pub fn serial_hex(&self) -> String {
        if self.serial.is_empty() {
            "00".to_string()
        } else {
            hex::encode(&self.serial)
        }
    }
}

fn first_attr<'a, 'b: 'a, I>(mut attrs: I) -> Parsed<Option<String>>
where
    I: Iterator<Item = &'a AttributeTypeAndValue<'b>>,
{
    attrs
        .next()
        .map(|attr| {
            attr.as_str()
                .map(str::to_string)
                .map_err(InspectError::DistinguishedName)
        })
        .transpose()
}

/// Extract Subject Alternative Names from X.509 certificate
fn extract_sans_from_cert(cert: &X509Certificate<'_>) -> Parsed<Vec<String>> {
    let mut sans = Vec::new();

    let ext = cert
        .subject_alternative_name()
        .map_err(InspectError::SubjectAltName)?;

    if let Some(san_ext) = ext {
        for name in &san_ext.value.general_names {
            match name {
                GeneralName::DNSName(dns) => sans.push(dns.to_string()),
                GeneralName::IPAddress(bytes) => {
                    let ip = match bytes.len() {
                        4 => <[u8; 4]>::try_from(*bytes).map(|b| IpAddr::V4(Ipv4Addr::from(b))),
                        16 => <[u8; 16]>::try_from(*bytes).map(|b| IpAddr::V6(Ipv6Addr::from(b))),
                        _ => continue, // Skip invalid IP
                    };
                    if let Ok(ip) = ip {
                        sans.push(ip.to_string());
                    }
                }
                _ => {}
            }
        }
    }

    Ok(sans)
}

/// SHA-256 over the DER bytes, lowercase hex
pub fn fingerprint_sha256(der: &[u8]) -> String {
    hex::encode(Sha256::digest(der))
}

/// Human-readable certificate summary
#[derive(Debug, Clone, Serialize)]
pub struct CertDetails {
    pub subject: String,
    pub issuer: String,
    pub common_name: Option<String>,
    pub organization: Option<String>,
    pub serial: String,

    #[serde(with = "time::serde::rfc3339")]
    pub not_before: OffsetDateTime,

    #[serde(with = "time::serde::rfc3339")]
    pub not_after: OffsetDateTime,

    /// not_after - now (negative if already expired)
    pub remaining_seconds: i64,

    /// e.g. "12d 3h 5m"
    pub remaining_human: String,

    pub subject_alt_names: Vec<String>,
    pub fingerprint_sha256: String,
    pub self_signed: bool,
}

impl CertDetails {
    pub fn new(leaf: &Leaf, now: OffsetDateTime) -> Self {
        let remaining = leaf.not_after - now;
        Self {
            subject: leaf.subject.clone(),
            issuer: leaf.issuer.clone(),
            common_name: leaf.common_name.clone(),
            organization: leaf.organization.clone(),
            serial: leaf.serial_hex(),
            not_before: leaf.not_before,
            not_after: leaf.not_after,
            remaining_seconds: remaining.whole_seconds(),
            remaining_human: format_remaining_compact(remaining),
            subject_alt_names: leaf.subject_alt_names.clone(),
            fingerprint_sha256: leaf.fingerprint_sha256.clone(),
            self_signed: leaf.self_signed,
        }
    }
}

/// Summarise a PEM document holding exactly one certificate
pub fn inspect_cert_pem(cert_pem: &[u8]) -> Result<CertDetails> {
    let der = extract_single_cert_der(cert_pem)?;
    let leaf = Leaf::from_der(&der)?;
    Ok(CertDetails::new(&leaf, OffsetDateTime::now_utc()))
}

fn extract_single_cert_der(cert_pem: &[u8]) -> Parsed<Vec<u8>> {
    let blocks = pem::parse_many(cert_pem).map_err(InspectError::Pem)?;

    let mut certs = blocks.into_iter().filter(|b| b.tag() == CERTIFICATE_TAG);
    let first = certs.next().ok_or(InspectError::NoCertificate)?;

    if certs.next().is_some() {
        return Err(InspectError::MultipleCertificates);
    }

    Ok(first.into_contents())
}

/// Check that `cert` names `host` in its subjectAltName extension.
///
/// `host` may be a DNS name or an IP literal. Only the name is compared: an
/// expired or untrusted certificate still passes if it names the host.
pub fn verify_hostname(cert: &CertificateDer<'_>, host: &str) -> Result<()> {
    let server_name = ServerName::try_from(host).map_err(|source| Error::InvalidHostname {
        host: host.to_string(),
        source,
    })?;

    webpki::EndEntityCert::try_from(cert)
        .and_then(|ee| ee.verify_is_valid_for_subject_name(&server_name))
        .map_err(|source| Error::Hostname {
            host: host.to_string(),
            source,
        })
}

/// Render a validity window as days, hours and minutes, or finer once under a
/// day. Expired windows get a leading `-`.
pub fn format_remaining_compact(d: Duration) -> String {
    let sign = if d.is_negative() { "-" } else { "" };
    let d = d.abs();

    let days = d.whole_days();
    let hours = d.whole_hours() % 24;
    let mins = d.whole_minutes() % 60;
    let secs = d.whole_seconds() % 60;

    match (days, hours, mins) {
        (0, 0, 0) => format!("{sign}{secs}s"),
        (0, 0, _) => format!("{sign}{mins}m {secs}s"),
        (0, _, _) => format!("{sign}{hours}h {mins}m {secs}s"),
        _ => format!("{sign}{days}d {hours}h {mins}m"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{common_name, not_after};
    use crate::generate::tls_config;

    #[test]
    fn remaining_formats() {
        assert_eq!(format_remaining_compact(Duration::seconds(42)), "42s");
        assert_eq!(format_remaining_compact(Duration::seconds(125)), "2m 5s");
        assert_eq!(format_remaining_compact(Duration::seconds(3_725)), "1h 2m 5s");
        assert_eq!(
            format_remaining_compact(Duration::days(12) + Duration::minutes(65)),
            "12d 1h 5m"
        );
        assert_eq!(format_remaining_compact(Duration::seconds(-90)), "-1m 30s");
    }

    #[test]
    fn inspect_generated_certificate() {
        let t = OffsetDateTime::now_utc() + Duration::days(30);
        let cfg = tls_config([common_name("inspect.example"), not_after(t)]).unwrap();
        let cert = cfg.certificate().unwrap();

        let details = inspect_cert_pem(cert.cert_pem.as_bytes()).unwrap();
        assert_eq!(details.common_name.as_deref(), Some("inspect.example"));
        assert_eq!(details.organization.as_deref(), Some("self-signed"));
        assert_eq!(details.subject_alt_names, vec!["inspect.example".to_string()]);
        assert!(details.self_signed);
        assert_eq!(details.fingerprint_sha256.len(), 64);
        assert!(details.remaining_seconds > 29 * 86_400);
        let human = &details.remaining_human;
        assert!(human.starts_with("29d") || human.starts_with("30d"), "{human}");
    }

    #[test]
    fn inspect_rejects_key_only_and_multiple_certs() {
        let cfg = tls_config([]).unwrap();
        let cert = cfg.certificate().unwrap();

        let err = inspect_cert_pem(cert.key_pem.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Inspect(InspectError::NoCertificate)));

        let doubled = format!("{}{}", cert.cert_pem, cert.cert_pem);
        let err = inspect_cert_pem(doubled.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Inspect(InspectError::MultipleCertificates)));

        // Combined cert + key files are fine
        let combined = format!("{}{}", cert.cert_pem, cert.key_pem);
        assert!(inspect_cert_pem(combined.as_bytes()).is_ok());
    }

    #[test]
    fn garbage_der_is_an_inspect_error() {
        let err = Leaf::from_der(b"not a certificate").unwrap_err();
        assert!(matches!(err, Error::Inspect(InspectError::Parse(_))));
    }

    #[test]
    fn hostname_verification_uses_the_san() {
        let cfg = tls_config([common_name("example.com")]).unwrap();
        let leaf = &cfg.certificate().unwrap().chain[0];

        verify_hostname(leaf, "example.com").unwrap();

        let err = verify_hostname(leaf, "other.example.com").unwrap_err();
        assert!(matches!(err, Error::Hostname { .. }));

        let err = verify_hostname(leaf, "not a hostname").unwrap_err();
        assert!(matches!(err, Error::InvalidHostname { .. }));
    }

    #[test]
    fn expired_certificate_still_matches_its_name() {
        let past = OffsetDateTime::now_utc() - Duration::days(2);
        let cfg = tls_config([common_name("example.com"), not_after(past)]).unwrap();
        let leaf = &cfg.certificate().unwrap().chain[0];

        verify_hostname(leaf, "example.com").unwrap();
        assert!(matches!(
            verify_hostname(leaf, "example.org"),
            Err(Error::Hostname { .. })
        ));
    }

    #[test]
    fn ip_common_name_verifies_as_ip() {
        let cfg = tls_config([common_name("127.0.0.1")]).unwrap();
        let cert = cfg.certificate().unwrap();

        assert_eq!(cert.leaf.subject_alt_names, vec!["127.0.0.1".to_string()]);
        verify_hostname(&cert.chain[0], "127.0.0.1").unwrap();
        assert!(verify_hostname(&cert.chain[0], "127.0.0.2").is_err());
    }
}
