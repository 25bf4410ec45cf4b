//! TLS certificate inspection.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::DateTime;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, WebPkiSupportedAlgorithms};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use x509_parser::prelude::*;

use urlhawk_core::{Outcome, Target};

use crate::error::{EngineError, Result};
use crate::probe::{Probe, ProbeContext};
use crate::probes::invalid_domain;

const NO_TLS: &str = "No SSL/TLS on port 443 (or timed out)";
const NO_CERTIFICATES: &str = "No certificates found";
const EXPIRY_FORMAT: &str = "%d %b %y %H:%M UTC";

/// Accepts any server certificate. Handshake signatures are still checked
/// so the session itself is sound.
#[derive(Debug)]
struct AcceptAnyCert {
    algorithms: WebPkiSupportedAlgorithms,
}

impl ServerCertVerifier for AcceptAnyCert {
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
        verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}

/// A TLS connector that completes handshakes with self-signed, expired, or
/// mismatched certificates so they can be reported on.
pub fn insecure_connector() -> Result<TlsConnector> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let verifier = Arc::new(AcceptAnyCert {
        algorithms: provider.signature_verification_algorithms,
    });

    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| EngineError::Tls(e.to_string()))?
        .dangerous()
        .with_custom_certificate_verifier(verifier)
        .with_no_client_auth();

    Ok(TlsConnector::from(Arc::new(config)))
}

pub struct SslCertificate;

#[async_trait]
impl Probe for SslCertificate {
    async fn execute(&self, ctx: ProbeContext, target: Target) -> Outcome {
        let domain = target.domain();
        if domain.is_empty() {
            return invalid_domain();
        }
        let Ok(server_name) = ServerName::try_from(domain.as_str()).map(|name| name.to_owned()) else {
            return invalid_domain();
        };

        let port = ctx.settings().tls_port;
        let connector = ctx.tls().clone();
        let handshake = async {
            let tcp = TcpStream::connect((domain.as_str(), port)).await?;
            connector.connect(server_name, tcp).await
        };

        let stream = match ctx.deadline.race(handshake).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                tracing::debug!(domain = %domain, port, error = %e, "TLS handshake failed");
                return Outcome::error(NO_TLS);
            }
            Err(_) => return Outcome::error(NO_TLS),
        };

        let leaf = stream
            .get_ref()
            .1
            .peer_certificates()
            .and_then(|certs| certs.first());
        match leaf {
            Some(cert) => describe_certificate(cert.as_ref()),
            None => Outcome::error(NO_CERTIFICATES),
        }
    }
}

fn describe_certificate(der: &[u8]) -> Outcome {
    let cert = match X509Certificate::from_der(der) {
        Ok((_, cert)) => cert,
        Err(e) => {
            tracing::debug!(error = %e, "Unparsable leaf certificate");
            return Outcome::error(NO_CERTIFICATES);
        }
    };

    let validity = cert.validity();
    let expires = DateTime::from_timestamp(validity.not_after.timestamp(), 0)
        .map(|t| t.format(EXPIRY_FORMAT).to_string())
        .unwrap_or_else(|| validity.not_after.to_string());

    let algorithm = signature_algorithm_name(&cert.signature_algorithm.algorithm.to_id_string());

    Outcome::map([
        ("Subject", common_name(cert.subject())),
        ("Issuer", common_name(cert.issuer())),
        ("Expires", expires),
        ("Valid Now", validity.is_valid().to_string()),
        ("Algorithm", algorithm),
    ])
}

fn common_name(name: &X509Name<'_>) -> String {
    name.iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// Human-readable name for a certificate signature algorithm OID.
pub fn signature_algorithm_name(oid: &str) -> String {
    let name = match oid {
        "1.2.840.113549.1.1.4" => "MD5-RSA",
        "1.2.840.113549.1.1.5" => "SHA1-RSA",
        "1.2.840.113549.1.1.10" => "RSA-PSS",
        "1.2.840.113549.1.1.11" => "SHA256-RSA",
        "1.2.840.113549.1.1.12" => "SHA384-RSA",
        "1.2.840.113549.1.1.13" => "SHA512-RSA",
        "1.2.840.10045.4.1" => "ECDSA-SHA1",
        "1.2.840.10045.4.3.2" => "ECDSA-SHA256",
        "1.2.840.10045.4.3.3" => "ECDSA-SHA384",
        "1.2.840.10045.4.3.4" => "ECDSA-SHA512",
        "1.3.101.112" => "Ed25519",
        other => return other.to_string(),
    };
    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_algorithm_names() {
        assert_eq!(signature_algorithm_name("1.2.840.113549.1.1.11"), "SHA256-RSA");
        assert_eq!(signature_algorithm_name("1.2.840.10045.4.3.2"), "ECDSA-SHA256");
        assert_eq!(signature_algorithm_name("1.3.101.112"), "Ed25519");
    }

    #[test]
    fn test_unknown_algorithm_falls_back_to_oid() {
        assert_eq!(signature_algorithm_name("1.2.3.4"), "1.2.3.4");
    }

    #[test]
    fn test_connector_builds() {
        assert!(insecure_connector().is_ok());
    }

    #[test]
    fn test_garbage_certificate() {
        let outcome = describe_certificate(b"not a certificate");
        assert_eq!(outcome.error_message(), Some(NO_CERTIFICATES));
    }
}
