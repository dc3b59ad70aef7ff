//! Mutual TLS channel policy.
//!
//! [`ChannelPolicy`] is built once at startup from three PEM blobs: the server
//! certificate chain, its private key, and the bundle of issuers trusted to
//! sign client certificates. The resulting policy
//!
//! - presents the server chain to every client,
//! - requires every client to present a certificate, and
//! - rejects, during the handshake, any client certificate that does not
//!   chain to a trusted issuer.
//!
//! All parsing happens up front so bad inputs fail with a typed error before
//! the listener is bound. The policy is immutable afterwards and cheap to
//! clone into the server builder.

use crate::server::config::TlsPaths;
use base64::{Engine, engine::general_purpose::STANDARD};
use prodinfo_core::{Error, Result};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, pem::PemObject};
use rustls::server::WebPkiClientVerifier;
use rustls::{RootCertStore, ServerConfig};
use std::path::Path;
use std::sync::Arc;
use tonic::transport::{Certificate, Identity, ServerTlsConfig};

/// Immutable transport policy shared by all connections of a server.
#[derive(Clone)]
pub struct ChannelPolicy {
    tls: ServerTlsConfig,
    chain_len: usize,
    trust_anchors: usize,
}

impl core::fmt::Debug for ChannelPolicy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ChannelPolicy")
            .field("chain_len", &self.chain_len)
            .field("trust_anchors", &self.trust_anchors)
            .finish_non_exhaustive()
    }
}

impl ChannelPolicy {
    /// Builds a policy from in-memory PEM data.
    ///
    /// # Errors
    ///
    /// - [`Error::CertificateLoad`] if the chain is empty or malformed, the key
    ///   cannot be parsed, or rustls rejects the pair.
    /// - [`Error::TrustBundle`] if the bundle holds no certificate usable as a
    ///   trust anchor. Unusable entries next to usable ones are skipped.
    pub fn build(cert_pem: &[u8], key_pem: &[u8], trust_bundle_pem: &[u8]) -> Result<Self> {
        let chain = CertificateDer::pem_slice_iter(cert_pem)
            .collect::<core::result::Result<Vec<_>, _>>()
            .map_err(|e| cert_error(format!("malformed server certificate PEM: {e}")))?;
        if chain.is_empty() {
            return Err(cert_error("no certificate found in server certificate PEM"));
        }
        let key = PrivateKeyDer::from_pem_slice(key_pem)
            .map_err(|e| cert_error(format!("unable to parse server private key: {e}")))?;

        let (roots, anchors_pem) = parse_trust_bundle(trust_bundle_pem)?;
        let trust_anchors = roots.len();

        // tonic assembles its own acceptor from the same material; building
        // the rustls config here is what checks the key against the chain.
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let verifier =
            WebPkiClientVerifier::builder_with_provider(Arc::new(roots), Arc::clone(&provider))
                .build()
                .map_err(|e| Error::TrustBundle {
                    reason: format!("unable to build client verifier: {e}"),
                })?;
        let chain_len = chain.len();
        ServerConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| cert_error(e.to_string()))?
            .with_client_cert_verifier(verifier)
            .with_single_cert(chain, key)
            .map_err(|e| cert_error(format!("server certificate and key are unusable: {e}")))?;

        let tls = ServerTlsConfig::new()
            .identity(Identity::from_pem(cert_pem, key_pem))
            .client_ca_root(Certificate::from_pem(anchors_pem))
            .client_auth_optional(false);

        Ok(Self {
            tls,
            chain_len,
            trust_anchors,
        })
    }

    /// Reads the three PEM files named by `paths` and builds the policy.
    ///
    /// An unreadable certificate or key file is [`Error::CertificateLoad`];
    /// an unreadable bundle is [`Error::TrustBundle`].
    pub fn load(paths: &TlsPaths) -> Result<Self> {
        let cert_pem = read_pem(&paths.cert)
            .map_err(|e| cert_error(format!("failed to read certificate: {e}")))?;
        let key_pem = read_pem(&paths.key)
            .map_err(|e| cert_error(format!("failed to read private key: {e}")))?;
        let bundle_pem = read_pem(&paths.trust_bundle).map_err(|e| Error::TrustBundle {
            reason: format!("failed to read trust bundle: {e}"),
        })?;

        Self::build(&cert_pem, &key_pem, &bundle_pem)
    }

    /// Transport configuration handed to `tonic::transport::Server`.
    pub fn server_tls_config(&self) -> ServerTlsConfig {
        self.tls.clone()
    }

    /// Number of certificates in the presented server chain.
    pub fn chain_len(&self) -> usize {
        self.chain_len
    }

    /// Number of issuers accepted for client certificates.
    pub fn trust_anchors(&self) -> usize {
        self.trust_anchors
    }
}

fn read_pem(path: &Path) -> core::result::Result<Vec<u8>, String> {
    std::fs::read(path).map_err(|e| format!("'{}': {e}", path.display()))
}

fn cert_error(reason: impl Into<String>) -> Error {
    Error::CertificateLoad {
        reason: reason.into(),
    }
}

/// Collects the usable trust anchors of `pem` into a root store, and
/// re-encodes exactly those anchors as PEM so the acceptor sees the same set.
fn parse_trust_bundle(pem: &[u8]) -> Result<(RootCertStore, Vec<u8>)> {
    let mut roots = RootCertStore::empty();
    let mut anchors_pem = String::new();
    let mut rejected = 0usize;

    for entry in CertificateDer::pem_slice_iter(pem) {
        let Ok(cert) = entry else {
            rejected += 1;
            continue;
        };
        if roots.add(cert.clone()).is_err() {
            rejected += 1;
            continue;
        }
        push_pem_certificate(&mut anchors_pem, &cert);
    }

    if roots.is_empty() {
        return Err(Error::TrustBundle {
            reason: format!("no usable certificates in trust bundle ({rejected} rejected)"),
        });
    }
    if rejected > 0 {
        tracing::warn!(rejected, "skipped unusable entries in trust bundle");
    }
    Ok((roots, anchors_pem.into_bytes()))
}

fn push_pem_certificate(out: &mut String, der: &CertificateDer<'_>) {
    let encoded = STANDARD.encode(der.as_ref());
    out.push_str("-----BEGIN CERTIFICATE-----\n");
    for (i, c) in encoded.chars().enumerate() {
        if i > 0 && i % 64 == 0 {
            out.push('\n');
        }
        out.push(c);
    }
    out.push_str("\n-----END CERTIFICATE-----\n");
}
