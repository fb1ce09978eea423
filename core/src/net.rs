/*
 * net.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Postino, a synchronous HTTP client library.
 *
 * Postino is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Postino is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Postino.  If not, see <http://www.gnu.org/licenses/>.
 */

//! TLS client configurations: normal verification, and the two trust bypasses
//! (any certificate, or a valid certificate for any host name).
//!
//! Each configuration is built on first use and then shared by every connection made
//! through the same `TlsConfig`.

use std::fmt;
use std::sync::{Arc, OnceLock};

use log::trace;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::WebPkiServerVerifier;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{
    CertificateError, ClientConfig, DigitallySignedStruct, Error as TlsError, RootCertStore,
    SignatureScheme,
};

use crate::error::{HttpError, Result};

/// Build a root certificate store: platform native certs first, then webpki-roots as fallback.
pub fn build_root_store() -> RootCertStore {
    let mut root_store = RootCertStore::empty();
    if let Ok(certs) = rustls_native_certs::load_native_certs() {
        for cert in certs {
            let _ = root_store.add(cert);
        }
    }
    if root_store.is_empty() {
        root_store.roots = webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect();
    }
    root_store
}

/// Owner of the TLS client configurations used by an `HttpClient`.
pub struct TlsConfig {
    roots: OnceLock<Arc<RootCertStore>>,
    verifying: OnceLock<Arc<ClientConfig>>,
    trust_all: OnceLock<Arc<ClientConfig>>,
    any_hostname: OnceLock<Arc<ClientConfig>>,
}

impl TlsConfig {
    /// Roots are loaded lazily from the platform store, or webpki-roots.
    pub fn new() -> Self {
        Self {
            roots: OnceLock::new(),
            verifying: OnceLock::new(),
            trust_all: OnceLock::new(),
            any_hostname: OnceLock::new(),
        }
    }

    /// Use a fixed set of trust anchors (e.g. a private CA).
    pub fn with_roots(roots: RootCertStore) -> Self {
        let config = Self::new();
        let _ = config.roots.set(Arc::new(roots));
        config
    }

    fn roots(&self) -> Arc<RootCertStore> {
        self.roots.get_or_init(|| Arc::new(build_root_store())).clone()
    }

    /// Client configuration for the given trust overrides. Trusting all certificates
    /// implies trusting all host names.
    pub fn client_config(&self, trust_all_certs: bool, trust_all_hosts: bool) -> Result<Arc<ClientConfig>> {
        if trust_all_certs {
            return Ok(self
                .trust_all
                .get_or_init(|| {
                    trace!("building trust-all TLS configuration");
                    Arc::new(
                        ClientConfig::builder()
                            .dangerous()
                            .with_custom_certificate_verifier(Arc::new(NoVerifier))
                            .with_no_client_auth(),
                    )
                })
                .clone());
        }
        if trust_all_hosts {
            if let Some(config) = self.any_hostname.get() {
                return Ok(config.clone());
            }
            trace!("building any-hostname TLS configuration");
            let inner = WebPkiServerVerifier::builder(self.roots())
                .build()
                .map_err(|e| HttpError::configuration(format!("TLS verifier: {}", e)))?;
            let config = Arc::new(
                ClientConfig::builder()
                    .dangerous()
                    .with_custom_certificate_verifier(Arc::new(AnyHostnameVerifier { inner }))
                    .with_no_client_auth(),
            );
            return Ok(self.any_hostname.get_or_init(|| config).clone());
        }
        Ok(self
            .verifying
            .get_or_init(|| {
                Arc::new(
                    ClientConfig::builder()
                        .with_root_certificates(self.roots())
                        .with_no_client_auth(),
                )
            })
            .clone())
    }
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsConfig")
            .field("roots_loaded", &self.roots.get().is_some())
            .field("trust_all_built", &self.trust_all.get().is_some())
            .field("any_hostname_built", &self.any_hostname.get().is_some())
            .finish()
    }
}

/// Server name for the handshake, from a URL host.
pub fn server_name(host: &str) -> Result<ServerName<'static>> {
    ServerName::try_from(host)
        .map(|n| n.to_owned())
        .map_err(|_| HttpError::configuration(format!("invalid TLS server name: {}", host)))
}

/// Accepts every certificate.
#[derive(Debug)]
struct NoVerifier;

impl ServerCertVerifier for NoVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, TlsError> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, TlsError> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, TlsError> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA1,
            SignatureScheme::ECDSA_SHA1_Legacy,
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::ECDSA_NISTP521_SHA512,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ED25519,
            SignatureScheme::ED448,
        ]
    }
}

/// Full chain verification, but a certificate issued for another name is accepted.
#[derive(Debug)]
struct AnyHostnameVerifier {
    inner: Arc<WebPkiServerVerifier>,
}

impl ServerCertVerifier for AnyHostnameVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, TlsError> {
        match self
            .inner
            .verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now)
        {
            Err(TlsError::InvalidCertificate(CertificateError::NotValidForName)) => {
                Ok(ServerCertVerified::assertion())
            }
            other => other,
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, TlsError> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, TlsError> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}
