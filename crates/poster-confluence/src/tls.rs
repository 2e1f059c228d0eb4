//! Client certificate loading for mutual TLS.
//!
//! Certificates and keys are PEM files. Server verification is left at the
//! ureq defaults; only the client identity is added.

use std::path::Path;

use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, EncodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use ureq::tls::{Certificate, ClientCert, PemItem, PrivateKey, TlsConfig, parse_pem};

use crate::error::SessionError;

/// Build a TLS config presenting the given client certificate.
pub(crate) fn client_tls_config(key_path: &Path, cert_path: &Path) -> Result<TlsConfig, SessionError> {
    let certs = load_certificates(cert_path)?;
    let key_pem = read_pem(key_path)?;
    let key = PrivateKey::from_pem(&key_pem).map_err(|e| load_error(key_path, e))?;

    if let Some(public_key) = rsa_public_key_der(&key_pem) {
        let leaf = certs[0].der();
        if !contains(leaf, &public_key) {
            return Err(SessionError::KeyCertMismatch {
                key_path: key_path.to_owned(),
                cert_path: cert_path.to_owned(),
            });
        }
    } else {
        tracing::debug!(path = %key_path.display(), "Not an RSA key, skipping key/certificate match");
    }

    let client_cert = ClientCert::new_with_certs(&certs, key);
    Ok(TlsConfig::builder().client_cert(Some(client_cert)).build())
}

/// Read every certificate from a PEM file, leaf first.
fn load_certificates(path: &Path) -> Result<Vec<Certificate<'static>>, SessionError> {
    let pem = read_pem(path)?;
    let mut certs = Vec::new();
    for item in parse_pem(&pem) {
        if let PemItem::Certificate(cert) = item.map_err(|e| load_error(path, e))? {
            certs.push(cert.to_owned());
        }
    }
    if certs.is_empty() {
        return Err(load_error(path, "no certificate found"));
    }
    Ok(certs)
}

fn read_pem(path: &Path) -> Result<Vec<u8>, SessionError> {
    std::fs::read(path).map_err(|e| load_error(path, e))
}

fn load_error(path: &Path, message: impl ToString) -> SessionError {
    SessionError::CertificateLoad {
        path: path.to_owned(),
        message: message.to_string(),
    }
}

/// `SubjectPublicKeyInfo` DER for an RSA private key in PKCS#8 or PKCS#1 PEM.
///
/// Returns `None` for keys of any other type.
fn rsa_public_key_der(pem: &[u8]) -> Option<Vec<u8>> {
    let pem = std::str::from_utf8(pem).ok()?;
    let key = RsaPrivateKey::from_pkcs8_pem(pem)
        .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
        .ok()?;
    let document = RsaPublicKey::from(&key).to_public_key_der().ok()?;
    Some(document.as_bytes().to_vec())
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|window| window == needle)
}
