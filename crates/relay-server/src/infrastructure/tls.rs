//! TLS termination: certificate loading and self-signed generation.
//!
//! The relay always speaks TLS.  When no certificate is configured (or the
//! configured files are missing) a self-signed one is generated at startup,
//! valid for `localhost` and `127.0.0.1`.  Clients of this relay pin the
//! certificate fingerprint rather than validating a chain, so a generated
//! certificate is fully usable.

use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rcgen::{CertificateParams, KeyPair, SanType};
use rustls::ServerConfig;
use thiserror::Error;
use tokio_rustls::TlsAcceptor;
use tracing::{info, warn};

use crate::domain::TlsSettings;

/// Errors raised while preparing the TLS acceptor.
#[derive(Debug, Error)]
pub enum TlsError {
    #[error("I/O error accessing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no certificates found in {0}")]
    NoCertificates(PathBuf),

    #[error("no private key found in {0}")]
    NoPrivateKey(PathBuf),

    #[error("certificate generation failed: {0}")]
    Generate(#[from] rcgen::Error),

    #[error("invalid TLS configuration: {0}")]
    Rustls(#[from] rustls::Error),
}

/// A PEM certificate chain and its private key.
#[derive(Clone)]
pub struct CertificateBundle {
    cert_pem: String,
    key_pem: String,
    /// Where the bundle was read from; `None` for generated bundles.
    source: Option<(PathBuf, PathBuf)>,
}

impl std::fmt::Debug for CertificateBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateBundle")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl CertificateBundle {
    /// Generates a self-signed certificate for `localhost` / `127.0.0.1`.
    pub fn generate_self_signed() -> Result<Self, TlsError> {
        let key_pair = KeyPair::generate()?;
        let mut params = CertificateParams::new(vec!["localhost".to_string()])?;
        params
            .subject_alt_names
            .push(SanType::IpAddress(IpAddr::V4(Ipv4Addr::LOCALHOST)));
        let cert = params.self_signed(&key_pair)?;

        Ok(Self {
            cert_pem: cert.pem(),
            key_pem: key_pair.serialize_pem(),
            source: None,
        })
    }

    /// Reads a PEM certificate chain and a PEM private key.  Both may be the
    /// same file.
    pub fn load(cert_file: &Path, key_file: &Path) -> Result<Self, TlsError> {
        Ok(Self {
            cert_pem: read_pem(cert_file)?,
            key_pem: read_pem(key_file)?,
            source: Some((cert_file.to_path_buf(), key_file.to_path_buf())),
        })
    }

    /// The certificate chain, PEM encoded.
    pub fn cert_pem(&self) -> &str {
        &self.cert_pem
    }

    /// Whether this bundle was generated rather than loaded.
    pub fn is_generated(&self) -> bool {
        self.source.is_none()
    }

    /// Writes key and certificate into one PEM file.
    pub fn write_combined(&self, path: &Path) -> Result<(), TlsError> {
        let io_err = |source| TlsError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let mut combined = String::with_capacity(self.key_pem.len() + self.cert_pem.len() + 1);
        combined.push_str(&self.key_pem);
        if !combined.ends_with('\n') {
            combined.push('\n');
        }
        combined.push_str(&self.cert_pem);
        std::fs::write(path, combined).map_err(io_err)
    }

    /// Builds a rustls server configuration: TLS 1.2 and 1.3, no client
    /// certificates.
    pub fn server_config(&self) -> Result<ServerConfig, TlsError> {
        let (cert_path, key_path) = match &self.source {
            Some((cert, key)) => (cert.clone(), key.clone()),
            None => (PathBuf::from("<generated>"), PathBuf::from("<generated>")),
        };

        let certs: Vec<_> = rustls_pemfile::certs(&mut self.cert_pem.as_bytes())
            .collect::<Result<_, _>>()
            .map_err(|source| TlsError::Io {
                path: cert_path.clone(),
                source,
            })?;
        if certs.is_empty() {
            return Err(TlsError::NoCertificates(cert_path));
        }
        let key = rustls_pemfile::private_key(&mut self.key_pem.as_bytes())
            .map_err(|source| TlsError::Io {
                path: key_path.clone(),
                source,
            })?
            .ok_or(TlsError::NoPrivateKey(key_path))?;

        let config = ServerConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
        Ok(config)
    }

    /// Wraps [`CertificateBundle::server_config`] in an acceptor.
    pub fn acceptor(&self) -> Result<TlsAcceptor, TlsError> {
        Ok(TlsAcceptor::from(Arc::new(self.server_config()?)))
    }
}

fn read_pem(path: &Path) -> Result<String, TlsError> {
    std::fs::read_to_string(path).map_err(|source| TlsError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Loads the configured certificate, or generates one.
///
/// If a certificate was generated and `gen_cert_file` is set, the bundle is
/// written there.
///
/// # Errors
///
/// Returns [`TlsError`] if configured files exist but cannot be used, if
/// generation fails, or if `gen_cert_file` cannot be written.
pub fn acceptor_from_settings(settings: &TlsSettings) -> Result<TlsAcceptor, TlsError> {
    let bundle = resolve_bundle(settings)?;
    if bundle.is_generated() {
        if let Some(path) = &settings.gen_cert_file {
            bundle.write_combined(path)?;
            info!("Generated certificate written to {}", path.display());
        }
    }
    bundle.acceptor()
}

fn resolve_bundle(settings: &TlsSettings) -> Result<CertificateBundle, TlsError> {
    match (&settings.cert_file, &settings.key_file) {
        (Some(cert), Some(key)) if cert.exists() && key.exists() => {
            info!(
                "Loading TLS certificate from {} and key from {}",
                cert.display(),
                key.display()
            );
            CertificateBundle::load(cert, key)
        }
        (None, None) => {
            info!("No certificate configured; generating a self-signed certificate.");
            CertificateBundle::generate_self_signed()
        }
        _ => {
            warn!("Certificate or key file not found; generating a self-signed certificate.");
            CertificateBundle::generate_self_signed()
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
