//! TLS credential loading.
//!
//! The certificate chain and private key are read once at startup from PEM
//! files and turned into a [`TlsAcceptor`]. Nothing is reloaded while the
//! server runs.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use rustls_pemfile::{certs, private_key};
use thiserror::Error;
use tokio_rustls::rustls::crypto::aws_lc_rs;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;

use crate::config::TlsConfig;

const PROVISIONING_HINT: &str =
    "generate a self-signed pair, e.g. `openssl req -x509 -newkey rsa:2048 -nodes -days 365 \
     -subj /CN=localhost -keyout .certs/localhost.key -out .certs/localhost.crt`";

/// Errors raised while building the TLS acceptor.
#[derive(Debug, Error)]
pub enum TlsError {
    #[error("Certificate file not found: {path} ({hint})")]
    CertificateNotFound { path: String, hint: &'static str },

    #[error("Private key file not found: {path} ({hint})")]
    PrivateKeyNotFound { path: String, hint: &'static str },

    #[error("Failed to load certificate from {path}: {message}")]
    CertificateLoad { path: String, message: String },

    #[error("Failed to load private key from {path}: {message}")]
    PrivateKeyLoad { path: String, message: String },

    #[error("Invalid TLS configuration: {0}")]
    Config(#[from] tokio_rustls::rustls::Error),
}

/// Build the acceptor used for every downstream handshake.
pub fn load_tls_acceptor(config: &TlsConfig) -> Result<TlsAcceptor, TlsError> {
    if !config.cert_path.exists() {
        return Err(TlsError::CertificateNotFound {
            path: config.cert_path.display().to_string(),
            hint: PROVISIONING_HINT,
        });
    }
    if !config.key_path.exists() {
        return Err(TlsError::PrivateKeyNotFound {
            path: config.key_path.display().to_string(),
            hint: PROVISIONING_HINT,
        });
    }

    let chain = load_certificates(&config.cert_path)?;
    let key = load_private_key(&config.key_path)?;

    let mut server_config = ServerConfig::builder_with_provider(Arc::new(aws_lc_rs::default_provider()))
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(chain, key)?;
    server_config.alpn_protocols = vec![b"http/1.1".to_vec()];

    tracing::info!(
        cert_path = %config.cert_path.display(),
        "TLS credential loaded"
    );
    Ok(TlsAcceptor::from(Arc::new(server_config)))
}

fn load_certificates(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let load_error = |message: String| TlsError::CertificateLoad {
        path: path.display().to_string(),
        message,
    };

    let file = File::open(path).map_err(|e| load_error(e.to_string()))?;
    let chain = certs(&mut BufReader::new(file))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| load_error(e.to_string()))?;

    if chain.is_empty() {
        return Err(load_error("no certificates found in file".to_string()));
    }
    Ok(chain)
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsError> {
    let load_error = |message: String| TlsError::PrivateKeyLoad {
        path: path.display().to_string(),
        message,
    };

    let file = File::open(path).map_err(|e| load_error(e.to_string()))?;
    private_key(&mut BufReader::new(file))
        .map_err(|e| load_error(e.to_string()))?
        .ok_or_else(|| load_error("no private key found in file".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write_pair(dir: &tempfile::TempDir) -> TlsConfig {
        let generated = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        let cert_path = dir.path().join("localhost.crt");
        let key_path = dir.path().join("localhost.key");
        std::fs::write(&cert_path, generated.cert.pem()).unwrap();
        std::fs::write(&key_path, generated.key_pair.serialize_pem()).unwrap();
        TlsConfig { cert_path, key_path }
    }

    #[test]
    fn loads_generated_credential() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_pair(&dir);
        let acceptor = load_tls_acceptor(&config).unwrap();
        assert_eq!(acceptor.config().alpn_protocols, vec![b"http/1.1".to_vec()]);
    }

    #[test]
    fn missing_certificate_explains_how_to_provision() {
        let config = TlsConfig {
            cert_path: PathBuf::from("/nonexistent/localhost.crt"),
            key_path: PathBuf::from("/nonexistent/localhost.key"),
        };
        let err = load_tls_acceptor(&config).err().expect("load must fail");
        assert!(matches!(err, TlsError::CertificateNotFound { .. }));
        assert!(err.to_string().contains("openssl req"));
    }

    #[test]
    fn missing_key_is_reported_separately() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = write_pair(&dir);
        config.key_path = dir.path().join("absent.key");
        let err = load_tls_acceptor(&config).err().expect("load must fail");
        assert!(matches!(err, TlsError::PrivateKeyNotFound { .. }));
    }

    #[test]
    fn empty_certificate_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_pair(&dir);
        std::fs::write(&config.cert_path, "").unwrap();
        let err = load_tls_acceptor(&config).err().expect("load must fail");
        assert!(matches!(err, TlsError::CertificateLoad { .. }));
    }

    #[test]
    fn key_file_without_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_pair(&dir);
        std::fs::write(&config.key_path, "not a key\n").unwrap();
        let err = load_tls_acceptor(&config).err().expect("load must fail");
        assert!(matches!(err, TlsError::PrivateKeyLoad { .. }));
    }
}
