//! Command-line interface.
//!
//! Flags override values from the configuration file; the merged result is
//! validated during startup like any other configuration.

use clap::Parser;
use std::path::PathBuf;

use crate::config::{read_config, ConfigError, ProxyConfig};

#[derive(Debug, Parser)]
#[command(author, version, about = "TLS-terminating reverse proxy for a local plaintext upstream")]
pub struct Args {
    /// Configuration file (TOML). Defaults apply when omitted.
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Listen address, e.g. 0.0.0.0:8443
    #[arg(long)]
    pub listen: Option<String>,

    /// Upstream as host:port, e.g. localhost:8080
    #[arg(long, value_parser = parse_upstream)]
    pub upstream: Option<(String, u16)>,

    /// Certificate chain (PEM)
    #[arg(long)]
    pub cert: Option<PathBuf>,

    /// Private key (PEM)
    #[arg(long)]
    pub key: Option<PathBuf>,

    /// Log level or filter directives, e.g. debug or https_proxy=trace
    #[arg(long)]
    pub log_level: Option<String>,
}

impl Args {
    /// Read the configuration file (if any) and apply flag overrides.
    ///
    /// The file is not validated on its own; startup validates the merged
    /// result.
    pub fn resolve(&self) -> Result<ProxyConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => ProxyConfig::default(),
        };
        self.apply(&mut config);
        Ok(config)
    }

    fn apply(&self, config: &mut ProxyConfig) {
        if let Some(listen) = &self.listen {
            config.listener.bind_address = listen.clone();
        }
        if let Some((host, port)) = &self.upstream {
            config.upstream.host = host.clone();
            config.upstream.port = *port;
        }
        if let Some(cert) = &self.cert {
            config.listener.tls.cert_path = cert.clone();
        }
        if let Some(key) = &self.key {
            config.listener.tls.key_path = key.clone();
        }
        if let Some(level) = &self.log_level {
            config.observability.log_level = level.clone();
        }
    }
}

/// Parse `host:port`; IPv6 hosts may be bracketed (`[::1]:8080`).
fn parse_upstream(value: &str) -> Result<(String, u16), String> {
    let (host, port) = value
        .rsplit_once(':')
        .ok_or_else(|| format!("expected host:port, got '{}'", value))?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return Err(format!("missing host in '{}'", value));
    }
    let port = port
        .parse::<u16>()
        .map_err(|e| format!("invalid port '{}': {}", port, e))?;
    Ok((host.to_string(), port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_upstream_forms() {
        assert_eq!(parse_upstream("localhost:8080"), Ok(("localhost".into(), 8080)));
        assert_eq!(parse_upstream("[::1]:3000"), Ok(("::1".into(), 3000)));
        assert!(parse_upstream("localhost").is_err());
        assert!(parse_upstream(":8080").is_err());
        assert!(parse_upstream("localhost:http").is_err());
    }

    #[test]
    fn flags_override_defaults() {
        let args = Args::parse_from([
            "https-proxy",
            "--listen",
            "127.0.0.1:9443",
            "--upstream",
            "127.0.0.1:3000",
            "--cert",
            "/tmp/c.pem",
            "--log-level",
            "debug",
        ]);
        let config = args.resolve().unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:9443");
        assert_eq!(config.upstream.host, "127.0.0.1");
        assert_eq!(config.upstream.port, 3000);
        assert_eq!(config.listener.tls.cert_path, PathBuf::from("/tmp/c.pem"));
        assert_eq!(config.listener.tls.key_path, PathBuf::from(".certs/localhost.key"));
        assert_eq!(config.observability.log_level, "debug");
    }

    #[test]
    fn flags_override_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proxy.toml");
        std::fs::write(&path, "[upstream]\nhost = \"backend\"\nport = 9000\n").unwrap();

        let args = Args::parse_from([
            "https-proxy",
            "--config",
            path.to_str().unwrap(),
            "--upstream",
            "localhost:8081",
        ]);
        let config = args.resolve().unwrap();
        assert_eq!(config.upstream.host, "localhost");
        assert_eq!(config.upstream.port, 8081);
    }

    #[test]
    fn flags_complete_an_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proxy.toml");
        std::fs::write(&path, "[upstream]\nport = 0\n").unwrap();

        let args = Args::parse_from([
            "https-proxy",
            "--config",
            path.to_str().unwrap(),
            "--upstream",
            "localhost:8081",
        ]);
        let config = args.resolve().unwrap();
        assert_eq!(config.upstream.port, 8081);
        assert!(crate::config::validate_config(&config).is_ok());
    }
}
