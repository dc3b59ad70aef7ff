use anyhow::{Context, bail};
use clap::Parser;
use core::time::Duration;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Runtime configuration for the `prodinfo-server` binary.
///
/// All values are parsed from CLI arguments or environment variables (a `.env`
/// file in the working directory is honored). The certificate paths point at
/// PEM files produced by whatever provisions certificates for the deployment.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "prodinfo-server",
    version,
    about = "A mutually-authenticated gRPC product registry"
)]
pub struct CliArgs {
    /// Address to listen on.
    ///
    /// Example: "0.0.0.0:50051" or "127.0.0.1:0"
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:50051"))]
    pub server_addr: String,

    /// Server certificate chain, PEM encoded, leaf first.
    ///
    /// Environment variable: `TLS_CERT`
    #[arg(long, env = "TLS_CERT", default_value = "certs/server.crt")]
    pub tls_cert: PathBuf,

    /// Private key for the server certificate (PKCS#8, PKCS#1 or SEC1 PEM).
    ///
    /// Environment variable: `TLS_KEY`
    #[arg(long, env = "TLS_KEY", default_value = "certs/server.key")]
    pub tls_key: PathBuf,

    /// Bundle of trusted issuers used to verify client certificates. Every
    /// client must present a certificate that chains to one of these.
    ///
    /// Environment variable: `TLS_CA`
    #[arg(long, env = "TLS_CA", default_value = "certs/ca.crt")]
    pub tls_ca: PathBuf,

    /// Per-request timeout in milliseconds. `0` disables the timeout.
    ///
    /// Environment variable: `REQUEST_TIMEOUT_MS`
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value_t = 0)]
    pub request_timeout_ms: u64,
}

/// Locations of the PEM inputs of the secure channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
    pub trust_bundle: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_addr: SocketAddr,
    pub tls: TlsPaths,
    pub request_timeout: Option<Duration>,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let server_addr: SocketAddr = args
            .server_addr
            .parse()
            .with_context(|| {
                format!(
                    "SERVER_ADDR ({}) is not a valid socket address",
                    args.server_addr
                )
            })?;

        for (name, path) in [
            ("TLS_CERT", &args.tls_cert),
            ("TLS_KEY", &args.tls_key),
            ("TLS_CA", &args.tls_ca),
        ] {
            if path.as_os_str().is_empty() {
                bail!("{name} must not be empty");
            }
        }

        let request_timeout =
            (args.request_timeout_ms > 0).then(|| Duration::from_millis(args.request_timeout_ms));

        Ok(Self {
            server_addr,
            tls: TlsPaths {
                cert: args.tls_cert,
                key: args.tls_key,
                trust_bundle: args.tls_ca,
            },
            request_timeout,
        })
    }
}
