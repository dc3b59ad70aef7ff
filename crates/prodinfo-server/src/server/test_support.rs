//! Certificate fixtures and configuration shared by the unit tests.
//!
//! `testdata/` holds a trusted CA with a server leaf (`localhost`,
//! `127.0.0.1`) and a client leaf, plus an unrelated CA with its own client
//! leaf. All keys are P-256.

use crate::server::config::{ServerConfig, TlsPaths};
use std::path::PathBuf;

pub const CA_PEM: &[u8] = include_bytes!("../../testdata/ca.pem");
pub const SERVER_CERT_PEM: &[u8] = include_bytes!("../../testdata/server.pem");
pub const SERVER_KEY_PEM: &[u8] = include_bytes!("../../testdata/server.key");
pub const CLIENT_CERT_PEM: &[u8] = include_bytes!("../../testdata/client.pem");
pub const CLIENT_KEY_PEM: &[u8] = include_bytes!("../../testdata/client.key");
pub const ROGUE_CA_PEM: &[u8] = include_bytes!("../../testdata/rogue_ca.pem");
pub const ROGUE_CLIENT_CERT_PEM: &[u8] = include_bytes!("../../testdata/rogue_client.pem");
pub const ROGUE_CLIENT_KEY_PEM: &[u8] = include_bytes!("../../testdata/rogue_client.key");

pub fn testdata() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata")
}

/// Loopback config on an ephemeral port pointing at the trusted fixtures.
pub fn local_config() -> ServerConfig {
    let testdata = testdata();
    ServerConfig {
        server_addr: "127.0.0.1:0".parse().expect("valid loopback address"),
        tls: TlsPaths {
            cert: testdata.join("server.pem"),
            key: testdata.join("server.key"),
            trust_bundle: testdata.join("ca.pem"),
        },
        request_timeout: None,
    }
}
