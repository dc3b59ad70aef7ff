//! Server lifecycle.
//!
//! A server moves through `Unconfigured -> ChannelBuilt -> Bound -> Serving ->
//! Stopped`. Each step is a method that consumes the previous state, so a
//! listener can only exist once the TLS policy is in place and serving can
//! only start on a bound listener. Every failure is fatal: there is no way
//! back to an earlier state.
//!
//! ```text
//! ServerLifecycle::new(config)   Unconfigured
//!     .build_channel()?          ChannelBuilt  (CertificateLoad / TrustBundle)
//!     .bind().await?             Bound         (Listen)
//!     .serve(shutdown).await?    Serving .. Stopped (Serve)
//! ```

use crate::server::{
    config::ServerConfig,
    service::handler::ProductService,
    tls::ChannelPolicy,
};
use prodinfo_core::{
    Error, Result,
    proto::{FILE_DESCRIPTOR_SET, product_info_server::ProductInfoServer},
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::{codec::CompressionEncoding, transport::Server};
use tonic_reflection::server::Builder;

/// Configuration has been parsed but nothing has been validated yet.
pub struct Unconfigured;

/// The TLS policy is loaded and applied to the transport builder.
pub struct ChannelBuilt {
    policy: ChannelPolicy,
    server: Server,
}

/// A listening socket is held; no connection has been accepted yet.
pub struct Bound {
    server: Server,
    listener: TcpListener,
}

/// The accept loop has ended.
pub struct Stopped;

/// A product info server in lifecycle state `S`.
pub struct ServerLifecycle<S> {
    config: ServerConfig,
    service: ProductService,
    state: S,
}

impl ServerLifecycle<Unconfigured> {
    /// Starts a lifecycle that will serve a fresh, empty registry.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_service(config, ProductService::new())
    }

    /// Starts a lifecycle that will serve `service`.
    pub fn with_service(config: ServerConfig, service: ProductService) -> Self {
        Self {
            config,
            service,
            state: Unconfigured,
        }
    }

    /// Loads the certificate files named in the configuration.
    pub fn build_channel(self) -> Result<ServerLifecycle<ChannelBuilt>> {
        let policy = ChannelPolicy::load(&self.config.tls)?;
        self.with_policy(policy)
    }

    /// Uses an already-built policy (e.g. from in-memory certificates).
    pub fn with_policy(self, policy: ChannelPolicy) -> Result<ServerLifecycle<ChannelBuilt>> {
        let mut server = Server::builder()
            .tls_config(policy.server_tls_config())
            .map_err(|e| Error::CertificateLoad {
                reason: format!("TLS configuration rejected: {e}"),
            })?;
        if let Some(timeout) = self.config.request_timeout {
            server = server.timeout(timeout);
        }

        tracing::info!(
            chain_len = policy.chain_len(),
            trust_anchors = policy.trust_anchors(),
            "secure channel built"
        );
        Ok(ServerLifecycle {
            config: self.config,
            service: self.service,
            state: ChannelBuilt { policy, server },
        })
    }
}

impl ServerLifecycle<ChannelBuilt> {
    /// Binds the TCP listener on the configured address.
    pub async fn bind(self) -> Result<ServerLifecycle<Bound>> {
        let addr = self.config.server_addr;
        let listener = TcpListener::bind(addr).await.map_err(|e| Error::Listen {
            addr: addr.to_string(),
            reason: e.to_string(),
        })?;
        let ChannelBuilt { policy, server } = self.state;
        tracing::info!(
            %addr,
            trust_anchors = policy.trust_anchors(),
            "listener bound"
        );

        Ok(ServerLifecycle {
            config: self.config,
            service: self.service,
            state: Bound { server, listener },
        })
    }
}

impl ServerLifecycle<Bound> {
    /// The address actually bound (useful when the configured port is 0).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.state.listener.local_addr().map_err(|e| Error::Listen {
            addr: self.config.server_addr.to_string(),
            reason: e.to_string(),
        })
    }

    /// Serves until `shutdown` resolves or the accept loop fails.
    ///
    /// Alongside `ecommerce.ProductInfo` the server exposes the standard gRPC
    /// health service, which flips to `NOT_SERVING` as soon as shutdown
    /// begins, and the v1 reflection service.
    pub async fn serve<F>(self, shutdown: F) -> Result<ServerLifecycle<Stopped>>
    where
        F: Future<Output = ()> + Send,
    {
        let local_addr = self.local_addr()?;
        let Bound {
            mut server,
            listener,
        } = self.state;

        let (health_reporter, health_service) = tonic_health::server::health_reporter();
        health_reporter
            .set_serving::<ProductInfoServer<ProductService>>()
            .await;

        let reflection = Builder::configure()
            .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
            .build_v1()
            .map_err(|e| Error::Serve {
                reason: format!("failed to build reflection service: {e}"),
            })?;

        let shutdown = async move {
            shutdown.await;
            tracing::info!("Shutdown signal received, terminating gracefully...");
            health_reporter
                .set_not_serving::<ProductInfoServer<ProductService>>()
                .await;
        };

        tracing::info!(%local_addr, "serving ProductInfo over mutual TLS");
        server
            .add_service(health_service)
            .add_service(reflection)
            .add_service(build_product_service(self.service.clone()))
            .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown)
            .await
            .map_err(|e| Error::Serve {
                reason: e.to_string(),
            })?;

        tracing::info!(products = self.service.store().len(), "server stopped");
        Ok(ServerLifecycle {
            config: self.config,
            service: self.service,
            state: Stopped,
        })
    }
}

impl<S> ServerLifecycle<S> {
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn service(&self) -> &ProductService {
        &self.service
    }
}

fn build_product_service(service: ProductService) -> ProductInfoServer<ProductService> {
    ProductInfoServer::new(service)
        .send_compressed(CompressionEncoding::Zstd)
        .send_compressed(CompressionEncoding::Gzip)
        .send_compressed(CompressionEncoding::Deflate)
        .accept_compressed(CompressionEncoding::Zstd)
        .accept_compressed(CompressionEncoding::Gzip)
        .accept_compressed(CompressionEncoding::Deflate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::config::TlsPaths;
    use crate::server::test_support::{
        CA_PEM, CLIENT_CERT_PEM, CLIENT_KEY_PEM, ROGUE_CLIENT_CERT_PEM, ROGUE_CLIENT_KEY_PEM,
        SERVER_CERT_PEM, SERVER_KEY_PEM, local_config, testdata,
    };
    use futures::future::join_all;
    use prodinfo_core::proto::{Product, product_info_client::ProductInfoClient};
    use prodinfo_core::types::{Attributes, new_product};
    use std::collections::HashSet;
    use tokio::task::JoinHandle;
    use tokio_util::sync::CancellationToken;
    use tonic::Code;
    use tonic::transport::{Certificate, Channel, ClientTlsConfig, Identity};
    use tonic_health::pb::{
        HealthCheckRequest, health_check_response::ServingStatus, health_client::HealthClient,
    };

    struct RunningServer {
        addr: SocketAddr,
        service: ProductService,
        shutdown: CancellationToken,
        handle: JoinHandle<Result<ServerLifecycle<Stopped>>>,
    }

    impl RunningServer {
        async fn start() -> Self {
            let policy = ChannelPolicy::build(SERVER_CERT_PEM, SERVER_KEY_PEM, CA_PEM).unwrap();
            let bound = ServerLifecycle::new(local_config())
                .with_policy(policy)
                .unwrap()
                .bind()
                .await
                .unwrap();
            let addr = bound.local_addr().unwrap();
            let service = bound.service().clone();
            let shutdown = CancellationToken::new();
            let token = shutdown.clone();
            let handle = tokio::spawn(async move { bound.serve(token.cancelled_owned()).await });
            Self {
                addr,
                service,
                shutdown,
                handle,
            }
        }

        async fn stop(self) -> ServerLifecycle<Stopped> {
            self.shutdown.cancel();
            self.handle.await.unwrap().unwrap()
        }

        /// Client TLS settings that trust the server but present no identity.
        fn anonymous_tls(&self) -> ClientTlsConfig {
            ClientTlsConfig::new()
                .ca_certificate(Certificate::from_pem(CA_PEM))
                .domain_name("localhost")
        }

        fn trusted_tls(&self) -> ClientTlsConfig {
            self.anonymous_tls()
                .identity(Identity::from_pem(CLIENT_CERT_PEM, CLIENT_KEY_PEM))
        }

        async fn channel(
            &self,
            tls: ClientTlsConfig,
        ) -> core::result::Result<Channel, tonic::transport::Error> {
            Channel::from_shared(format!("https://{}", self.addr))
                .unwrap()
                .tls_config(tls)?
                .connect()
                .await
        }

        async fn trusted_client(&self) -> ProductInfoClient<Channel> {
            ProductInfoClient::new(self.channel(self.trusted_tls()).await.unwrap())
        }

        /// Issues one call of each method over a channel built from `tls` and
        /// counts the calls the product service actually answered.
        async fn calls_answered(&self, tls: ClientTlsConfig) -> usize {
            let Ok(channel) = self.channel(tls).await else {
                return 0;
            };
            let mut client = ProductInfoClient::new(channel);

            let added = client
                .add_product(new_product("Pen", "", 1.50, Attributes::new()))
                .await;
            let fetched = client.get_product("does-not-exist".to_string()).await;

            let add_answered = added.is_ok();
            let get_answered = matches!(&fetched, Err(status) if status.code() == Code::NotFound);
            usize::from(add_answered) + usize::from(get_answered)
        }
    }

    #[tokio::test]
    async fn trusted_client_adds_and_gets_products() {
        let server = RunningServer::start().await;
        let mut client = server.trusted_client().await;

        let mut attributes = Attributes::new();
        attributes.insert("sku".to_string(), "PEN-001".to_string());
        let product = new_product("Pen", "Blue ink", 1.50, attributes);

        let id = client.add_product(product.clone()).await.unwrap().into_inner();
        assert!(!id.is_empty());

        let fetched = client.get_product(id.clone()).await.unwrap().into_inner();
        assert_eq!(fetched, Product { id, ..product });

        let status = client
            .get_product("does-not-exist".to_string())
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::NotFound);
        assert!(status.message().contains("does-not-exist"));

        drop(client);
        server.stop().await;
    }

    #[tokio::test]
    async fn caller_supplied_id_is_replaced() {
        let server = RunningServer::start().await;
        let mut client = server.trusted_client().await;

        let mut product = new_product("Pen", "", 1.50, Attributes::new());
        product.id = "picked-by-client".to_string();
        let id = client.add_product(product).await.unwrap().into_inner();

        assert_ne!(id, "picked-by-client");
        let status = client
            .get_product("picked-by-client".to_string())
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::NotFound);

        drop(client);
        server.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_remote_adds_are_all_kept() {
        const CALLS: usize = 64;
        let server = RunningServer::start().await;
        let mut client = server.trusted_client().await;

        let calls = (0..CALLS).map(|i| {
            let mut client = client.clone();
            async move {
                let product = new_product(format!("item-{i}"), "", i as f32, Attributes::new());
                client.add_product(product).await.map(|r| r.into_inner())
            }
        });
        let ids: Vec<String> = join_all(calls)
            .await
            .into_iter()
            .collect::<core::result::Result<_, _>>()
            .unwrap();

        let unique: HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), CALLS);
        assert_eq!(server.service.store().len(), CALLS);

        for id in ids {
            let fetched = client.get_product(id.clone()).await.unwrap().into_inner();
            assert_eq!(fetched.id, id);
        }

        drop(client);
        server.stop().await;
    }

    #[tokio::test]
    async fn client_without_certificate_is_rejected() {
        let server = RunningServer::start().await;

        let answered = server.calls_answered(server.anonymous_tls()).await;

        assert_eq!(answered, 0);
        assert!(server.service.store().is_empty());
        server.stop().await;
    }

    #[tokio::test]
    async fn client_signed_by_untrusted_issuer_is_rejected() {
        let server = RunningServer::start().await;

        let rogue = Identity::from_pem(ROGUE_CLIENT_CERT_PEM, ROGUE_CLIENT_KEY_PEM);
        let answered = server
            .calls_answered(server.anonymous_tls().identity(rogue))
            .await;

        assert_eq!(answered, 0);
        assert!(server.service.store().is_empty());

        // The same server still serves trusted clients.
        assert_eq!(server.calls_answered(server.trusted_tls()).await, 2);
        server.stop().await;
    }

    #[tokio::test]
    async fn reports_serving_then_stops_on_shutdown() {
        let server = RunningServer::start().await;
        let channel = server.channel(server.trusted_tls()).await.unwrap();

        let mut health = HealthClient::new(channel.clone());
        let response = health
            .check(HealthCheckRequest {
                service: "ecommerce.ProductInfo".to_string(),
            })
            .await
            .unwrap()
            .into_inner();
        assert_eq!(response.status, ServingStatus::Serving as i32);

        ProductInfoClient::new(channel.clone())
            .add_product(new_product("Pen", "", 1.50, Attributes::new()))
            .await
            .unwrap();

        drop(health);
        drop(channel);
        let stopped = server.stop().await;
        assert_eq!(stopped.service().store().len(), 1);
    }

    #[tokio::test]
    async fn health_turns_not_serving_once_shutdown_begins() {
        let server = RunningServer::start().await;
        let channel = server.channel(server.trusted_tls()).await.unwrap();
        let mut health = HealthClient::new(channel.clone());

        // An open watch keeps the connection in flight while the server drains.
        let mut updates = health
            .watch(HealthCheckRequest {
                service: "ecommerce.ProductInfo".to_string(),
            })
            .await
            .unwrap()
            .into_inner();
        let first = updates.message().await.unwrap().unwrap();
        assert_eq!(first.status, ServingStatus::Serving as i32);

        server.shutdown.cancel();
        let next = updates.message().await.unwrap().unwrap();
        assert_eq!(next.status, ServingStatus::NotServing as i32);

        drop(updates);
        drop(health);
        drop(channel);
        server.handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn build_channel_reads_configured_files() {
        let built = ServerLifecycle::new(local_config()).build_channel().unwrap();
        assert_eq!(built.state.policy.trust_anchors(), 1);
    }

    #[tokio::test]
    async fn build_channel_fails_on_missing_bundle() {
        let mut config = local_config();
        config.tls = TlsPaths {
            trust_bundle: testdata().join("no-such-bundle.pem"),
            ..config.tls
        };
        let err = ServerLifecycle::new(config).build_channel().err().unwrap();
        assert!(matches!(err, Error::TrustBundle { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn bind_fails_when_address_is_taken() {
        let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut config = local_config();
        config.server_addr = occupied.local_addr().unwrap();

        let err = ServerLifecycle::new(config)
            .build_channel()
            .unwrap()
            .bind()
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::Listen { .. }), "{err:?}");
    }
}
