//! Shared utilities for E2E tests
//!
//! Each test starts its own in-process server on an ephemeral loopback port,
//! so tests run in parallel without interfering. The returned guard stops the
//! server when dropped, even if the test panics.
//!
//! ```rust,ignore
//! #[tokio::test]
//! async fn my_test() {
//!     let server = TestServer::start::<AccountService>(vec![], vec![]).await;
//!     let mut client = server.client().await;
//!     // ...
//! }
//! ```

use modelrpc_engine::adapters::grpc::AccountEndpoint;
use modelrpc_engine::demo::messages;
use modelrpc_engine::demo::{account_queryset, account_store, Account, AccountAttributes};
use modelrpc_engine::proto::demo::account_service_client::AccountServiceClient;
use modelrpc_engine::proto::demo::account_service_server::AccountServiceServer;
use modelrpc_engine::{Dispatcher, InMemoryStore, Service};
use serde_json::Value;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_stream::StreamExt;
use tonic::transport::{Channel, Server};

/// Running server, stopped on drop
pub struct TestServer {
    addr: SocketAddr,
    store: InMemoryStore<Account>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestServer {
    /// Serve `S` over a store seeded with `seed`, binding `overrides` first
    pub async fn start<S>(seed: Vec<Account>, overrides: Vec<(String, Value)>) -> Self
    where
        S: Service<Message = messages::Account, Attributes = AccountAttributes>,
    {
        let store = account_store(seed).expect("seed should load");
        let dispatcher =
            Dispatcher::<S>::bind(AccountAttributes::new(account_queryset(&store)), overrides)
                .expect("overrides should bind");

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral port");
        let addr = listener.local_addr().expect("local address");

        let (mut health_reporter, health_service) = tonic_health::server::health_reporter();
        let server = AccountEndpoint::new(dispatcher).into_server();
        health_reporter
            .set_serving::<AccountServiceServer<AccountEndpoint<S>>>()
            .await;

        let (shutdown, stopped) = oneshot::channel::<()>();
        tokio::spawn(async move {
            Server::builder()
                .add_service(health_service)
                .add_service(server)
                .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async {
                    let _ = stopped.await;
                })
                .await
                .expect("server failed");
        });

        Self {
            addr,
            store,
            shutdown: Some(shutdown),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Store backing the served dispatcher
    pub fn store(&self) -> &InMemoryStore<Account> {
        &self.store
    }

    pub async fn channel(&self) -> Channel {
        Channel::from_shared(format!("http://{}", self.addr))
            .expect("valid endpoint")
            .connect()
            .await
            .expect("connect to test server")
    }

    pub async fn client(&self) -> AccountServiceClient<Channel> {
        AccountServiceClient::new(self.channel().await)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

pub fn seed_accounts() -> Vec<Account> {
    vec![
        Account::new(1, "ada").with_email("ada@example.com"),
        Account::new(2, "grace"),
        Account::new(3, "linus"),
    ]
}

/// Drain a List response into its messages
pub async fn list_accounts(
    client: &mut AccountServiceClient<Channel>,
    request: messages::AccountListRequest,
) -> Vec<messages::Account> {
    client
        .list(request)
        .await
        .expect("list call")
        .into_inner()
        .map(|item| item.expect("list item"))
        .collect::<Vec<_>>()
        .await
}

pub fn usernames(accounts: &[messages::Account]) -> Vec<&str> {
    accounts
        .iter()
        .map(|a| a.username.as_deref().unwrap_or_default())
        .collect()
}
