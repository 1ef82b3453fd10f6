//! gRPC AccountService implementation
//! Every RPC is forwarded to the dispatcher under its action name

use super::dispatch::ResponseStream;
use crate::demo::messages::{
    Account, AccountListRequest, AccountLookupRequest, AccountPartialUpdateRequest, Empty,
};
use crate::proto::demo::account_service_server::{AccountService as AccountRpc, AccountServiceServer};
use crate::services::{actions, Dispatcher, Service};
use tonic::{Request, Response, Status};

/// Wire endpoint for any service answering with [`Account`] messages
///
/// Actions the service does not route are answered with UNIMPLEMENTED.
pub struct AccountEndpoint<S: Service<Message = Account>> {
    dispatcher: Dispatcher<S>,
}

impl<S: Service<Message = Account>> AccountEndpoint<S> {
    pub fn new(dispatcher: Dispatcher<S>) -> Self {
        Self { dispatcher }
    }

    pub fn into_server(self) -> AccountServiceServer<Self> {
        AccountServiceServer::new(self)
    }
}

#[tonic::async_trait]
impl<S: Service<Message = Account>> AccountRpc for AccountEndpoint<S> {
    type ListStream = ResponseStream<Account>;

    async fn create(&self, request: Request<Account>) -> Result<Response<Account>, Status> {
        self.dispatcher.unary(actions::CREATE, request).await
    }

    async fn list(
        &self,
        request: Request<AccountListRequest>,
    ) -> Result<Response<Self::ListStream>, Status> {
        self.dispatcher.server_streaming(actions::LIST, request).await
    }

    async fn retrieve(
        &self,
        request: Request<AccountLookupRequest>,
    ) -> Result<Response<Account>, Status> {
        self.dispatcher.unary(actions::RETRIEVE, request).await
    }

    async fn update(&self, request: Request<Account>) -> Result<Response<Account>, Status> {
        self.dispatcher.unary(actions::UPDATE, request).await
    }

    async fn partial_update(
        &self,
        request: Request<AccountPartialUpdateRequest>,
    ) -> Result<Response<Account>, Status> {
        self.dispatcher.unary(actions::PARTIAL_UPDATE, request).await
    }

    async fn destroy(
        &self,
        request: Request<AccountLookupRequest>,
    ) -> Result<Response<Empty>, Status> {
        self.dispatcher.empty(actions::DESTROY, request).await
    }
}
