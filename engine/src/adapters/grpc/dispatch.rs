//! Tonic bridge for the servicer factory
//!
//! Generated service traits forward each RPC here with the action name; the
//! request is converted to a field mapping, dispatched, and the reply or error
//! mapped back onto tonic types.

use crate::context::{CallContext, Request};
use crate::error::Error;
use crate::protobuf::Empty;
use crate::services::{Dispatcher, Reply, Service};
use serde::Serialize;
use std::pin::Pin;
use tokio_stream::{Stream, StreamExt};
use tonic::{Code, Status};
use tracing::{debug, error, info, warn};

/// Response stream handed to tonic for server-streaming RPCs
pub type ResponseStream<M> = Pin<Box<dyn Stream<Item = Result<M, Status>> + Send + 'static>>;

impl<S: Service> Dispatcher<S> {
    pub async fn unary<R: Serialize>(
        &self,
        action: &str,
        request: tonic::Request<R>,
    ) -> Result<tonic::Response<S::Message>, Status> {
        let (request, context) = accept(request)?;
        let reply = self.dispatch(action, request, &context).await?;
        reply
            .into_message()
            .map(tonic::Response::new)
            .map_err(|e| context.status_for(e))
    }

    pub async fn server_streaming<R: Serialize>(
        &self,
        action: &str,
        request: tonic::Request<R>,
    ) -> Result<tonic::Response<ResponseStream<S::Message>>, Status> {
        let (request, context) = accept(request)?;
        let stream = self
            .dispatch(action, request, &context)
            .await?
            .into_stream()
            .map_err(|e| context.status_for(e))?;

        let action = action.to_string();
        let stream = stream.map(move |item| {
            item.map_err(|e| {
                warn!(service = S::NAME, action = %action, error = %e, "Streamed message failed");
                Status::from(e)
            })
        });
        Ok(tonic::Response::new(Box::pin(stream)))
    }

    pub async fn empty<R: Serialize>(
        &self,
        action: &str,
        request: tonic::Request<R>,
    ) -> Result<tonic::Response<Empty>, Status> {
        let (request, context) = accept(request)?;
        let reply = self.dispatch(action, request, &context).await?;
        reply
            .into_empty()
            .map(tonic::Response::new)
            .map_err(|e| context.status_for(e))
    }

    async fn dispatch(
        &self,
        action: &str,
        request: Request,
        context: &CallContext,
    ) -> Result<Reply<S::Message>, Status> {
        info!(service = S::NAME, action, "gRPC request received");

        match self.handler(action).call(request, context.clone()).await {
            Ok(reply) => {
                debug!(service = S::NAME, action, reply = reply.kind(), "gRPC request served");
                Ok(reply)
            }
            Err(e) => Err(report::<S>(action, context, e)),
        }
    }
}

fn accept<R: Serialize>(request: tonic::Request<R>) -> Result<(Request, CallContext), Status> {
    let context = CallContext::new(request.metadata().clone());
    let request = Request::from_message(request.get_ref()).map_err(|e| {
        warn!(error = %e, "Rejecting unconvertible request");
        Status::from(e)
    })?;
    Ok((request, context))
}

fn report<S: Service>(action: &str, context: &CallContext, e: Error) -> Status {
    let status = context.status_for(e);
    match status.code() {
        Code::Internal | Code::Unknown => {
            error!(service = S::NAME, action, error = %status.message(), "gRPC request failed")
        }
        Code::Unimplemented => {
            debug!(service = S::NAME, action, "gRPC action not implemented")
        }
        code => warn!(
            service = S::NAME,
            action,
            code = ?code,
            error = %status.message(),
            "gRPC request rejected"
        ),
    }
    status
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::messages::{Account, AccountListRequest, AccountLookupRequest};
    use crate::demo::{account_queryset, account_store, AccountAttributes, ReadOnlyAccountService};
    use crate::services::actions;

    fn dispatcher() -> Dispatcher<ReadOnlyAccountService> {
        let store = account_store(vec![
            crate::demo::Account::new(1, "ada"),
            crate::demo::Account::new(2, "grace"),
        ])
        .unwrap();
        Dispatcher::new(AccountAttributes::new(account_queryset(&store)))
    }

    #[tokio::test]
    async fn test_unary_maps_reply() {
        let response = dispatcher()
            .unary(
                actions::RETRIEVE,
                tonic::Request::new(AccountLookupRequest {
                    id: 2,
                    ..Default::default()
                }),
            )
            .await
            .unwrap();
        assert_eq!(response.get_ref().username.as_deref(), Some("grace"));
    }

    #[tokio::test]
    async fn test_errors_become_statuses() {
        let status = dispatcher()
            .unary(
                actions::RETRIEVE,
                tonic::Request::new(AccountLookupRequest {
                    id: 9,
                    ..Default::default()
                }),
            )
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::NotFound);
        assert_eq!(status.message(), "Account: 9 not found!");

        let status = dispatcher()
            .unary(actions::CREATE, tonic::Request::new(Account::default()))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::Unimplemented);
        assert_eq!(status.message(), "Method not implemented!");
    }

    #[tokio::test]
    async fn test_streaming_collects_messages() {
        let response = dispatcher()
            .server_streaming(actions::LIST, tonic::Request::new(AccountListRequest::default()))
            .await
            .unwrap();

        let ids: Vec<i64> = response
            .into_inner()
            .map(|account| account.unwrap().id)
            .collect::<Vec<_>>()
            .await;
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_reply_shape_mismatch_is_internal() {
        let status = dispatcher()
            .empty(
                actions::RETRIEVE,
                tonic::Request::new(AccountLookupRequest {
                    id: 1,
                    ..Default::default()
                }),
            )
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::Internal);
    }
}
