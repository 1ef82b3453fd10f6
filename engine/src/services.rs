//! Service declaration and the servicer factory
//!
//! A [`Service`] declares which actions it answers through [`Service::routes`].
//! The [`Dispatcher`] never caches that table: every [`Dispatcher::handler`]
//! lookup rebuilds it, and every handler invocation builds a brand new service
//! instance from the bound attributes and the call. Nothing leaks between calls.

use crate::context::{Call, CallContext, Request};
use crate::error::{Error, Result};
use crate::protobuf::{Empty, ProtoMessage};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tonic::Code;
use tracing::debug;

/// Details reported with the unimplemented status
pub const NOT_IMPLEMENTED_DETAILS: &str = "Method not implemented!";

/// Action names, as they appear in the gRPC service definition
pub mod actions {
    pub const CREATE: &str = "Create";
    pub const LIST: &str = "List";
    pub const RETRIEVE: &str = "Retrieve";
    pub const UPDATE: &str = "Update";
    pub const PARTIAL_UPDATE: &str = "PartialUpdate";
    pub const DESTROY: &str = "Destroy";
}

/// Lazily produced sequence of response messages
pub type MessageStream<M> = Pin<Box<dyn Stream<Item = Result<M>> + Send + 'static>>;

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// What an action produced
pub enum Reply<M> {
    Message(M),
    Stream(MessageStream<M>),
    Empty(Empty),
}

impl<M> Reply<M> {
    pub fn kind(&self) -> &'static str {
        match self {
            Reply::Message(_) => "a message",
            Reply::Stream(_) => "a stream",
            Reply::Empty(_) => "an empty reply",
        }
    }

    pub fn into_message(self) -> Result<M> {
        match self {
            Reply::Message(message) => Ok(message),
            other => Err(Error::configuration(format!(
                "expected a single message, the action produced {}",
                other.kind()
            ))),
        }
    }

    pub fn into_stream(self) -> Result<MessageStream<M>> {
        match self {
            Reply::Stream(stream) => Ok(stream),
            other => Err(Error::configuration(format!(
                "expected a stream, the action produced {}",
                other.kind()
            ))),
        }
    }

    pub fn into_empty(self) -> Result<Empty> {
        match self {
            Reply::Empty(empty) => Ok(empty),
            other => Err(Error::configuration(format!(
                "expected an empty reply, the action produced {}",
                other.kind()
            ))),
        }
    }
}

impl<M: fmt::Debug> fmt::Debug for Reply<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Message(message) => f.debug_tuple("Message").field(message).finish(),
            Reply::Stream(_) => f.write_str("Stream(..)"),
            Reply::Empty(empty) => f.debug_tuple("Empty").field(empty).finish(),
        }
    }
}

/// Attributes bound onto every instance a [`Dispatcher`] builds
pub trait Attributes: Clone + Send + Sync + 'static {
    /// Names that may be overridden through [`Dispatcher::bind`]
    const DECLARED: &'static [&'static str];

    fn assign(&mut self, name: &str, value: Value) -> Result<()>;
}

impl Attributes for () {
    const DECLARED: &'static [&'static str] = &[];

    fn assign(&mut self, name: &str, _value: Value) -> Result<()> {
        Err(Error::configuration(format!("no attribute named {name:?}")))
    }
}

/// Deserialize an override into an attribute slot
pub fn assign_value<T: DeserializeOwned>(slot: &mut T, name: &str, value: Value) -> Result<()> {
    *slot = serde_json::from_value(value)
        .map_err(|e| Error::configuration(format!("invalid value for attribute {name:?}: {e}")))?;
    Ok(())
}

/// A class of per-call service instances
pub trait Service: Sized + Send + Sync + 'static {
    const NAME: &'static str;

    type Attributes: Attributes;

    /// Message type the service answers with
    type Message: ProtoMessage;

    /// Build the instance for one call
    fn new(attributes: &Self::Attributes, call: Call) -> Self;

    fn call(&self) -> &Call;

    /// Actions this service answers
    fn routes() -> Routes<Self>;
}

type RouteFn<S> = Arc<dyn Fn(S) -> BoxFuture<Result<Reply<<S as Service>::Message>>> + Send + Sync>;

/// Action name to handler table
pub struct Routes<S: Service> {
    routes: HashMap<String, RouteFn<S>>,
}

impl<S: Service> Routes<S> {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }

    /// Register a handler for `action`, replacing any earlier one
    pub fn route<F, Fut>(mut self, action: &str, handler: F) -> Self
    where
        F: Fn(S) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Reply<S::Message>>> + Send + 'static,
    {
        self.routes.insert(
            action.to_string(),
            Arc::new(move |service: S| -> BoxFuture<Result<Reply<S::Message>>> {
                Box::pin(handler(service))
            }),
        );
        self
    }

    /// Single request, single response
    pub fn unary<F, Fut>(self, action: &str, handler: F) -> Self
    where
        F: Fn(S) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<S::Message>> + Send + 'static,
    {
        self.route(action, move |service| {
            let reply = handler(service);
            async move { reply.await.map(Reply::Message) }
        })
    }

    /// Single request, streamed response
    pub fn streaming<F, Fut>(self, action: &str, handler: F) -> Self
    where
        F: Fn(S) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<MessageStream<S::Message>>> + Send + 'static,
    {
        self.route(action, move |service| {
            let reply = handler(service);
            async move { reply.await.map(Reply::Stream) }
        })
    }

    /// Single request, empty response
    pub fn empty<F, Fut>(self, action: &str, handler: F) -> Self
    where
        F: Fn(S) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Empty>> + Send + 'static,
    {
        self.route(action, move |service| {
            let reply = handler(service);
            async move { reply.await.map(Reply::Empty) }
        })
    }

    pub fn contains(&self, action: &str) -> bool {
        self.routes.contains_key(action)
    }

    pub fn actions(&self) -> Vec<&str> {
        let mut actions: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        actions.sort_unstable();
        actions
    }

    fn take(mut self, action: &str) -> Option<RouteFn<S>> {
        self.routes.remove(action)
    }
}

impl<S: Service> Default for Routes<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Record the unimplemented status on the call and fail it
pub fn not_implemented<T>(context: &CallContext) -> Result<T> {
    context.set_code(Code::Unimplemented);
    context.set_details(NOT_IMPLEMENTED_DETAILS);
    Err(Error::NotImplemented)
}

/// Callable produced for one action lookup
pub struct Handler<S: Service> {
    action: String,
    route: Option<RouteFn<S>>,
    attributes: S::Attributes,
}

impl<S: Service> Handler<S> {
    pub fn action(&self) -> &str {
        &self.action
    }

    /// False when the lookup fell back to the unimplemented handler
    pub fn is_implemented(&self) -> bool {
        self.route.is_some()
    }

    /// Serve one call on a freshly built service instance
    pub async fn call(&self, request: Request, context: CallContext) -> Result<Reply<S::Message>> {
        let Some(route) = self.route.clone() else {
            debug!(service = S::NAME, action = %self.action, "Action not implemented");
            return not_implemented(&context);
        };

        let service = S::new(&self.attributes, Call::new(request, context, self.action.clone()));
        route(service).await
    }
}

/// Servicer factory for one service class
pub struct Dispatcher<S: Service> {
    attributes: S::Attributes,
}

impl<S: Service> Dispatcher<S> {
    pub fn new(attributes: S::Attributes) -> Self {
        Self { attributes }
    }

    /// Dispatcher whose instances get `overrides` applied on top of `attributes`
    ///
    /// Every key must name an attribute the service declares; nothing is
    /// applied unless all keys are known.
    pub fn bind<I, K>(mut attributes: S::Attributes, overrides: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let overrides: Vec<(String, Value)> = overrides
            .into_iter()
            .map(|(key, value)| (key.into(), value))
            .collect();

        let declared = <S::Attributes as Attributes>::DECLARED;
        if let Some((key, _)) = overrides
            .iter()
            .find(|(key, _)| !declared.contains(&key.as_str()))
        {
            return Err(Error::configuration(format!(
                "{}() received an invalid attribute {:?}. Bindable attributes are: [{}]",
                S::NAME,
                key,
                declared.join(", ")
            )));
        }

        for (key, value) in overrides {
            attributes.assign(&key, value)?;
        }
        debug!(service = S::NAME, "Service attributes bound");
        Ok(Self::new(attributes))
    }

    pub fn attributes(&self) -> &S::Attributes {
        &self.attributes
    }

    /// Resolve `action` against a freshly built routing table
    pub fn handler(&self, action: &str) -> Handler<S> {
        Handler {
            action: action.to_string(),
            route: S::routes().take(action),
            attributes: self.attributes.clone(),
        }
    }

    pub fn implements(&self, action: &str) -> bool {
        S::routes().contains(action)
    }
}

impl<S: Service> Clone for Dispatcher<S> {
    fn clone(&self) -> Self {
        Self {
            attributes: self.attributes.clone(),
        }
    }
}

impl<S: Service> fmt::Debug for Dispatcher<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("service", &S::NAME)
            .field("actions", &S::routes().actions())
            .finish()
    }
}
