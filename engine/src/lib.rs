//! Model services over gRPC
//!
//! Standard Create/List/Retrieve/Update/PartialUpdate/Destroy actions for
//! model-backed services, and a servicer factory that builds a fresh service
//! instance for every call.

pub const DEFAULT_GRPC_ADDR: &str = "127.0.0.1:50051";
pub const DEFAULT_GRPC_SOCKET: &str = "/var/run/modelrpc/modelrpc.sock";

pub mod adapters;
pub mod config;
pub mod context;
pub mod demo;
pub mod error;
pub mod generics;
pub mod mixins;
pub mod protobuf;
pub mod serializers;
pub mod services;
pub mod store;
pub mod transport;

pub mod proto {
    pub mod demo {
        include!(concat!(env!("OUT_DIR"), "/modelrpc.demo.AccountService.rs"));
    }
}

pub use context::{Call, CallContext, Request};
pub use error::{Error, Result, StoreError, ValidationError};
pub use generics::GenericService;
pub use mixins::{
    CreateModelMixin, DestroyModelMixin, ListModelMixin, PartialUpdateModelMixin,
    RetrieveModelMixin, UpdateModelMixin,
};
pub use protobuf::{Empty, Fields, ProtoMessage, ProtobufClass};
pub use serializers::{BoundSerializer, ListSerializer, Serializer};
pub use services::{actions, Attributes, Dispatcher, Handler, MessageStream, Reply, Routes, Service};
pub use store::{BaseQuerySet, InMemoryStore, Lookup, Model, QuerySet, Store};
