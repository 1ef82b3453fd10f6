//! Structural conversion between protobuf messages and field mappings
//!
//! Messages are prost structs that also derive serde, so a message maps to a
//! JSON object keyed by proto field name. Unset optional fields are left out of
//! the mapping, and keys a message does not declare are ignored when parsing.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;

/// Plain field mapping exchanged with serializers and stores
pub type Fields = serde_json::Map<String, Value>;

/// Message types a service can accept or produce
pub trait ProtoMessage:
    prost::Message + Default + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

impl<T> ProtoMessage for T where
    T: prost::Message + Default + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

/// Zero-field response returned by destroy-style actions
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
pub struct Empty {}

/// Convert a message into a field mapping
pub fn message_to_fields<M: Serialize + ?Sized>(message: &M) -> Result<Fields> {
    match serde_json::to_value(message)? {
        Value::Object(mut fields) => {
            fields.retain(|_, value| !value.is_null());
            Ok(fields)
        }
        other => Err(Error::Conversion(format!(
            "expected a message, got {}",
            other
        ))),
    }
}

/// Populate a fresh message from a field mapping
pub fn fields_to_message<M: DeserializeOwned>(fields: Fields) -> Result<M> {
    Ok(serde_json::from_value(Value::Object(fields))?)
}

/// Descriptor for the message type a service responds with
pub struct ProtobufClass<M> {
    _message: PhantomData<fn() -> M>,
}

impl<M: ProtoMessage> ProtobufClass<M> {
    pub fn new() -> Self {
        Self {
            _message: PhantomData,
        }
    }

    /// Build a new message of this class from a representation
    pub fn from_fields(&self, fields: Fields) -> Result<M> {
        fields_to_message(fields)
    }

    pub fn name(&self) -> &'static str {
        std::any::type_name::<M>()
    }
}

impl<M: ProtoMessage> Default for ProtobufClass<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> Clone for ProtobufClass<M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M> Copy for ProtobufClass<M> {}

impl<M> fmt::Debug for ProtobufClass<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProtobufClass<{}>", std::any::type_name::<M>())
    }
}
