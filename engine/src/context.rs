//! Per-call state handed to service instances

use crate::error::{Error, Result};
use crate::protobuf::{message_to_fields, Fields};
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};
use tonic::metadata::MetadataMap;
use tonic::{Code, Status};

/// Inbound request message, already converted to a plain field mapping
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Request {
    fields: Fields,
}

impl Request {
    pub fn new(fields: Fields) -> Self {
        Self { fields }
    }

    /// Convert a protobuf message into a request mapping
    pub fn from_message<M: Serialize>(message: &M) -> Result<Self> {
        Ok(Self::new(message_to_fields(message)?))
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Owned copy of the mapping, used as serializer input
    pub fn to_fields(&self) -> Fields {
        self.fields.clone()
    }
}

#[derive(Debug, Default)]
struct Outcome {
    code: Option<Code>,
    details: Option<String>,
}

/// Call handle shared between the dispatcher and the service instance
///
/// Services use it to signal a status without returning early; the dispatcher
/// reads it back when the call fails.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    metadata: Arc<MetadataMap>,
    outcome: Arc<Mutex<Outcome>>,
}

impl CallContext {
    pub fn new(metadata: MetadataMap) -> Self {
        Self {
            metadata: Arc::new(metadata),
            outcome: Arc::default(),
        }
    }

    /// Metadata the client sent with the call
    pub fn metadata(&self) -> &MetadataMap {
        &self.metadata
    }

    pub fn set_code(&self, code: Code) {
        self.outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .code = Some(code);
    }

    pub fn set_details(&self, details: impl Into<String>) {
        self.outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .details = Some(details.into());
    }

    pub fn code(&self) -> Option<Code> {
        self.outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .code
    }

    pub fn details(&self) -> Option<String> {
        self.outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .details
            .clone()
    }

    /// Status reported for a failed call
    ///
    /// A non-OK code set on the context wins over the code derived from the error.
    pub fn status_for(&self, error: Error) -> Status {
        match self.code() {
            Some(code) if code != Code::Ok => {
                let details = self.details().unwrap_or_else(|| error.to_string());
                Status::new(code, details)
            }
            _ => error.into(),
        }
    }
}

/// Everything the dispatcher attaches to a freshly built service instance
#[derive(Debug, Clone)]
pub struct Call {
    pub request: Request,
    pub context: CallContext,
    pub action: String,
}

impl Call {
    pub fn new(request: Request, context: CallContext, action: impl Into<String>) -> Self {
        Self {
            request,
            context,
            action: action.into(),
        }
    }
}
