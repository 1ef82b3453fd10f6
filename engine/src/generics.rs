//! Generic model service
//!
//! Collection, lookup and serializer plumbing shared by the action mixins.

use crate::context::{CallContext, Request};
use crate::error::{Error, Result, ValidationError};
use crate::protobuf::{Fields, ProtobufClass};
use crate::serializers::{BoundSerializer, ListSerializer, Serializer};
use crate::services::Service;
use crate::store::{BaseQuerySet, Lookup, Model, QuerySet};
use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
pub trait GenericService: Service {
    type Model: Model;

    type Serializer: Serializer<Model = Self::Model> + Default;

    /// Declared collection, if any
    fn queryset(&self) -> Option<&BaseQuerySet<Self::Model>> {
        None
    }

    /// Model field used to find a single instance
    fn lookup_field(&self) -> &str {
        <Self::Model as Model>::PK_FIELD
    }

    /// Request field holding the lookup value
    fn lookup_request_field(&self) -> &str {
        self.lookup_field()
    }

    /// Fresh collection handle for this call
    fn get_queryset(&self, _request: &Request, _context: &CallContext) -> Result<QuerySet<Self::Model>> {
        self.queryset().map(BaseQuerySet::all).ok_or_else(|| {
            Error::configuration(format!(
                "{} should either include a queryset or override get_queryset()",
                Self::NAME
            ))
        })
    }

    fn filter_queryset(
        &self,
        _request: &Request,
        _context: &CallContext,
        queryset: QuerySet<Self::Model>,
    ) -> Result<QuerySet<Self::Model>> {
        Ok(queryset)
    }

    async fn get_object(&self, request: &Request, context: &CallContext) -> Result<Self::Model> {
        let queryset = self.filter_queryset(request, context, self.get_queryset(request, context)?)?;

        let request_field = self.lookup_request_field();
        let value = match request.get(request_field) {
            Some(value) if !value.is_null() => value.clone(),
            _ => {
                return Err(ValidationError::field(request_field, "This field is required.").into())
            }
        };

        let lookup = Lookup::exact(self.lookup_field(), value.clone());
        match queryset.filter(lookup).get().await {
            Err(Error::NotFound(_)) => Err(Error::NotFound(format!(
                "{}: {} not found!",
                <Self::Model as Model>::NAME,
                display(&value)
            ))),
            other => other,
        }
    }

    fn get_serializer_class(&self) -> Self::Serializer {
        Self::Serializer::default()
    }

    fn get_serializer(
        &self,
        request: &Request,
        context: &CallContext,
        instance: Option<Self::Model>,
        data: Option<Fields>,
    ) -> Result<BoundSerializer<Self::Serializer>> {
        let store = self.get_queryset(request, context)?.store();
        Ok(BoundSerializer::new(
            self.get_serializer_class(),
            store,
            instance,
            data,
        ))
    }

    fn get_list_serializer(
        &self,
        _request: &Request,
        _context: &CallContext,
        instances: Vec<Self::Model>,
    ) -> ListSerializer<Self::Serializer> {
        ListSerializer::new(self.get_serializer_class(), instances)
    }

    fn get_protobuf_class(
        &self,
        _request: &Request,
        _context: &CallContext,
    ) -> ProtobufClass<Self::Message> {
        ProtobufClass::new()
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
