//! Model action mixins
//!
//! Each trait provides one standard action on top of [`GenericService`]. A
//! service opts in by implementing the trait (usually with an empty impl) and
//! registering the action through the matching [`Routes`] builder method.

use crate::context::{Call, CallContext, Request};
use crate::error::Result;
use crate::generics::GenericService;
use crate::protobuf::{Empty, Fields};
use crate::serializers::{BoundSerializer, Serializer};
use crate::services::{actions, MessageStream, Routes};
use crate::store::Model;
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

/// Request field naming the fields a partial update touches
pub const PARTIAL_UPDATE_FIELDS: &str = "_partial_update_fields";

#[async_trait]
pub trait CreateModelMixin: GenericService {
    /// Create a model instance from the request and return its representation
    async fn create(&self, request: &Request, context: &CallContext) -> Result<Self::Message> {
        let mut serializer = self.get_serializer(request, context, None, Some(request.to_fields()))?;
        serializer.is_valid(true)?;
        self.perform_create(&mut serializer).await?;

        let protobuf_class = self.get_protobuf_class(request, context);
        protobuf_class.from_fields(serializer.data()?)
    }

    async fn perform_create(&self, serializer: &mut BoundSerializer<Self::Serializer>) -> Result<()> {
        serializer.save().await?;
        Ok(())
    }
}

#[async_trait]
pub trait ListModelMixin: GenericService {
    /// Stream every instance of the filtered collection
    ///
    /// The collection is read once, when the call starts; messages are then
    /// converted one by one as the stream is consumed.
    async fn list(&self, request: &Request, context: &CallContext) -> Result<MessageStream<Self::Message>> {
        let queryset = self.filter_queryset(request, context, self.get_queryset(request, context)?)?;
        let instances = queryset.materialize().await?;
        debug!(service = Self::NAME, count = instances.len(), "Listing instances");

        let serializer = self.get_list_serializer(request, context, instances);
        let protobuf_class = self.get_protobuf_class(request, context);
        Ok(serializer.into_messages(protobuf_class))
    }
}

#[async_trait]
pub trait RetrieveModelMixin: GenericService {
    async fn retrieve(&self, request: &Request, context: &CallContext) -> Result<Self::Message> {
        let instance = self.get_object(request, context).await?;
        let serializer = self.get_serializer(request, context, Some(instance), None)?;

        let protobuf_class = self.get_protobuf_class(request, context);
        protobuf_class.from_fields(serializer.data()?)
    }
}

#[async_trait]
pub trait UpdateModelMixin: GenericService {
    /// Update the looked-up instance with the fields present in the request
    async fn update(&self, request: &Request, context: &CallContext) -> Result<Self::Message> {
        let instance = self.get_object(request, context).await?;
        let mut serializer =
            self.get_serializer(request, context, Some(instance), Some(request.to_fields()))?;
        serializer.is_valid(true)?;
        self.perform_update(&mut serializer).await?;
        invalidate_prefetch_cache(&mut serializer);

        let protobuf_class = self.get_protobuf_class(request, context);
        protobuf_class.from_fields(serializer.data()?)
    }

    async fn perform_update(&self, serializer: &mut BoundSerializer<Self::Serializer>) -> Result<()> {
        serializer.save().await?;
        Ok(())
    }
}

#[async_trait]
pub trait PartialUpdateModelMixin: GenericService {
    /// Update only the fields listed in `_partial_update_fields`
    ///
    /// Listed fields absent from the request are sent to the serializer as
    /// null, which clears them. Without a field list, every field present in
    /// the request is applied.
    async fn partial_update(&self, request: &Request, context: &CallContext) -> Result<Self::Message> {
        let instance = self.get_object(request, context).await?;
        let data = partial_update_data(request);
        let mut serializer = self
            .get_serializer(request, context, Some(instance), Some(data))?
            .partial(true);
        serializer.is_valid(true)?;
        self.perform_partial_update(&mut serializer).await?;
        invalidate_prefetch_cache(&mut serializer);

        let protobuf_class = self.get_protobuf_class(request, context);
        protobuf_class.from_fields(serializer.data()?)
    }

    async fn perform_partial_update(
        &self,
        serializer: &mut BoundSerializer<Self::Serializer>,
    ) -> Result<()> {
        serializer.save().await?;
        Ok(())
    }
}

#[async_trait]
pub trait DestroyModelMixin: GenericService {
    async fn destroy(&self, request: &Request, context: &CallContext) -> Result<Empty> {
        let instance = self.get_object(request, context).await?;
        self.perform_destroy(instance).await?;
        Ok(Empty {})
    }

    async fn perform_destroy(&self, instance: Self::Model) -> Result<()> {
        let Call {
            request, context, ..
        } = self.call();
        let store = self.get_queryset(request, context)?.store();
        store.delete(&instance).await?;
        Ok(())
    }
}

// A saved instance may still carry related objects fetched before the save.
fn invalidate_prefetch_cache<S: Serializer>(serializer: &mut BoundSerializer<S>) {
    if let Some(cache) = serializer
        .instance_mut()
        .and_then(|instance| instance.prefetched_objects_cache())
    {
        if !cache.is_empty() {
            cache.clear();
        }
    }
}

fn partial_update_data(request: &Request) -> Fields {
    let mut data = request.to_fields();
    let Some(Value::Array(names)) = data.remove(PARTIAL_UPDATE_FIELDS) else {
        return data;
    };

    names
        .iter()
        .filter_map(Value::as_str)
        .map(|name| {
            let value = data.get(name).cloned().unwrap_or(Value::Null);
            (name.to_string(), value)
        })
        .collect()
}

impl<S: CreateModelMixin> Routes<S> {
    pub fn create(self) -> Self {
        self.unary(actions::CREATE, |service: S| async move {
            let Call { request, context, .. } = service.call().clone();
            service.create(&request, &context).await
        })
    }
}

impl<S: ListModelMixin> Routes<S> {
    pub fn list(self) -> Self {
        self.streaming(actions::LIST, |service: S| async move {
            let Call { request, context, .. } = service.call().clone();
            service.list(&request, &context).await
        })
    }
}

impl<S: RetrieveModelMixin> Routes<S> {
    pub fn retrieve(self) -> Self {
        self.unary(actions::RETRIEVE, |service: S| async move {
            let Call { request, context, .. } = service.call().clone();
            service.retrieve(&request, &context).await
        })
    }
}

impl<S: UpdateModelMixin> Routes<S> {
    pub fn update(self) -> Self {
        self.unary(actions::UPDATE, |service: S| async move {
            let Call { request, context, .. } = service.call().clone();
            service.update(&request, &context).await
        })
    }
}

impl<S: PartialUpdateModelMixin> Routes<S> {
    pub fn partial_update(self) -> Self {
        self.unary(actions::PARTIAL_UPDATE, |service: S| async move {
            let Call { request, context, .. } = service.call().clone();
            service.partial_update(&request, &context).await
        })
    }
}

impl<S: DestroyModelMixin> Routes<S> {
    pub fn destroy(self) -> Self {
        self.empty(actions::DESTROY, |service: S| async move {
            let Call { request, context, .. } = service.call().clone();
            service.destroy(&request, &context).await
        })
    }
}

impl<S: ListModelMixin + RetrieveModelMixin> Routes<S> {
    /// List and Retrieve
    pub fn read_only(self) -> Self {
        self.list().retrieve()
    }
}

impl<S> Routes<S>
where
    S: CreateModelMixin
        + ListModelMixin
        + RetrieveModelMixin
        + UpdateModelMixin
        + PartialUpdateModelMixin
        + DestroyModelMixin,
{
    /// Every standard action
    pub fn model(self) -> Self {
        self.create()
            .list()
            .retrieve()
            .update()
            .partial_update()
            .destroy()
    }
}
