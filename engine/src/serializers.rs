//! Serializer collaborator
//!
//! A [`Serializer`] owns the validation and representation rules for one
//! model. Services never hold one across calls: each call wraps it in a
//! [`BoundSerializer`] (single instance and/or input data) or a
//! [`ListSerializer`] (many instances).

use crate::error::{Error, Result, ValidationError};
use crate::protobuf::{Fields, ProtoMessage, ProtobufClass};
use crate::services::MessageStream;
use crate::store::{Model, Store};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait Serializer: Send + Sync + 'static {
    type Model: Model;

    /// Check incoming data and return the fields to persist
    ///
    /// `instance` is set when updating. With `partial`, fields missing from
    /// `data` are not required.
    fn validate(
        &self,
        data: &Fields,
        instance: Option<&Self::Model>,
        partial: bool,
    ) -> Result<Fields, ValidationError>;

    fn to_representation(&self, instance: &Self::Model) -> Result<Fields> {
        let mut fields = instance.to_fields()?;
        fields.retain(|_, value| !value.is_null());
        Ok(fields)
    }

    async fn create(&self, store: &dyn Store<Self::Model>, validated: Fields) -> Result<Self::Model> {
        Ok(store.insert(validated).await?)
    }

    async fn update(
        &self,
        store: &dyn Store<Self::Model>,
        instance: &Self::Model,
        validated: Fields,
    ) -> Result<Self::Model> {
        Ok(store.update(instance, validated).await?)
    }
}

/// Serializer bound to one call's instance and input data
pub struct BoundSerializer<S: Serializer> {
    serializer: S,
    store: Arc<dyn Store<S::Model>>,
    instance: Option<S::Model>,
    initial_data: Option<Fields>,
    partial: bool,
    validated_data: Option<Fields>,
    errors: ValidationError,
}

impl<S: Serializer> BoundSerializer<S> {
    pub fn new(
        serializer: S,
        store: Arc<dyn Store<S::Model>>,
        instance: Option<S::Model>,
        data: Option<Fields>,
    ) -> Self {
        Self {
            serializer,
            store,
            instance,
            initial_data: data,
            partial: false,
            validated_data: None,
            errors: ValidationError::new(),
        }
    }

    pub fn partial(mut self, partial: bool) -> Self {
        self.partial = partial;
        self
    }

    pub fn is_partial(&self) -> bool {
        self.partial
    }

    /// Run validation once; later calls reuse the outcome
    pub fn is_valid(&mut self, raise_exception: bool) -> Result<bool> {
        let data = self.initial_data.as_ref().ok_or_else(|| {
            Error::configuration("cannot validate a serializer that was built without data")
        })?;

        if self.validated_data.is_none() && self.errors.is_empty() {
            match self
                .serializer
                .validate(data, self.instance.as_ref(), self.partial)
            {
                Ok(validated) => self.validated_data = Some(validated),
                Err(errors) => self.errors = errors,
            }
        }

        if raise_exception && !self.errors.is_empty() {
            return Err(Error::Validation(self.errors.clone()));
        }
        Ok(self.errors.is_empty())
    }

    pub fn validated_data(&self) -> Option<&Fields> {
        self.validated_data.as_ref()
    }

    pub fn errors(&self) -> &ValidationError {
        &self.errors
    }

    /// Create or update through the store, depending on whether an instance is bound
    pub async fn save(&mut self) -> Result<&S::Model> {
        if !self.errors.is_empty() {
            return Err(Error::configuration(
                "cannot save a serializer with validation errors",
            ));
        }
        let validated = self.validated_data.clone().ok_or_else(|| {
            Error::configuration("`is_valid()` must be called before `save()`")
        })?;

        let saved = match &self.instance {
            Some(instance) => {
                self.serializer
                    .update(self.store.as_ref(), instance, validated)
                    .await?
            }
            None => self.serializer.create(self.store.as_ref(), validated).await?,
        };
        Ok(self.instance.insert(saved))
    }

    pub fn instance(&self) -> Option<&S::Model> {
        self.instance.as_ref()
    }

    pub fn instance_mut(&mut self) -> Option<&mut S::Model> {
        self.instance.as_mut()
    }

    /// Representation of the bound instance, or the validated input when none is bound
    pub fn data(&self) -> Result<Fields> {
        match &self.instance {
            Some(instance) => self.serializer.to_representation(instance),
            None => Ok(self
                .validated_data
                .clone()
                .or_else(|| self.initial_data.clone())
                .unwrap_or_default()),
        }
    }
}

/// Serializer over many instances, used by list actions
pub struct ListSerializer<S: Serializer> {
    serializer: S,
    instances: Vec<S::Model>,
}

impl<S: Serializer> ListSerializer<S> {
    pub fn new(serializer: S, instances: Vec<S::Model>) -> Self {
        Self {
            serializer,
            instances,
        }
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn data(&self) -> Result<Vec<Fields>> {
        self.instances
            .iter()
            .map(|instance| self.serializer.to_representation(instance))
            .collect()
    }

    /// Lazily convert each instance, in order, into a message of `class`
    pub fn into_messages<M: ProtoMessage>(self, class: ProtobufClass<M>) -> MessageStream<M> {
        let ListSerializer {
            serializer,
            instances,
        } = self;

        Box::pin(tokio_stream::iter(instances.into_iter().map(
            move |instance| {
                serializer
                    .to_representation(&instance)
                    .and_then(|fields| class.from_fields(fields))
            },
        )))
    }
}
