//! Store port and deferred collection handles
//!
//! A service declares its collection as a [`BaseQuerySet`], which cannot be
//! evaluated at all. Each call derives its own [`QuerySet`] from it, and a
//! `QuerySet` only touches the store when one of its evaluating methods
//! (`materialize`, `get`, `first`, `count`) is awaited. Nothing is cached
//! between evaluations.

pub mod in_memory;

pub use in_memory::InMemoryStore;

use crate::error::{Error, StoreError};
use crate::protobuf::Fields;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Related objects cached on an instance, keyed by relation name
pub type PrefetchCache = HashMap<String, Vec<Value>>;

/// A persisted entity
pub trait Model: Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Name used in error messages
    const NAME: &'static str;

    /// Primary key field name
    const PK_FIELD: &'static str = "id";

    fn pk(&self) -> Value;

    /// Related-object cache populated by the store, if the model keeps one
    fn prefetched_objects_cache(&mut self) -> Option<&mut PrefetchCache> {
        None
    }

    fn to_fields(&self) -> Result<Fields, StoreError> {
        match serde_json::to_value(self) {
            Ok(Value::Object(fields)) => Ok(fields),
            Ok(other) => Err(StoreError::InvalidData(format!(
                "{} serialized to {} instead of an object",
                Self::NAME,
                other
            ))),
            Err(e) => Err(StoreError::InvalidData(e.to_string())),
        }
    }
}

/// A single filter condition
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Exact { field: String, value: Value },
    In { field: String, values: Vec<Value> },
    IContains { field: String, value: String },
}

impl Lookup {
    pub fn exact(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Lookup::Exact {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn is_in<V: Into<Value>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Lookup::In {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn icontains(field: impl Into<String>, value: impl Into<String>) -> Self {
        Lookup::IContains {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn field(&self) -> &str {
        match self {
            Lookup::Exact { field, .. }
            | Lookup::In { field, .. }
            | Lookup::IContains { field, .. } => field.as_str(),
        }
    }

    pub fn matches(&self, fields: &Fields) -> bool {
        let Some(actual) = fields.get(self.field()) else {
            return false;
        };

        match self {
            Lookup::Exact { value, .. } => loosely_equal(actual, value),
            Lookup::In { values, .. } => values.iter().any(|v| loosely_equal(actual, v)),
            Lookup::IContains { value, .. } => actual
                .as_str()
                .map(|s| s.to_lowercase().contains(&value.to_lowercase()))
                .unwrap_or(false),
        }
    }
}

// Lookup values usually come from request messages, where an id may arrive as
// a string while the stored field is a number.
fn loosely_equal(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (a, b) {
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            n.to_string() == *s
        }
        _ => false,
    }
}

/// Sort key, parsed from `"field"` or `"-field"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub descending: bool,
}

impl OrderBy {
    pub fn parse(term: &str) -> Self {
        match term.strip_prefix('-') {
            Some(field) => Self {
                field: field.to_string(),
                descending: true,
            },
            None => Self {
                field: term.to_string(),
                descending: false,
            },
        }
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match (a, b) {
            (Value::Number(x), Value::Number(y)) => x
                .as_f64()
                .partial_cmp(&y.as_f64())
                .unwrap_or(Ordering::Equal),
            (Value::String(x), Value::String(y)) => x.cmp(y),
            (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            _ => a.to_string().cmp(&b.to_string()),
        },
    }
}

/// Filters, exclusions and ordering accumulated on a [`QuerySet`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Lookup>,
    pub excludes: Vec<Lookup>,
    pub ordering: Vec<OrderBy>,
}

impl Query {
    pub fn matches(&self, fields: &Fields) -> bool {
        self.filters.iter().all(|l| l.matches(fields))
            && !self.excludes.iter().any(|l| l.matches(fields))
    }

    /// Filter and order instances in memory, keeping input order for ties
    pub fn apply<M: Model>(
        &self,
        instances: impl IntoIterator<Item = M>,
    ) -> Result<Vec<M>, StoreError> {
        let mut rows = Vec::new();
        for instance in instances {
            let fields = instance.to_fields()?;
            if self.matches(&fields) {
                rows.push((fields, instance));
            }
        }

        if !self.ordering.is_empty() {
            rows.sort_by(|(a, _), (b, _)| {
                self.ordering
                    .iter()
                    .map(|key| {
                        let ord = compare_values(a.get(&key.field), b.get(&key.field));
                        if key.descending {
                            ord.reverse()
                        } else {
                            ord
                        }
                    })
                    .find(|ord| *ord != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            });
        }

        Ok(rows.into_iter().map(|(_, instance)| instance).collect())
    }
}

/// Store port for model persistence
/// Implementations live next to this module or in the embedding application
#[async_trait]
pub trait Store<M: Model>: Send + Sync {
    /// Fetch every instance matching the query, in query order
    async fn fetch(&self, query: &Query) -> Result<Vec<M>, StoreError>;

    async fn count(&self, query: &Query) -> Result<usize, StoreError> {
        Ok(self.fetch(query).await?.len())
    }

    /// Persist a new instance from validated data
    async fn insert(&self, data: Fields) -> Result<M, StoreError>;

    /// Overwrite the fields present in `data`, keeping the others
    async fn update(&self, instance: &M, data: Fields) -> Result<M, StoreError>;

    async fn delete(&self, instance: &M) -> Result<(), StoreError>;
}

/// Collection declared once on a service
///
/// It has no evaluating methods; use [`BaseQuerySet::all`] or
/// [`BaseQuerySet::filter`] to get a fresh handle for the current call.
pub struct BaseQuerySet<M: Model> {
    store: Arc<dyn Store<M>>,
}

impl<M: Model> BaseQuerySet<M> {
    pub fn new(store: Arc<dyn Store<M>>) -> Self {
        Self { store }
    }

    /// Fresh, unfiltered handle
    pub fn all(&self) -> QuerySet<M> {
        QuerySet {
            store: self.store.clone(),
            query: Query::default(),
        }
    }

    pub fn filter(&self, lookup: Lookup) -> QuerySet<M> {
        self.all().filter(lookup)
    }

    pub fn store(&self) -> Arc<dyn Store<M>> {
        self.store.clone()
    }
}

impl<M: Model> Clone for BaseQuerySet<M> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<M: Model> fmt::Debug for BaseQuerySet<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BaseQuerySet<{}>", M::NAME)
    }
}

/// Deferred, filterable collection handle owned by one call
pub struct QuerySet<M: Model> {
    store: Arc<dyn Store<M>>,
    query: Query,
}

impl<M: Model> QuerySet<M> {
    pub fn all(&self) -> Self {
        self.clone()
    }

    pub fn filter(mut self, lookup: Lookup) -> Self {
        self.query.filters.push(lookup);
        self
    }

    pub fn exclude(mut self, lookup: Lookup) -> Self {
        self.query.excludes.push(lookup);
        self
    }

    pub fn order_by(mut self, term: &str) -> Self {
        self.query.ordering.push(OrderBy::parse(term));
        self
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn store(&self) -> Arc<dyn Store<M>> {
        self.store.clone()
    }

    /// Evaluate the handle against the store
    pub async fn materialize(&self) -> Result<Vec<M>, StoreError> {
        self.store.fetch(&self.query).await
    }

    pub async fn count(&self) -> Result<usize, StoreError> {
        self.store.count(&self.query).await
    }

    pub async fn first(&self) -> Result<Option<M>, StoreError> {
        Ok(self.materialize().await?.into_iter().next())
    }

    /// Exactly one matching instance
    pub async fn get(&self) -> Result<M, Error> {
        let mut instances = self.materialize().await?;
        match instances.len() {
            0 => Err(Error::NotFound(format!(
                "{} matching query does not exist.",
                M::NAME
            ))),
            1 => Ok(instances.remove(0)),
            n => Err(Error::MultipleObjectsReturned(format!(
                "get() returned more than one {} -- it returned {}!",
                M::NAME,
                n
            ))),
        }
    }
}

impl<M: Model> Clone for QuerySet<M> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            query: self.query.clone(),
        }
    }
}

impl<M: Model> fmt::Debug for QuerySet<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuerySet")
            .field("model", &M::NAME)
            .field("query", &self.query)
            .finish()
    }
}
