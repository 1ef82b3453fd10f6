//! In-Memory Store
//! Thread-safe implementation of the Store port with auto-incrementing keys

use super::{Model, Query, Store};
use crate::error::StoreError;
use crate::protobuf::Fields;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

#[derive(Debug)]
struct Table<M> {
    rows: BTreeMap<i64, M>,
    next_pk: i64,
}

/// In-memory store keyed by an integer primary key
///
/// Rows iterate in primary key order. Fields registered with
/// [`InMemoryStore::with_unique`] reject duplicate values on insert and update.
#[derive(Debug)]
pub struct InMemoryStore<M: Model> {
    table: Arc<RwLock<Table<M>>>,
    unique: Vec<&'static str>,
}

impl<M: Model> InMemoryStore<M> {
    pub fn new() -> Self {
        Self {
            table: Arc::new(RwLock::new(Table {
                rows: BTreeMap::new(),
                next_pk: 1,
            })),
            unique: Vec::new(),
        }
    }

    pub fn with_unique(mut self, field: &'static str) -> Self {
        self.unique.push(field);
        self
    }

    /// Load instances, keeping the primary keys they carry
    ///
    /// Instances with a null or zero key get the next free key. Nothing is
    /// loaded if any instance has a non-integer or repeated key, or collides
    /// on a unique field.
    pub fn seed(&self, instances: Vec<M>) -> Result<(), StoreError> {
        let mut table = self.write();
        let mut rows = table.rows.clone();
        let mut next_pk = table.next_pk;

        let mut unkeyed = Vec::new();
        for instance in instances {
            let pk = match instance.pk() {
                Value::Null => None,
                value => match value.as_i64() {
                    Some(0) => None,
                    Some(pk) => Some(pk),
                    None => {
                        return Err(StoreError::InvalidData(format!(
                            "{}: primary key {} is not an integer",
                            M::NAME,
                            value
                        )))
                    }
                },
            };
            let Some(pk) = pk else {
                unkeyed.push(instance);
                continue;
            };

            if rows.contains_key(&pk) {
                return Err(StoreError::Conflict {
                    model: M::NAME.to_string(),
                    field: M::PK_FIELD.to_string(),
                    value: pk.to_string(),
                });
            }
            self.check_unique(&rows, &instance.to_fields()?, None)?;
            next_pk = next_pk.max(successor::<M>(pk)?);
            rows.insert(pk, instance);
        }

        for instance in unkeyed {
            let mut fields = instance.to_fields()?;
            self.check_unique(&rows, &fields, None)?;

            let pk = next_pk;
            fields.insert(M::PK_FIELD.to_string(), Value::from(pk));
            rows.insert(pk, build(fields)?);
            next_pk = successor::<M>(pk)?;
        }

        table.rows = rows;
        table.next_pk = next_pk;
        debug!(model = M::NAME, rows = table.rows.len(), "Store seeded");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.read().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().rows.is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, Table<M>> {
        self.table.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Table<M>> {
        self.table.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_unique(
        &self,
        rows: &BTreeMap<i64, M>,
        fields: &Fields,
        skip_pk: Option<i64>,
    ) -> Result<(), StoreError> {
        for field in &self.unique {
            let Some(value) = fields.get(*field) else {
                continue;
            };
            for (pk, row) in rows {
                if Some(*pk) == skip_pk {
                    continue;
                }
                if row.to_fields()?.get(*field) == Some(value) {
                    return Err(StoreError::Conflict {
                        model: M::NAME.to_string(),
                        field: field.to_string(),
                        value: display(value),
                    });
                }
            }
        }
        Ok(())
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn build<M: Model>(fields: Fields) -> Result<M, StoreError> {
    serde_json::from_value(Value::Object(fields))
        .map_err(|e| StoreError::InvalidData(format!("{}: {}", M::NAME, e)))
}

fn successor<M: Model>(pk: i64) -> Result<i64, StoreError> {
    pk.checked_add(1)
        .ok_or_else(|| StoreError::Backend(format!("{}: primary keys exhausted", M::NAME)))
}

fn persisted_pk<M: Model>(instance: &M) -> Result<i64, StoreError> {
    instance
        .pk()
        .as_i64()
        .ok_or_else(|| StoreError::NotPersisted(M::NAME.to_string()))
}

impl<M: Model> Default for InMemoryStore<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Model> Clone for InMemoryStore<M> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
            unique: self.unique.clone(),
        }
    }
}

#[async_trait]
impl<M: Model> Store<M> for InMemoryStore<M> {
    async fn fetch(&self, query: &Query) -> Result<Vec<M>, StoreError> {
        let snapshot: Vec<M> = self.read().rows.values().cloned().collect();
        query.apply(snapshot)
    }

    async fn insert(&self, mut data: Fields) -> Result<M, StoreError> {
        let mut table = self.write();
        self.check_unique(&table.rows, &data, None)?;

        let pk = table.next_pk;
        let next_pk = successor::<M>(pk)?;
        data.insert(M::PK_FIELD.to_string(), Value::from(pk));
        let instance: M = build(data)?;

        table.rows.insert(pk, instance.clone());
        table.next_pk = next_pk;

        info!(
            model = M::NAME,
            pk = pk,
            total_rows = table.rows.len(),
            "Instance created"
        );

        Ok(instance)
    }

    async fn update(&self, instance: &M, data: Fields) -> Result<M, StoreError> {
        let pk = persisted_pk(instance)?;
        let mut table = self.write();

        let current = table
            .rows
            .get(&pk)
            .ok_or_else(|| StoreError::NotPersisted(M::NAME.to_string()))?;

        let mut fields = current.to_fields()?;
        for (key, value) in data {
            if key != M::PK_FIELD {
                fields.insert(key, value);
            }
        }
        self.check_unique(&table.rows, &fields, Some(pk))?;

        let updated: M = build(fields)?;
        table.rows.insert(pk, updated.clone());

        debug!(model = M::NAME, pk = pk, "Instance updated");

        Ok(updated)
    }

    async fn delete(&self, instance: &M) -> Result<(), StoreError> {
        let pk = persisted_pk(instance)?;
        let mut table = self.write();

        if table.rows.remove(&pk).is_none() {
            return Err(StoreError::NotPersisted(M::NAME.to_string()));
        }

        info!(
            model = M::NAME,
            pk = pk,
            remaining_rows = table.rows.len(),
            "Instance deleted"
        );

        Ok(())
    }
}
