//! Keyspace lookup and document access.
//!
//! Plans name keyspaces by `namespace:keyspace`; a [`Datastore`] resolves
//! that pair into a [`Keyspace`] handle when a plan is built or decoded.
//! [`MemoryDatastore`] keeps raw JSON documents in memory and hands them out
//! as lazily parsed values, each annotated with its document key under `id`.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use log::debug;
use thiserror::Error;

use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DatastoreError {
    #[error("namespace '{0}' not found")]
    NamespaceNotFound(String),

    #[error("keyspace '{keyspace}' not found in namespace '{namespace}'")]
    KeyspaceNotFound { namespace: String, keyspace: String },

    #[error("cannot load documents into '{keyspace}': {message}")]
    InvalidLoad { keyspace: String, message: String },
}

/// A collection of documents addressed by key.
pub trait Keyspace: fmt::Debug + Send + Sync {
    fn namespace_id(&self) -> &str;

    fn name(&self) -> &str;

    /// Every document key, in key order.
    fn keys(&self) -> Result<Vec<String>, DatastoreError>;

    /// Fetches documents by key. Unknown keys are skipped; each returned
    /// document carries its key as the `id` annotation.
    fn fetch(&self, keys: &[String]) -> Result<Vec<Value>, DatastoreError>;
}

/// Resolves keyspace names to handles.
pub trait Datastore: Send + Sync {
    fn keyspace(&self, namespace: &str, keyspace: &str)
    -> Result<Arc<dyn Keyspace>, DatastoreError>;
}

/// In-memory keyspace of raw JSON documents.
pub struct MemoryKeyspace {
    namespace: String,
    name: String,
    documents: RwLock<BTreeMap<String, String>>,
}

impl MemoryKeyspace {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            documents: RwLock::new(BTreeMap::new()),
        }
    }

    /// Stores (or replaces) the document under `key`.
    pub fn insert(&self, key: impl Into<String>, json: impl Into<String>) {
        self.documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), json.into());
    }

    pub fn len(&self) -> usize {
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for MemoryKeyspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryKeyspace")
            .field("namespace", &self.namespace)
            .field("name", &self.name)
            .field("documents", &self.len())
            .finish()
    }
}

impl Keyspace for MemoryKeyspace {
    fn namespace_id(&self) -> &str {
        &self.namespace
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn keys(&self) -> Result<Vec<String>, DatastoreError> {
        let documents = self.documents.read().unwrap_or_else(PoisonError::into_inner);
        Ok(documents.keys().cloned().collect())
    }

    fn fetch(&self, keys: &[String]) -> Result<Vec<Value>, DatastoreError> {
        let documents = self.documents.read().unwrap_or_else(PoisonError::into_inner);
        let mut fetched = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(raw) = documents.get(key) {
                let mut doc = Value::parsed(raw.as_str());
                doc.set_annotation("id", Value::from(key.as_str()));
                fetched.push(doc);
            }
        }
        Ok(fetched)
    }
}

/// In-memory datastore: namespaces of [`MemoryKeyspace`]s.
#[derive(Default)]
pub struct MemoryDatastore {
    namespaces: RwLock<HashMap<String, HashMap<String, Arc<MemoryKeyspace>>>>,
}

impl MemoryDatastore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the keyspace, creating it (and its namespace) if needed.
    pub fn create_keyspace(&self, namespace: &str, keyspace: &str) -> Arc<MemoryKeyspace> {
        let mut namespaces = self.namespaces.write().unwrap_or_else(PoisonError::into_inner);
        namespaces
            .entry(namespace.to_string())
            .or_default()
            .entry(keyspace.to_string())
            .or_insert_with(|| {
                debug!("creating keyspace {namespace}:{keyspace}");
                Arc::new(MemoryKeyspace::new(namespace, keyspace))
            })
            .clone()
    }

    /// Loads documents from a JSON object of `key -> document`.
    pub fn load(
        &self,
        namespace: &str,
        keyspace: &str,
        documents: &serde_json::Value,
    ) -> Result<usize, DatastoreError> {
        let target = self.create_keyspace(namespace, keyspace);
        let Some(documents) = documents.as_object() else {
            return Err(DatastoreError::InvalidLoad {
                keyspace: keyspace.to_string(),
                message: "expected an object of documents keyed by id".to_string(),
            });
        };
        for (key, doc) in documents {
            target.insert(key.as_str(), doc.to_string());
        }
        debug!("loaded {} documents into {namespace}:{keyspace}", documents.len());
        Ok(documents.len())
    }
}

impl Datastore for MemoryDatastore {
    fn keyspace(
        &self,
        namespace: &str,
        keyspace: &str,
    ) -> Result<Arc<dyn Keyspace>, DatastoreError> {
        let namespaces = self.namespaces.read().unwrap_or_else(PoisonError::into_inner);
        let found = namespaces
            .get(namespace)
            .ok_or_else(|| DatastoreError::NamespaceNotFound(namespace.to_string()))?
            .get(keyspace)
            .ok_or_else(|| DatastoreError::KeyspaceNotFound {
                namespace: namespace.to_string(),
                keyspace: keyspace.to_string(),
            })?;
        let handle: Arc<dyn Keyspace> = found.clone();
        Ok(handle)
    }
}
