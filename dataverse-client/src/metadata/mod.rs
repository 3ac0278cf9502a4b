//! In-memory metadata cache.
//!
//! [`MetadataCache`] implements [`MetadataProvider`] from entries inserted up
//! front, optionally reading through to a backing provider on a miss. Entries
//! fetched from the backing provider are kept for the lifetime of the cache.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use dataverse_core::{AttributeMetadata, EntityFilters, EntityMetadata, MetadataProvider, Result};

/// Statistics for a [`MetadataCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetadataCacheStats {
    hits: u64,
    misses: u64,
}

impl MetadataCacheStats {
    /// Returns the number of lookups answered from the cache.
    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// Returns the number of lookups not answered from the cache.
    pub fn misses(&self) -> u64 {
        self.misses
    }

    /// Returns the hit ratio (0.0 to 1.0).
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Clone)]
struct CachedEntity {
    filters: EntityFilters,
    metadata: EntityMetadata,
}

impl CachedEntity {
    fn satisfies(&self, requested: EntityFilters) -> bool {
        self.filters == EntityFilters::All || self.filters == requested
    }
}

/// A thread-safe metadata cache.
#[derive(Default)]
pub struct MetadataCache {
    attributes: RwLock<HashMap<(String, String), AttributeMetadata>>,
    entities: RwLock<HashMap<String, CachedEntity>>,
    source: Option<Arc<dyn MetadataProvider>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MetadataCache {
    /// Creates an empty cache with no backing provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty cache reading through to `source` on a miss.
    pub fn with_source(source: Arc<dyn MetadataProvider>) -> Self {
        Self {
            source: Some(source),
            ..Self::default()
        }
    }

    /// Adds attribute metadata for `entity_name`.
    pub fn insert_attribute(&self, entity_name: &str, attribute: AttributeMetadata) {
        let key = (entity_name.to_lowercase(), attribute.logical_name().to_lowercase());
        self.attributes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, attribute);
    }

    /// Adds complete entity metadata.
    pub fn insert_entity(&self, metadata: EntityMetadata) {
        self.store_entity(EntityFilters::All, metadata);
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.attributes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.entities
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Returns the number of cached entities.
    pub fn entity_count(&self) -> usize {
        self.entities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns a snapshot of hit and miss counters.
    pub fn stats(&self) -> MetadataCacheStats {
        MetadataCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    fn store_entity(&self, filters: EntityFilters, metadata: EntityMetadata) {
        let key = metadata.logical_name().to_lowercase();
        let mut entities = self.entities.write().unwrap_or_else(PoisonError::into_inner);
        let entry = match entities.remove(&key) {
            // Entity and relationship fetches together cover everything; keep
            // the metadata that carries the relationship lists.
            Some(existing) if filters != EntityFilters::All && existing.filters != filters => {
                let metadata = if filters == EntityFilters::Relationships {
                    metadata
                } else {
                    existing.metadata
                };
                CachedEntity {
                    filters: EntityFilters::All,
                    metadata,
                }
            }
            _ => CachedEntity { filters, metadata },
        };
        entities.insert(key, entry);
    }

    fn record(&self, hit: bool) {
        let counter = if hit { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

impl std::fmt::Debug for MetadataCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataCache")
            .field("entities", &self.entity_count())
            .field("has_source", &self.source.is_some())
            .field("stats", &self.stats())
            .finish()
    }
}

impl MetadataProvider for MetadataCache {
    fn attribute_metadata(
        &self,
        entity_name: &str,
        attribute_name: &str,
    ) -> Result<Option<AttributeMetadata>> {
        let key = (entity_name.to_lowercase(), attribute_name.to_lowercase());
        let cached = self
            .attributes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned();
        self.record(cached.is_some());
        if cached.is_some() {
            return Ok(cached);
        }

        let Some(source) = &self.source else {
            return Ok(None);
        };
        let fetched = source.attribute_metadata(entity_name, attribute_name)?;
        if let Some(attribute) = &fetched {
            tracing::debug!(entity = %entity_name, attribute = %attribute_name, "cached attribute metadata");
            self.attributes
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(key, attribute.clone());
        }
        Ok(fetched)
    }

    fn entity_metadata(
        &self,
        filters: EntityFilters,
        entity_name: &str,
    ) -> Result<Option<EntityMetadata>> {
        let cached = self
            .entities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&entity_name.to_lowercase())
            .filter(|entry| entry.satisfies(filters))
            .map(|entry| entry.metadata.clone());
        self.record(cached.is_some());
        if cached.is_some() {
            return Ok(cached);
        }

        let Some(source) = &self.source else {
            return Ok(None);
        };
        let fetched = source.entity_metadata(filters, entity_name)?;
        if let Some(metadata) = &fetched {
            tracing::debug!(entity = %entity_name, ?filters, "cached entity metadata");
            self.store_entity(filters, metadata.clone());
        }
        Ok(fetched)
    }
}
