//! Field Catalog: the ordered, cached field list of a record type.

use crate::record::{FieldDescriptor, Mutability, RecordType};
use crate::shape::Shape;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// A catalog entry: slot index, descriptor and declaring type.
#[derive(Debug, Clone)]
pub struct CatalogField {
    pub index: usize,
    pub descriptor: FieldDescriptor,
    pub declared_by: String,
}

impl CatalogField {
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn shape(&self) -> &Shape {
        &self.descriptor.shape
    }
}

#[derive(Debug)]
pub struct FieldCatalog {
    type_name: String,
    fields: IndexMap<String, CatalogField>,
}

impl FieldCatalog {
    /// Own fields first, then each ancestor's. The first declaration of a
    /// name wins and constants are left out.
    fn build(ty: &RecordType) -> Self {
        let mut fields = IndexMap::new();
        for owner in ty.ancestry() {
            for descriptor in owner.declared_fields() {
                if descriptor.mutability == Mutability::Constant
                    || fields.contains_key(&descriptor.name)
                {
                    continue;
                }
                let field = CatalogField {
                    index: fields.len(),
                    descriptor: descriptor.clone(),
                    declared_by: owner.name().to_string(),
                };
                fields.insert(descriptor.name.clone(), field);
            }
        }
        Self {
            type_name: ty.name().to_string(),
            fields,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&CatalogField> {
        self.fields.get(name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.get_index_of(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CatalogField> {
        self.fields.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

fn cache() -> &'static RwLock<HashMap<u64, Arc<FieldCatalog>>> {
    static CACHE: OnceLock<RwLock<HashMap<u64, Arc<FieldCatalog>>>> = OnceLock::new();
    CACHE.get_or_init(|| RwLock::new(HashMap::new()))
}

/// The Field Catalog of `ty`, built on first use and cached for the process.
pub fn fields_of(ty: &RecordType) -> Arc<FieldCatalog> {
    if let Some(catalog) = cache().read().get(&ty.id()) {
        return Arc::clone(catalog);
    }

    // Built outside the lock; a racing builder's catalog is dropped.
    let built = Arc::new(FieldCatalog::build(ty));
    let mut entries = cache().write();
    let catalog = entries.entry(ty.id()).or_insert_with(|| {
        tracing::trace!(record = ty.name(), fields = built.len(), "field catalog cached");
        Arc::clone(&built)
    });
    Arc::clone(catalog)
}
