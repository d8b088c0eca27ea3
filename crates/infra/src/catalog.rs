//! Immutable catalog snapshot.
//!
//! The engine publishes a fresh `Arc<Catalog>` after every committed mutation;
//! readers clone the `Arc` and query it without touching the mutation lock,
//! so they always see a whole committed state.

use std::collections::{BTreeMap, HashMap};

use stockpile_core::{InventoryError, InventoryResult, ItemId};
use stockpile_inventory::Item;
use stockpile_inventory::item::name_key;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    items: BTreeMap<ItemId, Item>,
    /// Case-insensitive name -> owning item.
    names: HashMap<String, ItemId>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from stored items, rejecting stored data that breaks
    /// a field rule or id/name uniqueness.
    pub fn from_items(items: Vec<Item>) -> InventoryResult<Self> {
        let mut catalog = Self::new();
        for item in items {
            if let Err(e) = item.validate() {
                return Err(InventoryError::persistence(format!(
                    "stored item {} is invalid: {e}",
                    item.id()
                )));
            }
            if catalog.items.contains_key(&item.id()) {
                return Err(InventoryError::persistence(format!(
                    "stored catalog repeats item id {}",
                    item.id()
                )));
            }
            if catalog.name_owner(item.name()).is_some() {
                return Err(InventoryError::persistence(format!(
                    "stored catalog repeats item name '{}'",
                    item.name()
                )));
            }
            catalog.insert(item);
        }
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: ItemId) -> Option<&Item> {
        self.items.get(&id)
    }

    /// Live item currently holding `name` (case-insensitive).
    pub fn name_owner(&self, name: &str) -> Option<ItemId> {
        self.names.get(&name_key(name)).copied()
    }

    /// Items in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    pub fn to_vec(&self) -> Vec<Item> {
        self.items.values().cloned().collect()
    }

    /// Items whose name contains `fragment`, ignoring case.
    pub fn find_by_name(&self, fragment: &str) -> Vec<Item> {
        let needle = name_key(fragment);
        self.iter()
            .filter(|i| i.name_key().contains(&needle))
            .cloned()
            .collect()
    }

    /// Items in `category`, ignoring case.
    pub fn find_by_category(&self, category: &str) -> Vec<Item> {
        let wanted = category.to_lowercase();
        self.iter()
            .filter(|i| i.category().to_lowercase() == wanted)
            .cloned()
            .collect()
    }

    pub fn low_stock(&self) -> Vec<Item> {
        self.iter().filter(|i| i.is_low_stock()).cloned().collect()
    }

    pub(crate) fn insert(&mut self, item: Item) {
        self.names.insert(item.name_key(), item.id());
        self.items.insert(item.id(), item);
    }

    /// Replace an existing item, re-indexing its name.
    pub(crate) fn replace(&mut self, item: Item) {
        if let Some(previous) = self.items.get(&item.id()) {
            self.names.remove(&previous.name_key());
        }
        self.insert(item);
    }

    pub(crate) fn remove(&mut self, id: ItemId) -> Option<Item> {
        let item = self.items.remove(&id)?;
        self.names.remove(&item.name_key());
        Some(item)
    }
}
