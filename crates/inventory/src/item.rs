use serde::{Deserialize, Serialize};

use stockpile_core::{InventoryError, InventoryResult, ItemId};

use crate::audit::TransactionKind;

/// A tracked stock-keeping item.
///
/// Values of this type handed out by the engine are immutable snapshots;
/// changes go through the mutation engine, which produces new values via the
/// `with_*` methods below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    id: ItemId,
    name: String,
    category: String,
    price: f64,
    quantity: i64,
    min_stock_level: i64,
}

/// Fields of an item to be created.
#[derive(Debug, Clone, PartialEq)]
pub struct NewItem {
    pub name: String,
    pub category: String,
    pub price: f64,
    pub quantity: i64,
    pub min_stock_level: i64,
}

/// Replacement values for an existing item's descriptive fields.
///
/// Quantity is deliberately absent: it only changes through stock changes.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemUpdate {
    pub name: String,
    pub category: String,
    pub price: f64,
    pub min_stock_level: i64,
}

fn validate_name(name: &str) -> InventoryResult<()> {
    if name.trim().is_empty() {
        return Err(InventoryError::validation("name cannot be empty"));
    }
    Ok(())
}

fn validate_price(price: f64) -> InventoryResult<()> {
    if !price.is_finite() || price <= 0.0 {
        return Err(InventoryError::validation("price must be greater than zero"));
    }
    Ok(())
}

fn validate_min_stock(min_stock_level: i64) -> InventoryResult<()> {
    if min_stock_level < 0 {
        return Err(InventoryError::validation("minimum stock level cannot be negative"));
    }
    Ok(())
}

impl NewItem {
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        price: f64,
        quantity: i64,
        min_stock_level: i64,
    ) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            price,
            quantity,
            min_stock_level,
        }
    }

    pub fn validate(&self) -> InventoryResult<()> {
        validate_name(&self.name)?;
        validate_price(self.price)?;
        if self.quantity < 0 {
            return Err(InventoryError::validation("quantity cannot be negative"));
        }
        validate_min_stock(self.min_stock_level)
    }
}

impl ItemUpdate {
    pub fn new(name: impl Into<String>, category: impl Into<String>, price: f64, min_stock_level: i64) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            price,
            min_stock_level,
        }
    }

    pub fn validate(&self) -> InventoryResult<()> {
        validate_name(&self.name)?;
        validate_price(self.price)?;
        validate_min_stock(self.min_stock_level)
    }
}

impl Item {
    /// Build a new item from validated creation fields.
    pub fn create(id: ItemId, fields: NewItem) -> InventoryResult<Self> {
        fields.validate()?;
        Ok(Self {
            id,
            name: fields.name,
            category: fields.category,
            price: fields.price,
            quantity: fields.quantity,
            min_stock_level: fields.min_stock_level,
        })
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn min_stock_level(&self) -> i64 {
        self.min_stock_level
    }

    /// Re-check every field rule, e.g. for an item read back from storage.
    pub fn validate(&self) -> InventoryResult<()> {
        validate_name(&self.name)?;
        validate_price(self.price)?;
        if self.quantity < 0 {
            return Err(InventoryError::validation("quantity cannot be negative"));
        }
        validate_min_stock(self.min_stock_level)
    }

    /// `quantity <= min_stock_level`.
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.min_stock_level
    }

    /// Case-insensitive name key used for uniqueness checks.
    pub fn name_key(&self) -> String {
        name_key(&self.name)
    }

    /// Copy of this item with the descriptive fields replaced.
    pub fn with_update(&self, update: ItemUpdate) -> InventoryResult<Self> {
        update.validate()?;
        Ok(Self {
            id: self.id,
            name: update.name,
            category: update.category,
            price: update.price,
            quantity: self.quantity,
            min_stock_level: update.min_stock_level,
        })
    }

    /// Compute the quantity after applying `delta` as a `kind` movement.
    ///
    /// A sale may never take more than is on hand, and no movement may leave
    /// the quantity negative.
    pub fn stock_after(&self, delta: i64, kind: TransactionKind) -> InventoryResult<i64> {
        if kind == TransactionKind::Sale {
            let requested = delta.checked_abs().unwrap_or(i64::MAX);
            if requested > self.quantity {
                return Err(InventoryError::InsufficientStock {
                    available: self.quantity,
                    requested,
                });
            }
        }

        let next = self
            .quantity
            .checked_add(delta)
            .ok_or_else(|| InventoryError::validation("quantity change overflows"))?;
        if next < 0 {
            return Err(InventoryError::validation("operation would result in negative stock"));
        }
        Ok(next)
    }

    /// Copy of this item carrying `quantity`.
    pub fn with_quantity(&self, quantity: i64) -> Self {
        Self {
            quantity,
            ..self.clone()
        }
    }
}

/// Normalize a name for case-insensitive comparison.
pub fn name_key(name: &str) -> String {
    name.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widget(quantity: i64, min: i64) -> Item {
        Item::create(ItemId::new(), NewItem::new("Widget", "Parts", 2.5, quantity, min)).unwrap()
    }

    #[test]
    fn create_rejects_non_positive_price() {
        let err = Item::create(ItemId::new(), NewItem::new("A", "B", 0.0, 1, 0)).unwrap_err();
        assert!(matches!(err, InventoryError::Validation(_)));

        let err = Item::create(ItemId::new(), NewItem::new("A", "B", f64::NAN, 1, 0)).unwrap_err();
        assert!(matches!(err, InventoryError::Validation(_)));
    }

    #[test]
    fn create_rejects_negative_quantity_and_threshold() {
        assert!(Item::create(ItemId::new(), NewItem::new("A", "B", 1.0, -1, 0)).is_err());
        assert!(Item::create(ItemId::new(), NewItem::new("A", "B", 1.0, 1, -1)).is_err());
    }

    #[test]
    fn create_rejects_blank_name() {
        let err = Item::create(ItemId::new(), NewItem::new("   ", "B", 1.0, 1, 0)).unwrap_err();
        assert_eq!(err, InventoryError::validation("name cannot be empty"));
    }

    #[test]
    fn validate_rejects_items_that_bypassed_create() {
        let item = widget(3, 1);
        assert!(item.validate().is_ok());

        let negative = Item { quantity: -5, ..item.clone() };
        assert_eq!(negative.validate(), Err(InventoryError::validation("quantity cannot be negative")));

        let free = Item { price: -3.0, ..item.clone() };
        assert!(free.validate().is_err());

        let threshold = Item { min_stock_level: -1, ..item };
        assert!(threshold.validate().is_err());
    }

    #[test]
    fn low_stock_is_inclusive() {
        assert!(widget(5, 5).is_low_stock());
        assert!(widget(4, 5).is_low_stock());
        assert!(!widget(6, 5).is_low_stock());
    }

    #[test]
    fn sale_larger_than_on_hand_is_insufficient() {
        let item = widget(3, 0);
        let err = item.stock_after(-4, TransactionKind::Sale).unwrap_err();
        assert_eq!(err, InventoryError::InsufficientStock { available: 3, requested: 4 });
    }

    #[test]
    fn adjustment_below_zero_is_validation() {
        let item = widget(3, 0);
        let err = item.stock_after(-4, TransactionKind::Adjustment).unwrap_err();
        assert!(matches!(err, InventoryError::Validation(_)));
    }

    #[test]
    fn overflow_is_validation() {
        let item = widget(1, 0);
        let err = item.stock_after(i64::MAX, TransactionKind::Purchase).unwrap_err();
        assert!(matches!(err, InventoryError::Validation(_)));
    }

    #[test]
    fn update_keeps_quantity_and_id() {
        let item = widget(7, 2);
        let updated = item.with_update(ItemUpdate::new("Gadget", "Tools", 9.0, 3)).unwrap();
        assert_eq!(updated.id(), item.id());
        assert_eq!(updated.quantity(), 7);
        assert_eq!(updated.name(), "Gadget");
        assert_eq!(updated.min_stock_level(), 3);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn kind_strategy() -> impl Strategy<Value = TransactionKind> {
            prop_oneof![
                Just(TransactionKind::Purchase),
                Just(TransactionKind::Sale),
                Just(TransactionKind::Adjustment),
                Just(TransactionKind::Return),
            ]
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 500,
                ..ProptestConfig::default()
            })]

            /// Property: any sequence of accepted stock changes keeps quantity >= 0,
            /// and a rejected change leaves the item untouched.
            #[test]
            fn quantity_never_goes_negative(
                start in 0i64..1_000,
                moves in proptest::collection::vec((-500i64..500, kind_strategy()), 0..50)
            ) {
                let mut item = widget(start, 10);
                for (delta, kind) in moves {
                    let before = item.clone();
                    match item.stock_after(delta, kind) {
                        Ok(next) => {
                            prop_assert!(next >= 0);
                            item = item.with_quantity(next);
                        }
                        Err(_) => prop_assert_eq!(&item, &before),
                    }
                    prop_assert!(item.quantity() >= 0);
                }
            }
        }
    }
}
