//! Cart line and catalogue input types.

use ququ_core::ProductId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One product in the cart. At most one line exists per product id and its
/// quantity is always at least 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineItem {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "imageUrl")]
    pub image: String,
    pub price: Decimal,
    pub quantity: u32,
}

impl CartLineItem {
    /// Unrounded `price * quantity`, or `None` if it overflows.
    #[must_use]
    pub fn line_total(&self) -> Option<Decimal> {
        self.price.checked_mul(Decimal::from(self.quantity))
    }
}

/// A product as offered by the catalogue, before it is put in the cart.
///
/// The id may be missing in client input; such products are ignored by
/// [`CartStore::add_item`](super::CartStore::add_item).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogProduct {
    #[serde(default)]
    pub id: Option<ProductId>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "imageUrl")]
    pub image: String,
    pub price: Decimal,
}

impl CatalogProduct {
    /// Convenience constructor for a product with an id and price.
    #[must_use]
    pub fn new(id: impl Into<ProductId>, name: impl Into<String>, price: Decimal) -> Self {
        Self {
            id: Some(id.into()),
            name: name.into(),
            description: String::new(),
            image: String::new(),
            price,
        }
    }

    /// The id if present and not blank.
    #[must_use]
    pub fn usable_id(&self) -> Option<&ProductId> {
        self.id.as_ref().filter(|id| !id.is_blank())
    }

    pub(crate) fn to_line(&self, id: ProductId, quantity: u32) -> CartLineItem {
        CartLineItem {
            id,
            name: self.name.clone(),
            description: self.description.clone(),
            image: self.image.clone(),
            price: self.price,
            quantity,
        }
    }
}
