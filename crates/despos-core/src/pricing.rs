//! # Pricing Resolver
//!
//! Picks the unit price of a product from its price levels.
//!
//! ## Policy
//! ```text
//! price_levels: [ {B, 100}, {A, 50}, {C, 75} ]
//!        │
//!        ▼  sort by level_name (byte-wise ascending)
//! [ {A, 50}, {B, 100}, {C, 75} ]
//!        │
//!        ▼  take the first
//! unit price = unit cost = 50
//! ```
//! The product's own `item_cost` is ignored: the register always sells at
//! the base tier, and records that same price as the line cost.

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{ItemPriceLevel, Product};

/// Unit price and unit cost for a new line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedPrice {
    pub cost: Money,
    pub price: Money,
}

/// Selects the price level with the lowest `level_name`.
///
/// Ties on the name keep the first entry in input order.
pub fn base_price_level(levels: &[ItemPriceLevel]) -> Option<&ItemPriceLevel> {
    levels
        .iter()
        .min_by(|a, b| a.price_level.level_name.cmp(&b.price_level.level_name))
}

/// Resolves the unit price for a product.
///
/// ## Errors
/// `CoreError::NoPriceLevel` when the product has no price levels.
///
/// ```rust
/// # use despos_core::pricing::resolve_price;
/// # use despos_core::{ItemPriceLevel, Money, PriceLevel, Product};
/// # fn level(name: &str, cents: i64) -> ItemPriceLevel {
/// #     ItemPriceLevel {
/// #         id: name.into(), item_id: "p".into(), price_level_id: name.into(),
/// #         price_level: PriceLevel { id: name.into(), level_name: name.into(), price: Money::from_cents(cents) },
/// #     }
/// # }
/// # let product = Product {
/// #     id: "p".into(), code: None, barcode: None, item_name: "Soap".into(),
/// #     item_type_id: None, dealer_id: None, item_cost: Money::from_cents(10),
/// #     item_quantity: 5, item_sold: 0, item_image_url: None,
/// #     default_item_quantity: 5, price_levels: vec![level("B", 100), level("A", 50)],
/// # };
/// let resolved = resolve_price(&product).unwrap();
/// assert_eq!(resolved.price, Money::from_cents(50));
/// ```
pub fn resolve_price(product: &Product) -> CoreResult<ResolvedPrice> {
    let level = base_price_level(&product.price_levels).ok_or_else(|| CoreError::NoPriceLevel {
        product_id: product.id.clone(),
    })?;

    let price = level.price_level.price;
    Ok(ResolvedPrice { cost: price, price })
}
