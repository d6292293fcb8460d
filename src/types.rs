use serde::{Deserialize, Serialize};

use crate::{Timestamp, ValidationError};

/// Largest page the inventory endpoints return.
pub const MAX_INVENTORY_LIMIT: i64 = 500;

/// Seller account returned by `GET account`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub username: String,
    pub email: String,
    pub verified: bool,
    pub singles_live: bool,
    pub sealed_live: bool,
    pub payouts_enabled: bool,
}

/// Page of the seller's listings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InventoryResponse {
    pub inventory: Vec<InventoryItem>,
    pub pagination: Pagination,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub total: i64,
    pub returned: i64,
    pub offset: i64,
    pub limit: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: String,
    pub product_type: String,
    pub product_id: String,
    pub price_cents: i64,
    pub quantity: i64,
    #[serde(default)]
    pub effective_as_of: Option<Timestamp>,
    pub product: Product,
}

impl InventoryItem {
    /// Listing price in dollars.
    pub fn price_dollars(&self) -> f64 {
        self.price_cents as f64 / 100.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    #[serde(rename = "type")]
    pub product_type: String,
    pub id: String,
    #[serde(default)]
    pub tcgplayer_sku: Option<i64>,
    #[serde(default)]
    pub single: Option<Single>,
    #[serde(default)]
    pub sealed: Option<Sealed>,
}

/// A single card.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Single {
    pub scryfall_id: String,
    pub mtgjson_id: String,
    pub name: String,
    pub set: String,
    pub number: String,
    pub language_id: String,
    pub condition_id: String,
    pub finish_id: String,
}

impl Single {
    /// Human-readable condition, with a `Foil` suffix for foil finishes.
    pub fn condition_name(&self) -> String {
        let condition = match self.condition_id.as_str() {
            "NM" => "Near Mint",
            "LP" => "Lightly Played",
            "MP" => "Moderately Played",
            "HP" => "Heavily Played",
            "DMG" => "Damaged",
            _ => return "Unknown".to_owned(),
        };
        if self.is_foil() {
            format!("{condition} Foil")
        } else {
            condition.to_owned()
        }
    }

    /// `FO` (foil) and `EF` (etched foil) finishes.
    pub fn is_foil(&self) -> bool {
        matches!(self.finish_id.as_str(), "FO" | "EF")
    }
}

/// A sealed product.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sealed {
    pub mtgjson_id: String,
    pub name: String,
    pub set: String,
    pub language_id: String,
}

/// Offset/limit paging for inventory queries.
///
/// `limit == 0` means the server maximum; [`validate`](Self::validate)
/// rewrites it to [`MAX_INVENTORY_LIMIT`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InventoryOptions {
    pub limit: i64,
    pub offset: i64,
}

impl InventoryOptions {
    pub fn new(limit: i64, offset: i64) -> Self {
        Self { limit, offset }
    }

    pub fn validate(&mut self) -> Result<(), ValidationError> {
        if self.limit < 0 {
            return Err(ValidationError::new("limit", "limit must be non-negative"));
        }
        if self.limit > MAX_INVENTORY_LIMIT {
            return Err(ValidationError::new(
                "limit",
                format!("limit must not exceed {MAX_INVENTORY_LIMIT}"),
            ));
        }
        if self.limit == 0 {
            self.limit = MAX_INVENTORY_LIMIT;
        }
        if self.offset < 0 {
            return Err(ValidationError::new("offset", "offset must be non-negative"));
        }
        Ok(())
    }
}
