//! Price snapshot payload returned by the backend price endpoint.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One point-in-time set of prices, in toman, keyed by item within each category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub gold: BTreeMap<String, u64>,
    pub coins: BTreeMap<String, u64>,
    pub currency: BTreeMap<String, u64>,
    pub last_update: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Gold,
    Coins,
    Currency,
}

pub const ALL_CATEGORIES: [Category; 3] = [Category::Gold, Category::Coins, Category::Currency];

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Gold => "gold",
            Category::Coins => "coins",
            Category::Currency => "currency",
        }
    }
}

pub fn parse_category(raw: &str) -> Option<Category> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "gold" => Some(Category::Gold),
        "coins" | "coin" => Some(Category::Coins),
        "currency" => Some(Category::Currency),
        _ => None,
    }
}

impl PriceSnapshot {
    pub fn prices(&self, category: Category) -> &BTreeMap<String, u64> {
        match category {
            Category::Gold => &self.gold,
            Category::Coins => &self.coins,
            Category::Currency => &self.currency,
        }
    }

    pub fn item_count(&self) -> usize {
        ALL_CATEGORIES
            .iter()
            .map(|category| self.prices(*category).len())
            .sum()
    }
}
