use serde::{Deserialize, Serialize};

use storefront_core::DomainError;

/// What was purchased.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Product,
    Book,
}

/// How an item type reaches the purchaser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fulfillment {
    /// Shipped goods. The operator walks the order through the shipping states.
    Physical,
    /// Delivery happens by enabling the solution link.
    Digital,
}

impl ItemType {
    pub fn fulfillment(&self) -> Fulfillment {
        match self {
            ItemType::Product => Fulfillment::Physical,
            ItemType::Book => Fulfillment::Digital,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Product => "product",
            ItemType::Book => "book",
        }
    }
}

impl core::str::FromStr for ItemType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "product" => Ok(ItemType::Product),
            "book" => Ok(ItemType::Book),
            other => Err(DomainError::validation(format!("unknown item type '{other}'"))),
        }
    }
}

/// Order delivery status.
///
/// Physical orders use the full linear track; digital orders only ever sit in
/// `Pending` or `Delivered`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderStatus {
    Pending,
    Packed,
    Shipped,
    OutForDelivery,
    Delivered,
}

impl OrderStatus {
    pub const PHYSICAL_TRACK: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Packed,
        OrderStatus::Shipped,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Packed => "packed",
            OrderStatus::Shipped => "shipped",
            OrderStatus::OutForDelivery => "out-for-delivery",
            OrderStatus::Delivered => "delivered",
        }
    }

    /// Whether the status exists at all for the given fulfillment.
    pub fn applies_to(&self, fulfillment: Fulfillment) -> bool {
        match fulfillment {
            Fulfillment::Physical => true,
            Fulfillment::Digital => matches!(self, OrderStatus::Pending | OrderStatus::Delivered),
        }
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::PHYSICAL_TRACK
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown order status '{s}'")))
    }
}
