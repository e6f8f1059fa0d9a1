use std::fmt;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::TimestampError;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.pad(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

id_newtype!(ProductId);

/// Identity held by the client after a successful login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub email: String,
    pub name: String,
}

impl UserProfile {
    pub fn new(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: name.into(),
        }
    }

    /// Single upper-cased letter shown in the profile badge.
    pub fn badge(&self) -> Option<String> {
        self.name
            .chars()
            .next()
            .map(|first| first.to_uppercase().collect())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub description: String,
    pub image_url: String,
}

impl Product {
    pub fn display_price(&self) -> String {
        format_price(self.price)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
}

impl OrderItem {
    pub fn single(product: &Product) -> Self {
        Self {
            product_id: product.id.clone(),
            name: product.name.clone(),
            quantity: 1,
            price: product.price,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub timestamp: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_price: Decimal,
    #[serde(default)]
    pub items: Vec<OrderItem>,
}

impl Order {
    /// Interprets the server timestamp. Offset-qualified values are converted
    /// to local time; naive values are taken as already local.
    pub fn placed_at(&self) -> Result<DateTime<Local>, TimestampError> {
        if let Ok(parsed) = DateTime::parse_from_rfc3339(&self.timestamp) {
            return Ok(parsed.with_timezone(&Local));
        }

        self.timestamp
            .parse::<NaiveDateTime>()
            .ok()
            .and_then(|naive| Local.from_local_datetime(&naive).earliest())
            .ok_or_else(|| TimestampError {
                raw: self.timestamp.clone(),
            })
    }

    pub fn display_total(&self) -> String {
        format_price(self.total_price)
    }
}

pub fn format_price(amount: Decimal) -> String {
    format!("${:.2}", amount.round_dp(2))
}
