use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{OrderItem, Product, UserProfile};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub name: String,
    pub passcode: String,
}

/// Successful `/login` body. The server also sends a `message` which is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub email: String,
    pub name: String,
}

impl From<LoginResponse> for UserProfile {
    fn from(value: LoginResponse) -> Self {
        Self {
            email: value.email,
            name: value.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceOrderRequest {
    pub email: String,
    pub items: Vec<OrderItem>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_price: Decimal,
}

impl PlaceOrderRequest {
    /// One unit of `product`; the total is the product price.
    pub fn single(email: impl Into<String>, product: &Product) -> Self {
        Self {
            email: email.into(),
            items: vec![OrderItem::single(product)],
            total_price: product.price,
        }
    }
}
