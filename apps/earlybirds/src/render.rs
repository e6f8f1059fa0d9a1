//! Plain-text rendering of a controller snapshot.

use std::fmt::Write as _;

use client_core::{ViewSnapshot, ViewState};
use shared::domain::Order;

const EMPTY_HISTORY: &str = "No orders yet. Time for coffee?";

pub fn header(snapshot: &ViewSnapshot) -> String {
    match &snapshot.session {
        Some(profile) => format!(
            "EarlyBirds | history | [{}] {} | logout",
            profile.badge().unwrap_or_default(),
            profile.name
        ),
        None if snapshot.view == ViewState::Signup => "EarlyBirds | Sign In (toggle)".to_string(),
        None => "EarlyBirds | Join Now (toggle)".to_string(),
    }
}

pub fn view(snapshot: &ViewSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", header(snapshot));
    let _ = writeln!(out);

    match snapshot.view {
        ViewState::Login => {
            let _ = writeln!(out, "Welcome Back");
            push_error(&mut out, snapshot);
            let _ = writeln!(out, "Use `login` to sign in.");
        }
        ViewState::Signup => {
            let _ = writeln!(out, "Create Profile");
            push_error(&mut out, snapshot);
            let _ = writeln!(out, "Use `signup` to create a profile.");
        }
        ViewState::Menu => {
            for product in &snapshot.menu {
                let _ = writeln!(
                    out,
                    "{:<14} {:<32} {:>7}",
                    product.id,
                    product.name,
                    product.display_price()
                );
                let _ = writeln!(out, "{:<14} {}", "", product.description);
            }
        }
        ViewState::History => {
            let _ = writeln!(out, "Your Order History");
            if snapshot.orders.is_empty() {
                let _ = writeln!(out, "{EMPTY_HISTORY}");
            }
            for order in &snapshot.orders {
                push_order(&mut out, order);
            }
        }
    }

    out
}

fn push_error(out: &mut String, snapshot: &ViewSnapshot) {
    if let Some(error) = &snapshot.error {
        let _ = writeln!(out, "! {error}");
    }
}

fn push_order(out: &mut String, order: &Order) {
    let placed = order
        .placed_at()
        .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|_| order.timestamp.clone());
    let _ = writeln!(out, "{placed}  {}", order.display_total());
    for item in &order.items {
        let _ = writeln!(out, "  - {} x {}", item.name, item.quantity);
    }
}
