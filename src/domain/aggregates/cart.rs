//! Cart Aggregate

use rust_decimal::Decimal;
use uuid::Uuid;
use crate::domain::value_objects::Money;

#[derive(Clone, Debug)]
pub struct Cart {
    items: Vec<CartItem>,
    subtotal: Money,
    currency: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CartItem {
    pub product_id: Uuid,
    pub name: String,
    pub sku: String,
    pub quantity: u32,
    pub unit_price: Money,
}

impl CartItem {
    pub fn line_total(&self) -> Money { self.unit_price.multiply(self.quantity) }
}

impl Cart {
    pub fn new(currency: &str) -> Self {
        Self { items: vec![], subtotal: Money::zero(currency), currency: currency.to_uppercase() }
    }

    pub fn items(&self) -> &[CartItem] { &self.items }
    pub fn subtotal_amount(&self) -> Decimal { self.subtotal.amount() }
    pub fn item_count(&self) -> usize { self.items.len() }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    /// Adds a line, merging with an existing line for the same product.
    pub fn add_item(&mut self, item: CartItem) -> Result<(), CartError> {
        if item.unit_price.currency() != self.currency { return Err(CartError::CurrencyMismatch); }
        if item.quantity == 0 { return Ok(()); }
        if let Some(existing) = self.items.iter_mut().find(|i| i.product_id == item.product_id) {
            existing.quantity = existing.quantity.saturating_add(item.quantity);
        } else {
            self.items.push(item);
        }
        self.recalculate();
        Ok(())
    }

    fn recalculate(&mut self) {
        self.subtotal = self.items.iter().fold(Money::zero(&self.currency), |acc, i| acc.add(&i.line_total()).unwrap_or(acc));
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CartError {
    #[error("Item priced in a different currency")]
    CurrencyMismatch,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widget(id: Uuid, quantity: u32) -> CartItem {
        CartItem { product_id: id, name: "Widget".into(), sku: "W1".into(), quantity, unit_price: Money::new(Decimal::new(1050, 2), "INR") }
    }

    #[test]
    fn test_cart_operations() {
        let id = Uuid::now_v7();
        let mut cart = Cart::new("INR");
        cart.add_item(widget(id, 2)).unwrap();
        assert_eq!(cart.item_count(), 1);
        assert_eq!(cart.subtotal_amount(), Decimal::new(2100, 2));
        cart.add_item(widget(id, 1)).unwrap();
        assert_eq!(cart.items()[0].quantity, 3); // Merged
        assert!(!cart.is_empty());
        assert!(Cart::new("INR").is_empty());
        assert_eq!(Cart::new("INR").subtotal_amount(), Decimal::ZERO);
    }

    #[test]
    fn test_currency_mismatch() {
        let mut cart = Cart::new("USD");
        assert_eq!(cart.add_item(widget(Uuid::now_v7(), 1)), Err(CartError::CurrencyMismatch));
        assert!(cart.is_empty());
    }
}
