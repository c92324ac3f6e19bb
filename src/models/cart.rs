use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MAX_LINE_QUANTITY: u32 = 99;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CartLine {
    pub product_id: Uuid,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
}

impl CartLine {
    pub fn subtotal(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
    pub customer_id: Uuid,
    pub lines: Vec<CartLine>,
    pub total: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    pub fn empty(customer_id: Uuid) -> Self {
        Self {
            customer_id,
            lines: Vec::new(),
            total: Decimal::ZERO,
            updated_at: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn quantity_of(&self, product_id: Uuid) -> u32 {
        self.lines
            .iter()
            .find(|line| line.product_id == product_id)
            .map(|line| line.quantity)
            .unwrap_or(0)
    }

    /// Sets a line's quantity, dropping the line at zero, and refreshes the total.
    pub fn put_line(&mut self, line: CartLine) {
        let existing = self
            .lines
            .iter()
            .position(|current| current.product_id == line.product_id);

        match (existing, line.quantity) {
            (Some(index), 0) => {
                self.lines.remove(index);
            }
            (Some(index), _) => self.lines[index] = line,
            (None, 0) => {}
            (None, _) => self.lines.push(line),
        }

        self.recompute();
    }

    fn recompute(&mut self) {
        self.total = self.lines.iter().map(CartLine::subtotal).sum();
        self.updated_at = Utc::now();
    }
}
