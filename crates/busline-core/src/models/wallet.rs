//! Wallet model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Prepaid wallet, one per user
///
/// The balance never goes negative: reservations debit it only after
/// checking `can_afford` under a row lock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub user_id: i32,
    pub balance: Decimal,
}

impl Wallet {
    #[inline]
    pub fn can_afford(&self, price: Decimal) -> bool {
        self.balance >= price
    }
}
