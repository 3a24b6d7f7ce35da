//! Wallet DTOs

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Wallet balance
#[derive(Debug, Clone, Serialize)]
pub struct WalletResponse {
    pub user_id: i32,
    pub balance: Decimal,
}

/// Admin wallet credit
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ChargeWalletRequest {
    #[validate(custom(function = "validate_positive_amount"))]
    pub amount: Decimal,
}

// validator's range does not apply to Decimal
fn validate_positive_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if *amount <= Decimal::ZERO {
        return Err(ValidationError::new("amount_must_be_positive"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_charge_request_validation() {
        assert!(ChargeWalletRequest { amount: dec!(100000) }.validate().is_ok());
        assert!(ChargeWalletRequest { amount: dec!(0) }.validate().is_err());
        assert!(ChargeWalletRequest { amount: dec!(-1) }.validate().is_err());
    }
}
