//! Wallet repository implementation
//!
//! Balance changes made by reservations and refunds happen inside the
//! booking store's transactions. This repository only reads balances and
//! applies administrative top-ups.

use busline_core::{traits::WalletRepository, AppError, AppResult};
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{error, info, instrument};

/// PostgreSQL implementation of WalletRepository
pub struct PgWalletRepository {
    pool: PgPool,
}

impl PgWalletRepository {
    /// Create a new wallet repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WalletRepository for PgWalletRepository {
    #[instrument(skip(self))]
    async fn balance(&self, user_id: i32) -> AppResult<Option<Decimal>> {
        let row: Option<(Decimal,)> = sqlx::query_as("SELECT balance FROM wallets WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error reading wallet of user {}: {}", user_id, e);
                AppError::Database(format!("Failed to read wallet: {}", e))
            })?;

        Ok(row.map(|(balance,)| balance))
    }

    #[instrument(skip(self))]
    async fn top_up(&self, user_id: i32, amount: Decimal) -> AppResult<Decimal> {
        if amount <= Decimal::ZERO {
            return Err(AppError::Validation(
                "Top-up amount must be positive".to_string(),
            ));
        }

        let row: Option<(Decimal,)> = sqlx::query_as(
            r#"
            UPDATE wallets
            SET balance = balance + $2
            WHERE user_id = $1
            RETURNING balance
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error charging wallet of user {}: {}", user_id, e);
            AppError::Database(format!("Failed to charge wallet: {}", e))
        })?;

        let (balance,) =
            row.ok_or_else(|| AppError::NotFound(format!("Wallet for user {} not found", user_id)))?;

        info!("Charged wallet of user {} with {}: balance {}", user_id, amount, balance);
        Ok(balance)
    }
}
