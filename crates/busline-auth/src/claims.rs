//! JWT Claims structure

use busline_core::error::AppError;
use busline_core::models::UserRole;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

/// JWT Claims
///
/// `sub` carries the numeric user id as a string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,

    /// User role
    #[serde(default)]
    pub role: UserRole,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    /// Create new claims for a user; the expiry is filled in by `JwtService`
    ///
    /// # Examples
    ///
    /// ```
    /// use busline_auth::Claims;
    /// use busline_core::models::UserRole;
    ///
    /// let claims = Claims::new(42, UserRole::Passenger);
    /// assert_eq!(claims.user_id().unwrap(), 42);
    /// ```
    pub fn new(user_id: i32, role: UserRole) -> Self {
        Self {
            sub: user_id.to_string(),
            role,
            iat: Utc::now().timestamp(),
            exp: 0,
        }
    }

    /// Create new claims with custom expiration duration
    pub fn with_expiration(user_id: i32, role: UserRole, expires_in_secs: i64) -> Self {
        let now = Utc::now();
        let exp = now + Duration::seconds(expires_in_secs);

        Self {
            sub: user_id.to_string(),
            role,
            iat: now.timestamp(),
            exp: exp.timestamp(),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.exp <= Utc::now().timestamp()
    }

    /// Numeric user id from the subject
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidToken` if the subject is not an integer
    pub fn user_id(&self) -> Result<i32, AppError> {
        self.sub
            .parse()
            .map_err(|_| AppError::InvalidToken(format!("Invalid subject: {}", self.sub)))
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_creation() {
        let claims = Claims::new(7, UserRole::Passenger);
        assert_eq!(claims.sub, "7");
        assert_eq!(claims.user_id().unwrap(), 7);
        assert!(claims.iat > 0);
        assert!(!claims.is_admin());
    }

    #[test]
    fn test_non_numeric_subject() {
        let mut claims = Claims::new(1, UserRole::Admin);
        claims.sub = "admin".to_string();
        assert!(matches!(claims.user_id(), Err(AppError::InvalidToken(_))));
    }

    #[test]
    fn test_expired_claims() {
        let claims = Claims::with_expiration(1, UserRole::Passenger, -60);
        assert!(claims.is_expired());

        let claims = Claims::with_expiration(1, UserRole::Passenger, 3600);
        assert!(!claims.is_expired());
    }
}
