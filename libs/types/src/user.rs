//! User accounts
//!
//! `balance` is the *available* USD balance: funds locked for open buy
//! orders have already been subtracted from it.

use crate::ids::UserId;
use crate::numeric::Amount;
use serde::Serialize;

/// Starting USD balance granted at registration.
pub fn initial_balance() -> Amount {
    Amount::from_units(10_000)
}

/// A registered user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub balance: Amount,
    pub created_at: i64, // Unix nanos
}

impl User {
    /// Create a new user with the seeded starting balance.
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            id: UserId::new(),
            name: name.into(),
            email: email.into(),
            password_hash: password_hash.into(),
            balance: initial_balance(),
            created_at: timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_is_seeded() {
        let user = User::new("alice", "alice@example.com", "hash", 1_708_123_456_789_000_000);
        assert_eq!(user.balance, Amount::from_units(10_000));
        assert_eq!(user.email, "alice@example.com");
    }

    #[test]
    fn test_password_hash_never_serialized() {
        let user = User::new("alice", "alice@example.com", "hash", 1_708_123_456_789_000_000);
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["balance"], "10000.00000000");
    }
}
