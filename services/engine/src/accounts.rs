//! Account registration
//!
//! New users get the seeded starting balance plus 1 BTC and 10 ETH. Token
//! issuance and password verification live at the HTTP edge; the engine
//! only ever sees ids and password hashes.

use crate::assets;
use crate::store::Store;
use serde_json::json;
use types::prelude::*;

/// Register a new user with seeded balances.
pub async fn register(
    store: &Store,
    name: &str,
    email: &str,
    password_hash: &str,
) -> Result<User, EngineError> {
    let now = types::now_nanos();
    let user = User::new(name, email, password_hash, now);

    // Claim the email up front so two concurrent registrations cannot both
    // commit the same address.
    store.reserve_email(email, user.id)?;

    let mut tx = store.begin();
    tx.insert_user(user.clone());

    for symbol in Symbol::ALL {
        if let Err(err) = assets::credit(&mut tx, user.id, symbol, initial_holding(symbol)).await {
            drop(tx);
            store.release_email(email);
            return Err(err);
        }
    }

    tx.push_audit(AuditEntry::new(
        Some(user.id),
        AuditAction::UserRegistered,
        EntityKind::User,
        user.id.to_string(),
        json!({ "email": user.email, "name": user.name }),
        None,
        now,
    ));
    tx.commit();

    tracing::info!(user_id = %user.id, "user registered");
    Ok(user)
}
