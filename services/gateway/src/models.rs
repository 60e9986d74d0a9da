use engine::assets::AssetView;
use engine::balance::BalanceView;
use engine::orders::OrderBookView;
use serde::{Deserialize, Serialize};
use types::ids::Symbol;
use types::numeric::Amount;
use types::order::Order;
use types::user::User;

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MeResponse {
    pub user: User,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileAsset {
    pub symbol: Symbol,
    pub amount: Amount,
    pub locked_amount: Amount,
    pub total_amount: Amount,
}

impl From<(Symbol, AssetView)> for ProfileAsset {
    fn from((symbol, view): (Symbol, AssetView)) -> Self {
        Self {
            symbol,
            amount: view.available,
            locked_amount: view.locked,
            total_amount: view.total,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileResponse {
    pub user: User,
    pub balance: BalanceView,
    pub assets: Vec<ProfileAsset>,
}

// Decimal fields arrive as strings and are parsed through `Amount::parse`,
// so shape violations surface as 422 before the engine is involved.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderRequest {
    pub symbol: String,
    pub side: String,
    pub price: String,
    pub amount: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderResponse {
    pub order: Order,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrdersResponse {
    pub orders: Vec<Order>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrdersQuery {
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderbookQuery {
    pub symbol: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderbookResponse {
    #[serde(flatten)]
    pub book: OrderBookView,
}
