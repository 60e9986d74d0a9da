use crate::auth::SessionStore;
use crate::rate_limit::RateLimiter;
use engine::events::BroadcastPublisher;
use engine::orders::OrderService;
use engine::store::Store;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub orders: OrderService,
    pub publisher: Arc<BroadcastPublisher>,
    pub sessions: Arc<SessionStore>,
    pub rate_limiter: Arc<RateLimiter>,
    pub jwt_secret: Arc<str>,
}

impl AppState {
    pub fn new(jwt_secret: impl Into<Arc<str>>) -> Self {
        let store = Arc::new(Store::new());
        let publisher = Arc::new(BroadcastPublisher::new(1024));
        let orders = OrderService::new(store.clone(), publisher.clone());
        Self {
            store,
            orders,
            publisher,
            sessions: Arc::new(SessionStore::new()),
            rate_limiter: Arc::new(RateLimiter::new()),
            jwt_secret: jwt_secret.into(),
        }
    }
}
