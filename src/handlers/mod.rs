pub mod auth;
pub mod shipments;

use crate::db::DbPool;
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub shipments: Arc<crate::services::shipments::ShipmentService>,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        let shipments = Arc::new(crate::services::shipments::ShipmentService::new(db_pool));
        Self { shipments }
    }
}
