use std::sync::Arc;

use crate::db::{DbPool, OrmConn};
use crate::media::MediaStore;
use crate::payments::PaymentGateway;

/// Shared application state. The collaborator clients are constructed once
/// at process start and injected as trait objects so tests can substitute
/// fakes.
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub payments: Arc<dyn PaymentGateway>,
    pub media: Arc<dyn MediaStore>,
}
