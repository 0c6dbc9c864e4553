pub mod auth;
pub mod groups;
pub mod messages;
pub mod middleware;
pub mod profile;

use std::sync::Arc;

use studyhall_db::Database;
use studyhall_engine::MutationGateway;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub gateway: MutationGateway,
    pub jwt_secret: String,
}
