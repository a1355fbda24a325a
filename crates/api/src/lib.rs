mod env;
mod global_state;
mod middleware;
mod response;
mod routes;
mod utils;
mod ws;

pub use routes::{
    chapter_routes,
    character_routes,
    effect_routes,
    item_routes,
    journal_routes,
    misc_routes,
    roll_routes,
    session_routes,
    user_routes,
};

pub use env::ApiServerEnv;
pub use global_state::GlobalState;
pub use middleware::{authenticate, ensure_account, ensure_session_gm, seal_token};
pub use response::{AppError, AppSuccess};
pub use utils::setup_tracing;
pub use ws::ws_routes;
