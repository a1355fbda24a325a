mod chapters;
mod characters;
mod effects;
mod items;
mod journal;
mod misc;
mod rolls;
mod sessions;
mod user;

pub use chapters::chapter_routes;
pub use characters::character_routes;
pub use effects::effect_routes;
pub use items::item_routes;
pub use journal::journal_routes;
pub use misc::misc_routes;
pub use rolls::roll_routes;
pub use sessions::session_routes;
pub use user::user_routes;
