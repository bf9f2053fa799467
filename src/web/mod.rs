pub mod admin;
pub mod auth;
pub mod flash;
pub mod landing;
pub mod register;
pub mod router;
pub mod state;
pub mod storage;
pub mod templates;
pub mod uploads;

pub use auth::{CurrentUser, Role};
pub use flash::{FlashQuery, compose_flash_message};
pub use state::AppState;
pub use templates::{
    PageLayout, escape_html, render_login_page, render_page, render_register_page,
    render_status_tag,
};
