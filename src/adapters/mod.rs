//! External integrations: HTTP/WS route handlers and SMTP

pub mod api_handler;
pub mod chat_routes;
pub mod email;

pub use email::{Email, Mailer};
