//! HTTP handlers for chat-gateway.

pub mod assets;
pub mod extract;
pub mod health;
pub mod messages;
pub mod notify;
pub mod users;

pub use assets::{index, preflight, sign_up_script};
pub use extract::ValidatedJson;
pub use health::{health_check, metrics_endpoint, readiness_check};
pub use messages::{create_message, get_api};
pub use notify::{send_notification, subscribe};
pub use users::upsert_user;
