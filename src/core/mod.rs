pub mod config;
pub mod jwt_auth;
mod responses;
pub mod session;
pub mod side_effects;
mod telemetry;

pub use self::config::{AppConfig, FlowSettings};
pub use responses::*;
pub use session::Session;
pub use side_effects::SideEffects;
pub use telemetry::*;
