pub mod db;
pub mod sms;

pub use db::PgStore;
pub use sms::{HttpSmsSender, LoggingSmsSender};
