pub mod backend;
pub mod log;
pub mod smtp;

pub use backend::{DeliveryChannel, OutboundMessage};
pub use log::LogChannel;
pub use smtp::SmtpChannel;
