pub mod otp;
pub mod otp_store;
pub mod sender;

pub use otp::OtpService;
pub use otp_store::{InMemoryOtpStore, OtpStore, RedisOtpStore};
pub use sender::{LoggingSender, MessageSender, WhatsAppSender};
