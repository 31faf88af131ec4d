pub mod logging;

pub use logging::{init_logging, mask_payout_reference, mask_sensitive, LogConfig, LogFormat};
