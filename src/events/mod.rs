pub mod dispatcher;
pub mod types;

pub use dispatcher::{spawn_event_logger, EventDispatcher};
pub use types::{
    EventEnvelope, EventType, OutboundEvent, ReconciliationEvent, SplitEvent, WalletEvent,
    WithdrawalEvent,
};
