pub mod accounts;
pub mod fanout;
pub mod metrics;
pub mod origin;
pub mod providers;
pub mod store;

pub use fanout::{fan_out, notify_group, FanOutReport, NotificationTemplate};
pub use metrics::{init_metrics, record_gateway_call, record_message_created, render_metrics};
pub use origin::{AllowedOrigin, OriginPolicy};
pub use providers::{
    FcmLegacyProvider, MockPushProvider, ProviderError, ProviderResponse, PushMessage,
    PushProvider, PushTarget,
};
pub use store::{MemoryStore, PostgrestStore, StoreError, Stores};
