// Infrastructure module - HTTP interceptor chain and background services
pub mod heartbeat;
pub mod http;
pub mod navigator;
pub mod task_manager;
pub mod timer;

pub use heartbeat::HeartbeatManager;
pub use http::{ApiClient, ApiRequest, realtime_endpoint};
pub use navigator::{Navigator, WatchNavigator};
pub use task_manager::TaskManager;
pub use timer::Timer;
