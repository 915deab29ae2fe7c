pub mod connection;
pub mod heartbeat;
pub mod listener;
pub mod metrics_http;
