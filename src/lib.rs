pub mod app;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod interface;
pub mod model;
pub mod queue;
pub mod storage;
pub mod telemetry;

#[cfg(test)]
mod test_support;

pub use app::EnrollmentContext;
pub use dispatch::RequestDispatcher;
pub use queue::OfflineQueue;
