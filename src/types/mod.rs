// ABOUTME: Validated domain types shared by config and deployment stages.

mod service_name;

pub use service_name::{ServiceName, ServiceNameError};
