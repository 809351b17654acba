pub mod editor;
pub mod metrics;

pub use editor::{editor_auth_middleware, programmatic_write_middleware, GPT_TOKEN_HEADER};
pub use metrics::http_metrics_middleware;
