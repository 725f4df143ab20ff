#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use pod_identity_webhook_core as core;
pub use pod_identity_webhook_k8s_api as k8s;
pub use pod_identity_webhook_k8s_index as index;

mod args;
mod debug;
mod refresh;

pub use self::args::Args;
