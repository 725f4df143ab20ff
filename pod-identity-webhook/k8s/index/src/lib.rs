//! Service Account Identity Cache
//!
//! Maintains the mapping from ServiceAccount to IAM identity used when admitting pods. Two
//! independently-updated sources feed the index:
//!
//! - Each `ServiceAccount` may carry identity annotations (`<prefix>/role-arn`,
//!   `<prefix>/audience`, `<prefix>/sts-regional-endpoints`, `<prefix>/token-expiration`).
//!   Every observed ServiceAccount is recorded, even when it has no role, so that "known but
//!   unconfigured" can be told apart from "not yet observed".
//! - A single well-known `ConfigMap` holds a full JSON snapshot of `namespace/name -> entry`.
//!   Each new snapshot is diffed against the previous one so that dropped keys are removed.
//!
//! Lookups prefer an annotated ServiceAccount over the ConfigMap. A lookup for a ServiceAccount
//! that has not been observed yet may subscribe to its arrival: the returned notifier fires when
//! the ServiceAccount is written, and the first subscription for a key is forwarded on a
//! refresh channel so that it may be fetched eagerly.
//!
//! ```text
//! [ ServiceAccount ] --> [ by-service-account ] --+--> get()
//! [ ConfigMap ]      --> [ by-configmap ]       --+
//!                              |
//!                              +--> release --> [ pending notifiers ] <-- subscribe
//! ```

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod config_map;
mod error;
mod index;
pub mod lookup;
pub mod metrics;
mod notify;
mod service_account;


pub use self::{
    config_map::{ConfigMapRef, CONFIG_DATA_KEY},
    error::IngestError,
    index::{Index, Observed, SharedIndex},
    service_account::Deletion,
};
