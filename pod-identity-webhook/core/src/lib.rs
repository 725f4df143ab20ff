#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod config;
mod entry;
pub mod notifier;
pub mod role_arn;

pub use self::{
    config::{
        CacheConfig, ComposeRoleArn, DEFAULT_ANNOTATION_PREFIX, DEFAULT_AUDIENCE,
        DEFAULT_TOKEN_EXPIRATION, MIN_TOKEN_EXPIRATION,
    },
    entry::{CacheKey, Entry, Request, Response},
    notifier::{Notifier, Signal},
};
