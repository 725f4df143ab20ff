#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod annotations;

pub use self::annotations::AnnotationKeys;
pub use k8s_openapi::api::{
    self,
    core::v1::{ConfigMap, ServiceAccount},
};
pub use kube::{
    api::{Api, ObjectMeta, ResourceExt},
    runtime::{reflector::ObjectRef, watcher},
    Client, Resource,
};
