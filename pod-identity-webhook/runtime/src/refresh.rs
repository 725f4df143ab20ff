//! Eagerly fetches ServiceAccounts that lookups are waiting on.
//!
//! The index forwards the first subscription for each unobserved ServiceAccount. The fetched
//! object is applied like any watch update, which releases the waiters.

use crate::{
    core::Request,
    index::SharedIndex,
    k8s::{Api, Client, ServiceAccount},
};
use futures::prelude::*;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, instrument, warn};

/// Bounds the number of in-flight API requests.
const MAX_CONCURRENT_FETCHES: usize = 10;

#[async_trait::async_trait]
pub(crate) trait FetchServiceAccount {
    async fn fetch(&self, namespace: &str, name: &str) -> anyhow::Result<Option<ServiceAccount>>;
}

#[async_trait::async_trait]
impl FetchServiceAccount for Client {
    async fn fetch(&self, namespace: &str, name: &str) -> anyhow::Result<Option<ServiceAccount>> {
        let api = Api::<ServiceAccount>::namespaced(self.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }
}

pub(crate) async fn run<F>(fetch: F, index: SharedIndex, rx: mpsc::Receiver<Request>)
where
    F: FetchServiceAccount + Send + Sync,
{
    ReceiverStream::new(rx)
        .for_each_concurrent(MAX_CONCURRENT_FETCHES, |req| refresh(&fetch, &index, req))
        .await;
    debug!("Refresh queue closed");
}

#[instrument(skip(fetch, index), fields(ns = %req.namespace, name = %req.name))]
async fn refresh<F>(fetch: &F, index: &SharedIndex, req: Request)
where
    F: FetchServiceAccount + Send + Sync,
{
    match fetch.fetch(&req.namespace, &req.name).await {
        Ok(Some(sa)) => {
            debug!("Fetched service account");
            if let Err(error) = index.write().apply_service_account(&sa) {
                warn!(%error, "Failed to index fetched service account");
            }
        }
        Ok(None) => info!("Service account not found"),
        Err(error) => warn!(%error, "Failed to fetch service account"),
    }
}
