//! Lookups that may wait for a ServiceAccount to be indexed.

use crate::SharedIndex;
use pod_identity_webhook_core::{Request, Response};
use tokio::time;
use tracing::{debug, instrument};

/// Looks up a ServiceAccount, waiting up to `grace` for it to be indexed if it has not been
/// observed yet.
///
/// Running out of time is not an error: the initial not-found response is returned. A zero `grace`
/// never waits.
#[instrument(skip(index, req), fields(key = %req.key()))]
pub async fn get_with_grace_period(
    index: &SharedIndex,
    mut req: Request,
    grace: time::Duration,
) -> Response {
    req.request_notification = !grace.is_zero();
    let rsp = index.read().get(&req);

    let notifier = match rsp.notifier.clone() {
        Some(notifier) if !rsp.found_in_cache => notifier,
        _ => return rsp,
    };

    match time::timeout(grace, notifier.fired()).await {
        Ok(true) => {
            debug!("Service account indexed");
            req.request_notification = false;
            let rsp = index.read().get(&req);
            rsp
        }
        Ok(false) => rsp,
        Err(_) => {
            debug!(?grace, "Timed out waiting for service account");
            rsp
        }
    }
}
