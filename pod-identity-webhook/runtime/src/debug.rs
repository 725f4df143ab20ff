//! A plain-HTTP endpoint for inspecting the index.
//!
//! - `GET /debug/alpha/cache` renders every indexed ServiceAccount;
//! - `GET /debug/alpha/cache/<namespace>/<name>` resolves a single ServiceAccount, waiting up to
//!   the configured grace period for it to be indexed;
//! - `GET /ready` reports whether the watches have completed their initial list.

use crate::{
    core::{Request, Response as Identity},
    index::{lookup, SharedIndex},
};
use bytes::Bytes;
use http_body_util::Full;
use hyper::{
    header, http::request::Parts, server::conn::http1, service::service_fn, Method,
    Request as HttpRequest, Response, StatusCode,
};
use hyper_util::rt::TokioIo;
use std::{convert::Infallible, net::SocketAddr};
use tokio::{net::TcpListener, sync::watch, time::Duration};
use tracing::{debug, info, instrument, warn};

type Body = Full<Bytes>;

const CACHE_PATH: &str = "/debug/alpha/cache";

#[derive(Clone, Debug)]
pub(crate) struct Server {
    index: SharedIndex,
    ready: watch::Receiver<bool>,
    grace: Duration,
}

/// Serves debug requests until the runtime begins shutting down.
#[instrument(skip_all, fields(port = %addr.port()))]
pub(crate) async fn serve(
    addr: SocketAddr,
    server: Server,
    drain: drain::Watch,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Debug server listening");

    tokio::select! {
        res = accept(listener, server) => res,
        release = drain.signaled() => {
            debug!("Debug server shutting down");
            drop(release);
            Ok(())
        }
    }
}

async fn accept(listener: TcpListener, server: Server) -> anyhow::Result<()> {
    loop {
        let (stream, client) = listener.accept().await?;
        let server = server.clone();
        tokio::spawn(async move {
            let svc = service_fn(move |req| {
                let server = server.clone();
                async move { Ok::<_, Infallible>(server.handle(req).await) }
            });
            if let Err(error) = http1::Builder::new()
                .serve_connection(TokioIo::new(stream), svc)
                .await
            {
                debug!(%error, %client, "Connection failed");
            }
        });
    }
}

// === impl Server ===

impl Server {
    pub(crate) fn new(index: SharedIndex, grace: Duration) -> Self {
        let ready = index.read().synced();
        Self {
            index,
            ready,
            grace,
        }
    }

    async fn handle<B>(&self, req: HttpRequest<B>) -> Response<Body> {
        let (parts, _) = req.into_parts();
        let path = parts.uri.path();
        if path == "/ready" {
            return self.handle_ready(&parts);
        }
        if parts.method != Method::GET {
            return status(StatusCode::METHOD_NOT_ALLOWED);
        }

        if path == CACHE_PATH {
            return self.handle_cache();
        }
        let lookup = path
            .strip_prefix(CACHE_PATH)
            .and_then(|p| p.strip_prefix('/'))
            .and_then(|p| p.split_once('/'))
            .filter(|(ns, name)| !ns.is_empty() && !name.is_empty() && !name.contains('/'));
        match lookup {
            Some((ns, name)) => self.handle_lookup(ns, name).await,
            None => status(StatusCode::NOT_FOUND),
        }
    }

    fn handle_cache(&self) -> Response<Body> {
        let json = match self.index.read().to_json() {
            Ok(json) => json,
            Err(error) => {
                warn!(%error, "Failed to serialize cache");
                return status(StatusCode::INTERNAL_SERVER_ERROR);
            }
        };
        json_response(json)
    }

    async fn handle_lookup(&self, ns: &str, name: &str) -> Response<Body> {
        let Identity {
            role_arn,
            audience,
            use_regional_sts,
            token_expiration,
            found_in_cache,
            ..
        } = lookup::get_with_grace_period(&self.index, Request::new(ns, name), self.grace).await;
        let json = serde_json::json!({
            "RoleARN": role_arn,
            "Audience": audience,
            "UseRegionalSTS": use_regional_sts,
            "TokenExpiration": token_expiration,
            "FoundInCache": found_in_cache,
        });
        json_response(json.to_string())
    }

    fn handle_ready(&self, parts: &Parts) -> Response<Body> {
        match parts.method {
            Method::GET | Method::HEAD => {
                let (status, body) = if *self.ready.borrow() {
                    (StatusCode::OK, "ready\n")
                } else {
                    (StatusCode::INTERNAL_SERVER_ERROR, "not ready\n")
                };
                Response::builder()
                    .status(status)
                    .header(header::CONTENT_TYPE, "text/plain")
                    .body(Body::new(Bytes::from_static(body.as_bytes())))
                    .expect("ready response must be valid")
            }
            _ => status(StatusCode::METHOD_NOT_ALLOWED),
        }
    }
}

fn json_response(json: String) -> Response<Body> {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::new(Bytes::from(json)))
        .expect("json response must be valid")
}

fn status(status: StatusCode) -> Response<Body> {
    Response::builder()
        .status(status)
        .body(Body::default())
        .expect("status response must be valid")
}
