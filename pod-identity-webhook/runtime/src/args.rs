use crate::{
    core::{CacheConfig, ComposeRoleArn, DEFAULT_TOKEN_EXPIRATION},
    debug,
    index::{self, ConfigMapRef, Index},
    k8s::{ConfigMap, ServiceAccount},
    refresh,
};
use anyhow::{bail, Result};
use clap::Parser;
use kube::runtime::watcher;
use prometheus_client::registry::Registry;
use std::net::SocketAddr;
use tokio::{sync::mpsc, time::Duration};
use tracing::{info, info_span, Instrument};

#[derive(Debug, Parser)]
#[clap(
    name = "pod-identity-webhook",
    about = "Caches the IAM identities of Kubernetes service accounts"
)]
pub struct Args {
    #[clap(
        long,
        default_value = "pod_identity_webhook=info,warn",
        env = "POD_IDENTITY_WEBHOOK_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// Prefix of the service account annotations.
    #[clap(long, default_value = "eks.amazonaws.com")]
    annotation_prefix: String,

    #[clap(long, default_value = "sts.amazonaws.com")]
    token_audience: String,

    /// Default token lifetime in seconds. Values below 600 are raised to 600.
    #[clap(long, default_value_t = DEFAULT_TOKEN_EXPIRATION)]
    token_expiration: i64,

    /// Use the regional STS endpoint unless a service account says otherwise.
    #[clap(long)]
    sts_regional_endpoint: bool,

    /// Expands role annotations that are not full ARNs into
    /// `arn:<partition>:iam::<account-id>:role/<name>`.
    #[clap(long)]
    compose_role_arn: bool,

    #[clap(long, default_value = "aws")]
    aws_partition: String,

    #[clap(long)]
    aws_account_id: Option<String>,

    /// Namespace of the identity configmap.
    #[clap(long, default_value = "default", env = "POD_NAMESPACE")]
    namespace: String,

    #[clap(long, default_value = "pod-identity-webhook")]
    config_map_name: String,

    /// Index identities from the configmap in addition to service account annotations.
    #[clap(long)]
    watch_config_map: bool,

    /// How long lookups wait for an unindexed service account. Zero disables waiting.
    #[clap(long, default_value = "0")]
    service_account_lookup_grace_period_ms: u64,

    #[clap(long, default_value = "1000")]
    refresh_queue_size: usize,

    #[clap(long, default_value = "0.0.0.0:9999")]
    debug_addr: SocketAddr,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let config = self.cache_config()?;
        if self.refresh_queue_size == 0 {
            bail!("--refresh-queue-size must be positive");
        }

        let Self {
            admin,
            client,
            log_level,
            log_format,
            namespace,
            config_map_name,
            watch_config_map,
            service_account_lookup_grace_period_ms,
            refresh_queue_size,
            debug_addr,
            ..
        } = self;

        let config_map = watch_config_map.then(|| ConfigMapRef {
            namespace,
            name: config_map_name,
        });

        // Lookups for unindexed service accounts ask the refresh worker to fetch them.
        let (refresh_tx, refresh_rx) = mpsc::channel(refresh_queue_size);
        let index = Index::shared(config, config_map.clone(), Some(refresh_tx));

        let mut prom = <Registry>::default();
        index::metrics::register(
            prom.sub_registry_with_prefix("identity_index"),
            index.clone(),
        );
        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let mut runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .build()
            .await?;

        // Spawn resource watches.

        let service_accounts = runtime.watch_all::<ServiceAccount>(watcher::Config::default());
        tokio::spawn(
            kubert::index::namespaced(index.clone(), service_accounts)
                .instrument(info_span!("serviceaccounts")),
        );

        if let Some(ConfigMapRef { namespace, name }) = config_map {
            let config_maps = runtime.watch_namespaced::<ConfigMap>(
                namespace,
                watcher::Config::default().fields(&format!("metadata.name={name}")),
            );
            tokio::spawn(
                kubert::index::namespaced(index.clone(), config_maps)
                    .instrument(info_span!("configmaps")),
            );
        }

        let mut synced = index.read().synced();
        tokio::spawn(
            async move {
                if synced.wait_for(|synced| *synced).await.is_ok() {
                    info!("Identity cache synced");
                }
            }
            .instrument(info_span!("sync")),
        );

        tokio::spawn(
            refresh::run(runtime.client(), index.clone(), refresh_rx)
                .instrument(info_span!("refresh")),
        );

        let grace = Duration::from_millis(service_account_lookup_grace_period_ms);
        tokio::spawn(debug::serve(
            debug_addr,
            debug::Server::new(index, grace),
            runtime.shutdown_handle(),
        ));

        // Block the main thread on the shutdown signal. Once it fires, wait for the background tasks to
        // complete before exiting.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }

    fn cache_config(&self) -> Result<CacheConfig> {
        let compose_role_arn = if self.compose_role_arn {
            let Some(account_id) = self.aws_account_id.clone() else {
                bail!("--aws-account-id is required when --compose-role-arn is set");
            };
            ComposeRoleArn {
                enabled: true,
                partition: self.aws_partition.clone(),
                account_id,
            }
        } else {
            ComposeRoleArn::default()
        };

        Ok(CacheConfig {
            default_audience: self.token_audience.clone(),
            default_token_expiration: CacheConfig::clamp_token_expiration(self.token_expiration),
            default_regional_sts: self.sts_regional_endpoint,
            annotation_prefix: self.annotation_prefix.clone(),
            compose_role_arn,
        })
    }
}
