use crate::SharedIndex;
use prometheus_client::{
    collector::Collector,
    encoding::{DescriptorEncoder, EncodeMetric},
    metrics::{gauge::ConstGauge, MetricType},
    registry::Registry,
};

#[derive(Debug)]
struct Instrumented(SharedIndex);

pub fn register(reg: &mut Registry, index: SharedIndex) {
    reg.register_collector(Box::new(Instrumented(index)));
}

impl Collector for Instrumented {
    fn encode(&self, mut encoder: DescriptorEncoder<'_>) -> Result<(), std::fmt::Error> {
        let this = self.0.read();

        let service_accounts = ConstGauge::new(this.service_accounts_len() as i64);
        let service_accounts_encoder = encoder.encode_descriptor(
            "service_account_index_size",
            "The number of service accounts in index",
            None,
            MetricType::Gauge,
        )?;
        service_accounts.encode(service_accounts_encoder)?;

        let config_maps = ConstGauge::new(this.config_maps_len() as i64);
        let config_maps_encoder = encoder.encode_descriptor(
            "config_map_index_size",
            "The number of configmap entries in index",
            None,
            MetricType::Gauge,
        )?;
        config_maps.encode(config_maps_encoder)?;

        let pending = ConstGauge::new(this.pending_notifications() as i64);
        let pending_encoder = encoder.encode_descriptor(
            "pending_notifications",
            "The number of service accounts being waited on",
            None,
            MetricType::Gauge,
        )?;
        pending.encode(pending_encoder)?;

        Ok(())
    }
}
