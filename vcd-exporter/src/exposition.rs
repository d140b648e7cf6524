//! Prometheus text rendering.
//!
//! A scrape gets its own `Registry`; nothing from one scrape leaks into the
//! next or into the process-wide default registry.

use std::collections::HashMap;

use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};

use crate::assembler::{MetricSample, FAMILIES};

pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

pub fn render_samples(samples: &[MetricSample]) -> prometheus::Result<String> {
    let registry = Registry::new();
    let mut gauges: HashMap<&'static str, GaugeVec> = HashMap::with_capacity(FAMILIES.len());
    for family in FAMILIES {
        let gauge = GaugeVec::new(Opts::new(family.name, family.help), family.labels)?;
        registry.register(Box::new(gauge.clone()))?;
        gauges.insert(family.name, gauge);
    }

    for sample in samples {
        let gauge = gauges.get(sample.family.name).ok_or_else(|| {
            prometheus::Error::Msg(format!("unregistered family {}", sample.family.name))
        })?;
        let values: Vec<&str> = sample.labels.iter().map(|(_, v)| v.as_str()).collect();
        gauge.get_metric_with_label_values(&values)?.set(sample.value);
    }

    encode(&registry)
}

/// Renders everything registered in `registry` (process metrics and the
/// exporter's own counters for `/metrics`).
pub fn encode(registry: &Registry) -> prometheus::Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::{org_samples, vdc_samples};
    use crate::models::{Organization, VirtualDatacenter};

    #[test]
    fn test_render_org_and_vdc() {
        let org = Organization {
            id: "urn:vcloud:org:1".into(),
            name: "acme".into(),
            full_name: "Acme \"Corp\"".into(),
            enabled: true,
            href: String::new(),
        };
        let vdc = VirtualDatacenter {
            id: "urn:vcloud:vdc:2".into(),
            name: "acme-vdc".into(),
            enabled: true,
            allocation_model: "AllocationPool".into(),
            cpu_allocated: 1500.0,
            mhz_per_vcpu: 1000.0,
            memory_allocated_mb: 2048.0,
            memory_used: 512.0,
            used_network_count: 1.0,
            href: String::new(),
        };
        let mut samples = org_samples(&org);
        samples.extend(vdc_samples(&org, &vdc));

        let text = render_samples(&samples).unwrap();
        assert!(text.contains("# TYPE vcd_org_is_enabled gauge"));
        assert!(text.contains(
            r#"vcd_org_is_enabled{org_full_name="Acme \"Corp\"",org_id="urn:vcloud:org:1",org_name="acme"} 1"#
        ));
        assert!(text.contains("# HELP vcd_vdc_cpu_allocated CPU allocated to vdc"));
        assert!(text.contains(r#"vdc_name="acme-vdc""#));
        assert!(text.contains(r#"allocation_model="AllocationPool""#));
        assert!(text.contains("} 1500"));
        // no vApp or VM in the input
        assert!(!text.contains("vcd_vdc_vapp_status"));
    }

    #[test]
    fn test_render_nothing() {
        assert_eq!(render_samples(&[]).unwrap(), "");
    }
}
