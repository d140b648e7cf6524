//! Maps visited inventory records to metric samples.
//!
//! Every family has a fixed label schema. Label values come from a node and
//! its ancestor chain; a family only ever emits for nodes of its own level.
//! Assembly cannot fail: records are validated when they are decoded, and
//! each lineage carries every label its level's families use.

use crate::error::Level;
use crate::models::{AppGroup, Organization, VirtualDatacenter, VirtualMachine};

#[derive(Debug, PartialEq, Eq)]
pub struct MetricFamily {
    pub name: &'static str,
    pub help: &'static str,
    pub level: Level,
    pub labels: &'static [&'static str],
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub family: &'static MetricFamily,
    /// In the family's label order.
    pub labels: Vec<(&'static str, String)>,
    pub value: f64,
}

impl MetricSample {
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }
}

const ORG_LABELS: &[&str] = &["org_name", "org_full_name", "org_id"];

const VDC_LABELS: &[&str] = &[
    "vdc_id",
    "vdc_name",
    "org_id",
    "org_name",
    "vdc_is_enabled",
    "allocation_model",
];

const VAPP_STATUS_LABELS: &[&str] = &[
    "vapp_id",
    "vapp_name",
    "vapp_deployed",
    "vapp_status",
    "vdc_id",
    "vdc_name",
    "org_id",
    "org_name",
    "vdc_is_enabled",
];

const VAPP_MAINTENANCE_LABELS: &[&str] = &[
    "vapp_id",
    "vapp_name",
    "vapp_deployed",
    "vdc_id",
    "vdc_name",
    "org_id",
    "org_name",
    "vdc_is_enabled",
];

const VM_LABELS: &[&str] = &[
    "vm_id",
    "vm_name",
    "vm_deployed",
    "vm_status",
    "vm_os_type",
    "vapp_id",
    "vapp_name",
    "vapp_deployed",
    "vdc_id",
    "vdc_name",
    "org_id",
    "org_name",
    "vdc_is_enabled",
];

pub static ORG_IS_ENABLED: MetricFamily = MetricFamily {
    name: "vcd_org_is_enabled",
    help: r#"{"Description": "Enabled status of Organization", "Enabled": 1, "Disabled": 0}"#,
    level: Level::Org,
    labels: ORG_LABELS,
};

pub static VDC_CPU_ALLOCATED: MetricFamily = MetricFamily {
    name: "vcd_vdc_cpu_allocated",
    help: "CPU allocated to vdc",
    level: Level::Vdc,
    labels: VDC_LABELS,
};

pub static VDC_MHZ_TO_VCPU: MetricFamily = MetricFamily {
    name: "vcd_vdc_mhz_to_vcpu",
    help: "Mhz to vCPU ratio of vdc",
    level: Level::Vdc,
    labels: VDC_LABELS,
};

pub static VDC_MEMORY_ALLOCATED: MetricFamily = MetricFamily {
    name: "vcd_vdc_memory_allocated",
    help: "Memory allocated to vdc",
    level: Level::Vdc,
    labels: VDC_LABELS,
};

pub static VDC_MEMORY_USED: MetricFamily = MetricFamily {
    name: "vcd_vdc_memory_used_bytes",
    help: "Memory used by vdc in bytes",
    level: Level::Vdc,
    labels: VDC_LABELS,
};

pub static VDC_USED_NETWORK_COUNT: MetricFamily = MetricFamily {
    name: "vcd_vdc_used_network_count",
    help: "Number of networks used by vdc",
    level: Level::Vdc,
    labels: VDC_LABELS,
};

pub static VAPP_STATUS: MetricFamily = MetricFamily {
    name: "vcd_vdc_vapp_status",
    help: "Status of vApp",
    level: Level::AppGroup,
    labels: VAPP_STATUS_LABELS,
};

pub static VAPP_IN_MAINTENANCE: MetricFamily = MetricFamily {
    name: "vcd_vdc_vapp_in_maintenance",
    help: "Status of maintenance mode of given vApp",
    level: Level::AppGroup,
    labels: VAPP_MAINTENANCE_LABELS,
};

pub static VM_STATUS: MetricFamily = MetricFamily {
    name: "vcd_vdc_vapp_vm_status",
    help: "Status of VM",
    level: Level::Vm,
    labels: VM_LABELS,
};

pub static VM_VCPU: MetricFamily = MetricFamily {
    name: "vcd_vdc_vapp_vm_vcpu",
    help: "vCPU count of vm in given vApp of vdc",
    level: Level::Vm,
    labels: VM_LABELS,
};

pub static VM_ALLOCATED_MEMORY: MetricFamily = MetricFamily {
    name: "vcd_vdc_vapp_vm_allocated_memory_mb",
    help: "Memory allocated to VM of given vApp of vdc",
    level: Level::Vm,
    labels: VM_LABELS,
};

/// All families, in exposition order.
pub static FAMILIES: [&MetricFamily; 11] = [
    &ORG_IS_ENABLED,
    &VDC_CPU_ALLOCATED,
    &VDC_MHZ_TO_VCPU,
    &VDC_MEMORY_ALLOCATED,
    &VDC_MEMORY_USED,
    &VDC_USED_NETWORK_COUNT,
    &VAPP_STATUS,
    &VAPP_IN_MAINTENANCE,
    &VM_STATUS,
    &VM_VCPU,
    &VM_ALLOCATED_MEMORY,
];

/// Label values known for a node: its own attributes plus its ancestors'.
type Lineage = Vec<(&'static str, String)>;

fn flag(value: bool) -> String {
    value.to_string()
}

fn org_lineage(org: &Organization) -> Lineage {
    vec![
        ("org_id", org.id.clone()),
        ("org_name", org.name.clone()),
        ("org_full_name", org.full_name.clone()),
    ]
}

fn vdc_lineage(org: &Organization, vdc: &VirtualDatacenter) -> Lineage {
    let mut lineage = org_lineage(org);
    lineage.extend([
        ("vdc_id", vdc.id.clone()),
        ("vdc_name", vdc.name.clone()),
        ("vdc_is_enabled", flag(vdc.enabled)),
        ("allocation_model", vdc.allocation_model.clone()),
    ]);
    lineage
}

fn app_lineage(org: &Organization, vdc: &VirtualDatacenter, app: &AppGroup) -> Lineage {
    let mut lineage = vdc_lineage(org, vdc);
    lineage.extend([
        ("vapp_id", app.id.clone()),
        ("vapp_name", app.name.clone()),
        ("vapp_deployed", flag(app.deployed)),
        ("vapp_status", app.status.code().to_string()),
    ]);
    lineage
}

fn sample(family: &'static MetricFamily, lineage: &Lineage, value: f64) -> MetricSample {
    let labels = family
        .labels
        .iter()
        .map(|key| {
            let value = lineage
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
                .unwrap_or_default();
            (*key, value)
        })
        .collect();
    MetricSample {
        family,
        labels,
        value,
    }
}

pub fn org_samples(org: &Organization) -> Vec<MetricSample> {
    let lineage = org_lineage(org);
    vec![sample(&ORG_IS_ENABLED, &lineage, bool_gauge(org.enabled))]
}

pub fn vdc_samples(org: &Organization, vdc: &VirtualDatacenter) -> Vec<MetricSample> {
    let lineage = vdc_lineage(org, vdc);
    vec![
        sample(&VDC_CPU_ALLOCATED, &lineage, vdc.cpu_allocated),
        sample(&VDC_MHZ_TO_VCPU, &lineage, vdc.mhz_per_vcpu),
        sample(&VDC_MEMORY_ALLOCATED, &lineage, vdc.memory_allocated_mb),
        sample(&VDC_MEMORY_USED, &lineage, vdc.memory_used),
        sample(&VDC_USED_NETWORK_COUNT, &lineage, vdc.used_network_count),
    ]
}

pub fn app_group_samples(
    org: &Organization,
    vdc: &VirtualDatacenter,
    app: &AppGroup,
) -> Vec<MetricSample> {
    let lineage = app_lineage(org, vdc, app);
    vec![
        sample(&VAPP_STATUS, &lineage, f64::from(app.status.code())),
        sample(&VAPP_IN_MAINTENANCE, &lineage, bool_gauge(app.in_maintenance)),
    ]
}

pub fn vm_samples(
    org: &Organization,
    vdc: &VirtualDatacenter,
    app: &AppGroup,
    vm: &VirtualMachine,
) -> Vec<MetricSample> {
    let mut lineage = app_lineage(org, vdc, app);
    lineage.extend([
        ("vm_id", vm.id.clone()),
        ("vm_name", vm.name.clone()),
        ("vm_deployed", flag(vm.deployed)),
        ("vm_status", vm.status.code().to_string()),
        ("vm_os_type", vm.os_type.clone()),
    ]);
    vec![
        sample(&VM_STATUS, &lineage, f64::from(vm.status.code())),
        sample(&VM_VCPU, &lineage, f64::from(vm.vcpu_count)),
        sample(&VM_ALLOCATED_MEMORY, &lineage, vm.memory_mb),
    ]
}

fn bool_gauge(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}
