//! JSON representations returned by the vCloud API (`application/*+json`).
//!
//! Every field is optional on the wire; `into_*` conversions are where
//! required attributes are enforced and turned into typed records. A
//! document that describes an entity also lists its children, so the
//! conversions hand back both.

use serde::Deserialize;

use crate::error::{CollectError, Level, Result};
use crate::models::{
    AppGroup, EntityRef, Listing, Organization, Status, VirtualDatacenter, VirtualMachine,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    pub href: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub media_type: Option<String>,
}

impl Reference {
    fn into_entity_ref(self, level: Level) -> Result<EntityRef> {
        match self.href {
            Some(href) => Ok(EntityRef {
                name: self.name.unwrap_or_else(|| href.clone()),
                href,
            }),
            None => Err(CollectError::assembly(
                level,
                format!("{}: reference without href", self.name.as_deref().unwrap_or("unnamed")),
            )),
        }
    }
}

fn listing(refs: Vec<Reference>, level: Level) -> Listing {
    refs.into_iter().map(|r| r.into_entity_ref(level)).collect()
}

/// `GET /api/org`
#[derive(Debug, Deserialize)]
pub struct OrgList {
    #[serde(default)]
    pub org: Vec<Reference>,
}

impl OrgList {
    pub fn into_listing(self) -> Listing {
        listing(self.org, Level::Org)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct VdcReferences {
    #[serde(default)]
    pub vdc: Vec<Reference>,
}

/// `GET /api/admin/org/{id}`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminOrg {
    pub id: Option<String>,
    pub name: Option<String>,
    pub full_name: Option<String>,
    pub is_enabled: Option<bool>,
    #[serde(default)]
    pub vdcs: Option<VdcReferences>,
}

impl AdminOrg {
    /// The organization and its VDC references.
    pub fn into_organization(self, href: &str) -> Result<(Organization, Listing)> {
        let name = required(self.name, Level::Org, href, "name")?;
        let org = Organization {
            id: required(self.id, Level::Org, &name, "id")?,
            full_name: self.full_name.unwrap_or_else(|| name.clone()),
            enabled: required(self.is_enabled, Level::Org, &name, "isEnabled")?,
            href: href.to_string(),
            name,
        };
        let vdcs = listing(self.vdcs.unwrap_or_default().vdc, Level::Vdc);
        Ok((org, vdcs))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityWithUsage {
    pub allocated: Option<f64>,
    pub used: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeCapacity {
    pub cpu: Option<CapacityWithUsage>,
    pub memory: Option<CapacityWithUsage>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceEntities {
    #[serde(default)]
    pub resource_entity: Vec<Reference>,
}

/// `GET /api/vdc/{id}`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vdc {
    pub id: Option<String>,
    pub name: Option<String>,
    pub is_enabled: Option<bool>,
    pub allocation_model: Option<String>,
    pub compute_capacity: Option<ComputeCapacity>,
    #[serde(rename = "vCpuInMhz2")]
    pub vcpu_in_mhz2: Option<f64>,
    pub used_network_count: Option<f64>,
    #[serde(default)]
    pub resource_entities: Option<ResourceEntities>,
}

impl Vdc {
    /// The VDC and its vApp references. Templates and media are skipped.
    pub fn into_datacenter(self, href: &str) -> Result<(VirtualDatacenter, Listing)> {
        let name = required(self.name, Level::Vdc, href, "name")?;
        let capacity = required(self.compute_capacity, Level::Vdc, &name, "computeCapacity")?;
        let cpu = required(capacity.cpu, Level::Vdc, &name, "computeCapacity.cpu")?;
        let memory = required(capacity.memory, Level::Vdc, &name, "computeCapacity.memory")?;
        let vdc = VirtualDatacenter {
            id: required(self.id, Level::Vdc, &name, "id")?,
            enabled: required(self.is_enabled, Level::Vdc, &name, "isEnabled")?,
            allocation_model: required(self.allocation_model, Level::Vdc, &name, "allocationModel")?,
            cpu_allocated: quantity(cpu.allocated, Level::Vdc, &name, "computeCapacity.cpu.allocated")?,
            mhz_per_vcpu: quantity(self.vcpu_in_mhz2, Level::Vdc, &name, "vCpuInMhz2")?,
            memory_allocated_mb: quantity(memory.allocated, Level::Vdc, &name, "computeCapacity.memory.allocated")?,
            memory_used: quantity(memory.used, Level::Vdc, &name, "computeCapacity.memory.used")?,
            used_network_count: quantity(self.used_network_count, Level::Vdc, &name, "usedNetworkCount")?,
            href: href.to_string(),
            name,
        };
        let vapps = self
            .resource_entities
            .unwrap_or_default()
            .resource_entity
            .into_iter()
            .filter(|r| r.media_type.as_deref().is_some_and(is_vapp_type))
            .collect();
        Ok((vdc, listing(vapps, Level::AppGroup)))
    }
}

fn is_vapp_type(media_type: &str) -> bool {
    media_type.starts_with("application/vnd.vmware.vcloud.vApp+")
}

/// Only the references are read here; each VM is validated by its own
/// `GET`.
#[derive(Debug, Default, Deserialize)]
pub struct VAppChildren {
    #[serde(default)]
    pub vm: Vec<Reference>,
}

/// `GET /api/vApp/vapp-{id}`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VApp {
    pub id: Option<String>,
    pub name: Option<String>,
    pub deployed: Option<bool>,
    pub status: Option<i64>,
    pub in_maintenance_mode: Option<bool>,
    #[serde(default)]
    pub children: Option<VAppChildren>,
}

impl VApp {
    /// The vApp and its VM references.
    pub fn into_app_group(self, href: &str) -> Result<(AppGroup, Listing)> {
        let name = required(self.name, Level::AppGroup, href, "name")?;
        let app = AppGroup {
            id: required(self.id, Level::AppGroup, &name, "id")?,
            deployed: required(self.deployed, Level::AppGroup, &name, "deployed")?,
            status: status(self.status, Level::AppGroup, &name)?,
            in_maintenance: self.in_maintenance_mode.unwrap_or(false),
            href: href.to_string(),
            name,
        };
        let vms = listing(self.children.unwrap_or_default().vm, Level::Vm);
        Ok((app, vms))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryResourceMb {
    pub configured: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmSpecSection {
    pub os_type: Option<String>,
    pub num_cpus: Option<u32>,
    pub memory_resource_mb: Option<MemoryResourceMb>,
}

/// `GET /api/vApp/vm-{id}`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vm {
    pub id: Option<String>,
    pub name: Option<String>,
    pub deployed: Option<bool>,
    pub status: Option<i64>,
    pub vm_spec_section: Option<VmSpecSection>,
}

impl Vm {
    pub fn into_virtual_machine(self, href: &str) -> Result<VirtualMachine> {
        let name = required(self.name, Level::Vm, href, "name")?;
        let spec = required(self.vm_spec_section, Level::Vm, &name, "vmSpecSection")?;
        let memory = required(spec.memory_resource_mb, Level::Vm, &name, "vmSpecSection.memoryResourceMb")?;
        Ok(VirtualMachine {
            id: required(self.id, Level::Vm, &name, "id")?,
            deployed: required(self.deployed, Level::Vm, &name, "deployed")?,
            status: status(self.status, Level::Vm, &name)?,
            os_type: required(spec.os_type, Level::Vm, &name, "vmSpecSection.osType")?,
            vcpu_count: required(spec.num_cpus, Level::Vm, &name, "vmSpecSection.numCpus")?,
            memory_mb: quantity(memory.configured, Level::Vm, &name, "vmSpecSection.memoryResourceMb.configured")?,
            href: href.to_string(),
            name,
        })
    }
}

fn required<T>(value: Option<T>, level: Level, entity: &str, field: &str) -> Result<T> {
    value.ok_or_else(|| CollectError::assembly(level, format!("{entity}: missing {field}")))
}

fn quantity(value: Option<f64>, level: Level, entity: &str, field: &str) -> Result<f64> {
    let value = required(value, level, entity, field)?;
    if value < 0.0 || !value.is_finite() {
        return Err(CollectError::assembly(level, format!("{entity}: {field} is {value}")));
    }
    Ok(value)
}

fn status(code: Option<i64>, level: Level, entity: &str) -> Result<Status> {
    let code = required(code, level, entity, "status")?;
    Status::from_code(code)
        .ok_or_else(|| CollectError::assembly(level, format!("{entity}: unknown status code {code}")))
}
