/*!
Record builders and the reference inventory.

`sample_inventory()` is one org with two VDCs: `vdc-a` is empty, `vdc-b`
holds the vApp `web` with the VMs `web-1` and `web-2`. Collected, it yields
1 org, 10 VDC, 2 vApp and 6 VM samples.
*/

use vcd_exporter::config::TargetConfig;
use vcd_exporter::models::{AppGroup, Organization, Status, VirtualDatacenter, VirtualMachine};

use crate::fake_inventory::{FakeAppGroup, FakeInventory, FakeOrg, FakeVdc};

const BASE: &str = "https://vcd.test/api";

pub fn target(section: &str) -> TargetConfig {
    TargetConfig {
        section: section.to_string(),
        user: format!("{section}-user"),
        org: section.to_string(),
        password: "secret".to_string(),
        host: format!("{section}.vcd.test"),
        ignore_ssl: false,
    }
}

pub fn org(name: &str) -> Organization {
    Organization {
        id: format!("urn:vcloud:org:{name}"),
        name: name.to_string(),
        full_name: format!("{name} corp"),
        enabled: true,
        href: format!("{BASE}/admin/org/{name}"),
    }
}

pub fn vdc(name: &str) -> VirtualDatacenter {
    VirtualDatacenter {
        id: format!("urn:vcloud:vdc:{name}"),
        name: name.to_string(),
        enabled: true,
        allocation_model: "AllocationVApp".to_string(),
        cpu_allocated: 4000.0,
        mhz_per_vcpu: 2000.0,
        memory_allocated_mb: 8192.0,
        memory_used: 2048.0,
        used_network_count: 2.0,
        href: format!("{BASE}/vdc/{name}"),
    }
}

pub fn app_group(name: &str) -> AppGroup {
    AppGroup {
        id: format!("urn:vcloud:vapp:{name}"),
        name: name.to_string(),
        deployed: true,
        status: Status::PoweredOn,
        in_maintenance: false,
        href: format!("{BASE}/vApp/vapp-{name}"),
    }
}

pub fn vm(name: &str) -> VirtualMachine {
    VirtualMachine {
        id: format!("urn:vcloud:vm:{name}"),
        name: name.to_string(),
        deployed: true,
        status: Status::PoweredOn,
        os_type: "ubuntu64Guest".to_string(),
        vcpu_count: 2,
        memory_mb: 4096.0,
        href: format!("{BASE}/vApp/vm-{name}"),
    }
}

pub fn sample_inventory() -> FakeInventory {
    sample_inventory_for("acme")
}

/// Same shape as `sample_inventory()`, under another org name.
pub fn sample_inventory_for(org_name: &str) -> FakeInventory {
    FakeInventory::new().org(
        FakeOrg::new(org(org_name))
            .vdc(FakeVdc::new(vdc("vdc-a")))
            .vdc(
                FakeVdc::new(vdc("vdc-b")).app(
                    FakeAppGroup::new(app_group("web"))
                        .vm(vm("web-1"))
                        .vm(vm("web-2")),
                ),
            ),
    )
}
