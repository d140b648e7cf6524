/*!
In-memory vCD inventory behind the `Connector`/`Session` seam.

Each section of the store gets its own tree. Calls can be made to fail or hang
per operation and entity name, and the connector counts logins and logouts so
tests can check the session lifecycle without a vCD endpoint.
*/

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

use vcd_exporter::config::TargetConfig;
use vcd_exporter::error::{CollectError, Level, Result};
use vcd_exporter::inventory::{Connector, Session};
use vcd_exporter::models::{
    AppGroup, EntityRef, Listing, Organization, VirtualDatacenter, VirtualMachine,
};

#[derive(Debug, Clone)]
pub struct FakeAppGroup {
    pub record: AppGroup,
    pub vms: Vec<VirtualMachine>,
}

impl FakeAppGroup {
    pub fn new(record: AppGroup) -> Self {
        Self {
            record,
            vms: Vec::new(),
        }
    }

    pub fn vm(mut self, vm: VirtualMachine) -> Self {
        self.vms.push(vm);
        self
    }
}

#[derive(Debug, Clone)]
pub struct FakeVdc {
    pub record: VirtualDatacenter,
    pub apps: Vec<FakeAppGroup>,
}

impl FakeVdc {
    pub fn new(record: VirtualDatacenter) -> Self {
        Self {
            record,
            apps: Vec::new(),
        }
    }

    pub fn app(mut self, app: FakeAppGroup) -> Self {
        self.apps.push(app);
        self
    }
}

#[derive(Debug, Clone)]
pub struct FakeOrg {
    pub record: Organization,
    pub vdcs: Vec<FakeVdc>,
}

impl FakeOrg {
    pub fn new(record: Organization) -> Self {
        Self {
            record,
            vdcs: Vec::new(),
        }
    }

    pub fn vdc(mut self, vdc: FakeVdc) -> Self {
        self.vdcs.push(vdc);
        self
    }
}

/// The tree one section's session sees.
#[derive(Debug, Clone, Default)]
pub struct FakeInventory {
    pub orgs: Vec<FakeOrg>,
}

impl FakeInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn org(mut self, org: FakeOrg) -> Self {
        self.orgs.push(org);
        self
    }

    fn find_org(&self, href: &str) -> Option<&FakeOrg> {
        self.orgs.iter().find(|o| o.record.href == href)
    }

    fn find_vdc(&self, href: &str) -> Option<&FakeVdc> {
        self.orgs
            .iter()
            .flat_map(|o| &o.vdcs)
            .find(|v| v.record.href == href)
    }

    fn find_app(&self, href: &str) -> Option<&FakeAppGroup> {
        self.orgs
            .iter()
            .flat_map(|o| &o.vdcs)
            .flat_map(|v| &v.apps)
            .find(|a| a.record.href == href)
    }

    fn find_vm(&self, href: &str) -> Option<&VirtualMachine> {
        self.orgs
            .iter()
            .flat_map(|o| &o.vdcs)
            .flat_map(|v| &v.apps)
            .flat_map(|a| &a.vms)
            .find(|vm| vm.href == href)
    }
}

/// Session operations a fault can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    ListOrgs,
    GetOrg,
    ListVdcs,
    GetVdc,
    ListAppGroups,
    GetAppGroup,
    ListVms,
    GetVm,
}

#[derive(Debug, Clone)]
pub enum Fault {
    Fail(CollectError),
    /// Never answers.
    Hang,
}

#[derive(Default)]
struct Shared {
    inventories: Mutex<HashMap<String, FakeInventory>>,
    login_faults: Mutex<HashMap<String, Fault>>,
    faults: Mutex<HashMap<(Op, String), Fault>>,
    rejected: Mutex<HashMap<(Op, String), Vec<CollectError>>>,
    latency: Mutex<Option<Duration>>,
    logins: AtomicUsize,
    logouts: AtomicUsize,
    double_logouts: AtomicUsize,
    calls: AtomicUsize,
    sections_seen: Mutex<Vec<String>>,
}

/// Cloning shares the counters; keep a clone to inspect them after handing
/// the connector to a `Collector`.
#[derive(Clone, Default)]
pub struct FakeConnector {
    shared: Arc<Shared>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_inventory(self, section: &str, inventory: FakeInventory) -> Self {
        self.shared
            .inventories
            .lock()
            .insert(section.to_string(), inventory);
        self
    }

    pub fn fail_login(self, section: &str, fault: Fault) -> Self {
        self.shared
            .login_faults
            .lock()
            .insert(section.to_string(), fault);
        self
    }

    /// `entity` is the name of the argument: the org for `ListVdcs`, the VDC
    /// for `ListAppGroups`, the referenced entity for `Get*`. `ListOrgs` uses "".
    pub fn fault(self, op: Op, entity: &str, fault: Fault) -> Self {
        self.shared
            .faults
            .lock()
            .insert((op, entity.to_string()), fault);
        self
    }

    /// Adds an entry the listing could not reference, after the good ones.
    /// `parent` is named as for `fault`.
    pub fn reject(self, op: Op, parent: &str, err: CollectError) -> Self {
        self.shared
            .rejected
            .lock()
            .entry((op, parent.to_string()))
            .or_default()
            .push(err);
        self
    }

    /// Delay added before every session call.
    pub fn latency(self, latency: Duration) -> Self {
        *self.shared.latency.lock() = Some(latency);
        self
    }

    pub fn logins(&self) -> usize {
        self.shared.logins.load(Ordering::SeqCst)
    }

    pub fn logouts(&self) -> usize {
        self.shared.logouts.load(Ordering::SeqCst)
    }

    pub fn double_logouts(&self) -> usize {
        self.shared.double_logouts.load(Ordering::SeqCst)
    }

    /// Inventory calls made through any session, logout excluded.
    pub fn calls(&self) -> usize {
        self.shared.calls.load(Ordering::SeqCst)
    }

    /// Sections logged into, in order.
    pub fn sections_seen(&self) -> Vec<String> {
        self.shared.sections_seen.lock().clone()
    }

    /// Polls until `expected` logouts happened. Background logouts spawned by
    /// a dropped request need a few scheduler turns.
    pub async fn wait_for_logouts(&self, expected: usize, within: Duration) -> anyhow::Result<()> {
        let deadline = Instant::now() + within;
        while self.logouts() < expected {
            if Instant::now() >= deadline {
                anyhow::bail!("expected {expected} logouts, saw {}", self.logouts());
            }
            sleep(Duration::from_millis(5)).await;
        }
        Ok(())
    }
}

impl Connector for FakeConnector {
    type Session = FakeSession;

    async fn connect(&self, target: &TargetConfig) -> Result<FakeSession> {
        let fault = self.shared.login_faults.lock().get(&target.section).cloned();
        match fault {
            Some(Fault::Fail(err)) => return Err(err),
            Some(Fault::Hang) => std::future::pending::<()>().await,
            None => {}
        }

        let inventory = self
            .shared
            .inventories
            .lock()
            .get(&target.section)
            .cloned()
            .unwrap_or_default();
        self.shared.logins.fetch_add(1, Ordering::SeqCst);
        self.shared.sections_seen.lock().push(target.section.clone());
        debug!(section = %target.section, "fake login");

        Ok(FakeSession {
            section: target.section.clone(),
            inventory,
            shared: Arc::clone(&self.shared),
            logged_out: AtomicBool::new(false),
        })
    }
}

pub struct FakeSession {
    section: String,
    inventory: FakeInventory,
    shared: Arc<Shared>,
    logged_out: AtomicBool,
}

impl FakeSession {
    async fn gate(&self, op: Op, entity: &str) -> Result<()> {
        self.shared.calls.fetch_add(1, Ordering::SeqCst);
        let latency = *self.shared.latency.lock();
        if let Some(latency) = latency {
            sleep(latency).await;
        }
        let fault = self
            .shared
            .faults
            .lock()
            .get(&(op, entity.to_string()))
            .cloned();
        match fault {
            Some(Fault::Fail(err)) => Err(err),
            Some(Fault::Hang) => std::future::pending().await,
            None => Ok(()),
        }
    }

    fn listing(&self, op: Op, parent: &str, refs: Vec<EntityRef>) -> Listing {
        let rejected = self
            .shared
            .rejected
            .lock()
            .get(&(op, parent.to_string()))
            .cloned()
            .unwrap_or_default();
        Listing { refs, rejected }
    }
}

fn missing(level: Level, href: &str) -> CollectError {
    CollectError::traversal(level, format!("no such entity: {href}"))
}

impl Session for FakeSession {
    async fn list_orgs(&self) -> Result<Listing> {
        self.gate(Op::ListOrgs, "").await?;
        let refs = self
            .inventory
            .orgs
            .iter()
            .map(|o| EntityRef::new(&o.record.name, &o.record.href))
            .collect();
        Ok(self.listing(Op::ListOrgs, "", refs))
    }

    async fn get_org(&self, org: &EntityRef) -> Result<Organization> {
        self.gate(Op::GetOrg, &org.name).await?;
        self.inventory
            .find_org(&org.href)
            .map(|o| o.record.clone())
            .ok_or_else(|| missing(Level::Org, &org.href))
    }

    async fn list_vdcs(&self, org: &Organization) -> Result<Listing> {
        self.gate(Op::ListVdcs, &org.name).await?;
        let found = self
            .inventory
            .find_org(&org.href)
            .ok_or_else(|| missing(Level::Vdc, &org.href))?;
        let refs = found
            .vdcs
            .iter()
            .map(|v| EntityRef::new(&v.record.name, &v.record.href))
            .collect();
        Ok(self.listing(Op::ListVdcs, &org.name, refs))
    }

    async fn get_vdc(&self, vdc: &EntityRef) -> Result<VirtualDatacenter> {
        self.gate(Op::GetVdc, &vdc.name).await?;
        self.inventory
            .find_vdc(&vdc.href)
            .map(|v| v.record.clone())
            .ok_or_else(|| missing(Level::Vdc, &vdc.href))
    }

    async fn list_app_groups(&self, vdc: &VirtualDatacenter) -> Result<Listing> {
        self.gate(Op::ListAppGroups, &vdc.name).await?;
        let found = self
            .inventory
            .find_vdc(&vdc.href)
            .ok_or_else(|| missing(Level::AppGroup, &vdc.href))?;
        let refs = found
            .apps
            .iter()
            .map(|a| EntityRef::new(&a.record.name, &a.record.href))
            .collect();
        Ok(self.listing(Op::ListAppGroups, &vdc.name, refs))
    }

    async fn get_app_group(&self, app: &EntityRef) -> Result<AppGroup> {
        self.gate(Op::GetAppGroup, &app.name).await?;
        self.inventory
            .find_app(&app.href)
            .map(|a| a.record.clone())
            .ok_or_else(|| missing(Level::AppGroup, &app.href))
    }

    async fn list_vms(&self, app: &AppGroup) -> Result<Listing> {
        self.gate(Op::ListVms, &app.name).await?;
        let found = self
            .inventory
            .find_app(&app.href)
            .ok_or_else(|| missing(Level::Vm, &app.href))?;
        let refs = found
            .vms
            .iter()
            .map(|vm| EntityRef::new(&vm.name, &vm.href))
            .collect();
        Ok(self.listing(Op::ListVms, &app.name, refs))
    }

    async fn get_vm(&self, vm: &EntityRef) -> Result<VirtualMachine> {
        self.gate(Op::GetVm, &vm.name).await?;
        self.inventory
            .find_vm(&vm.href)
            .cloned()
            .ok_or_else(|| missing(Level::Vm, &vm.href))
    }

    async fn logout(&self) -> Result<()> {
        if self.logged_out.swap(true, Ordering::SeqCst) {
            self.shared.double_logouts.fetch_add(1, Ordering::SeqCst);
        }
        self.shared.logouts.fetch_add(1, Ordering::SeqCst);
        debug!(section = %self.section, "fake logout");
        Ok(())
    }
}
