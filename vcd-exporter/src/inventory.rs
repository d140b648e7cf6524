/**
 * INVENTORY - Seam between the collection pipeline and the remote API
 *
 * Connector opens one Session per scrape; a Session enumerates and describes
 * the org -> vdc -> vApp -> vm hierarchy. Every call suspends until the remote
 * side answers and returns a typed record or a CollectError tagged with the
 * level it failed at.
 *
 * The production implementation lives in `crate::vcd`. Tests use the fake
 * connector of the `vcd-devkit` crate.
 */

use std::future::Future;

use crate::config::TargetConfig;
use crate::error::Result;
use crate::models::{AppGroup, EntityRef, Listing, Organization, VirtualDatacenter, VirtualMachine};

/// Opens authenticated sessions. Holds no per-request state.
pub trait Connector: Send + Sync + 'static {
    type Session: Session;

    /// Logs in with the target's credentials.
    ///
    /// Fails with `CollectError::Auth` when the credentials are refused and
    /// `CollectError::Connectivity` when the host cannot be reached.
    fn connect(&self, target: &TargetConfig) -> impl Future<Output = Result<Self::Session>> + Send;
}

/// One logged-in session, bound to a single target for a single scrape.
///
/// `list_*` calls fail as a whole only when the listing itself cannot be
/// obtained; a malformed entry lands in `Listing::rejected`.
pub trait Session: Send + Sync + 'static {
    fn list_orgs(&self) -> impl Future<Output = Result<Listing>> + Send;

    fn get_org(&self, org: &EntityRef) -> impl Future<Output = Result<Organization>> + Send;

    fn list_vdcs(&self, org: &Organization) -> impl Future<Output = Result<Listing>> + Send;

    fn get_vdc(&self, vdc: &EntityRef) -> impl Future<Output = Result<VirtualDatacenter>> + Send;

    fn list_app_groups(
        &self,
        vdc: &VirtualDatacenter,
    ) -> impl Future<Output = Result<Listing>> + Send;

    fn get_app_group(&self, app: &EntityRef) -> impl Future<Output = Result<AppGroup>> + Send;

    fn list_vms(&self, app: &AppGroup) -> impl Future<Output = Result<Listing>> + Send;

    fn get_vm(&self, vm: &EntityRef) -> impl Future<Output = Result<VirtualMachine>> + Send;

    /// Ends the session. Called exactly once by `connection::with_connection`.
    fn logout(&self) -> impl Future<Output = Result<()>> + Send;
}
