//! Depth-first walk of org -> vdc -> vApp -> vm.
//!
//! Only the organization listing is fatal. Any other failure is recorded in
//! the collection and skips the subtree below the failing call; samples
//! already produced for ancestors and siblings are kept. A listing entry that
//! cannot be referenced is recorded on its own and its siblings are still
//! visited. Children are visited in the order the API lists them.

use tracing::warn;

use crate::assembler::{self, MetricSample};
use crate::error::{CollectError, Level, Result};
use crate::inventory::Session;
use crate::models::{AppGroup, EntityRef, Listing, Organization, VirtualDatacenter};

/// Samples and non-fatal errors gathered by one scrape.
#[derive(Debug, Default)]
pub struct Collection {
    pub samples: Vec<MetricSample>,
    pub errors: Vec<CollectError>,
}

impl Collection {
    fn record(&mut self, err: CollectError, entity: &str) {
        warn!(level = err.level().map(|l| l.as_str()), entity, error = %err, "skipping subtree");
        self.errors.push(err);
    }

    /// Records the entries a listing could not turn into references and
    /// returns the ones to visit.
    fn accept(&mut self, listing: Listing, parent: &str) -> Vec<EntityRef> {
        for err in listing.rejected {
            self.record(err, parent);
        }
        listing.refs
    }
}

pub async fn traverse<S: Session>(session: &S, collection: &mut Collection) -> Result<()> {
    let orgs = session.list_orgs().await.map_err(|err| match err {
        CollectError::Traversal { .. } => err,
        other => CollectError::traversal(Level::Org, other),
    })?;

    let orgs = collection.accept(orgs, "");
    for org in &orgs {
        visit_org(session, org, collection).await;
    }
    Ok(())
}

async fn visit_org<S: Session>(session: &S, org_ref: &EntityRef, collection: &mut Collection) {
    let org = match session.get_org(org_ref).await {
        Ok(org) => org,
        Err(err) => return collection.record(err, &org_ref.name),
    };
    collection.samples.extend(assembler::org_samples(&org));

    let vdcs = match session.list_vdcs(&org).await {
        Ok(vdcs) => collection.accept(vdcs, &org.name),
        Err(err) => return collection.record(err, &org.name),
    };
    for vdc in &vdcs {
        visit_vdc(session, &org, vdc, collection).await;
    }
}

async fn visit_vdc<S: Session>(
    session: &S,
    org: &Organization,
    vdc_ref: &EntityRef,
    collection: &mut Collection,
) {
    let vdc = match session.get_vdc(vdc_ref).await {
        Ok(vdc) => vdc,
        Err(err) => return collection.record(err, &vdc_ref.name),
    };
    collection.samples.extend(assembler::vdc_samples(org, &vdc));

    let apps = match session.list_app_groups(&vdc).await {
        Ok(apps) => collection.accept(apps, &vdc.name),
        Err(err) => return collection.record(err, &vdc.name),
    };
    for app in &apps {
        visit_app_group(session, org, &vdc, app, collection).await;
    }
}

async fn visit_app_group<S: Session>(
    session: &S,
    org: &Organization,
    vdc: &VirtualDatacenter,
    app_ref: &EntityRef,
    collection: &mut Collection,
) {
    let app = match session.get_app_group(app_ref).await {
        Ok(app) => app,
        Err(err) => return collection.record(err, &app_ref.name),
    };
    collection.samples.extend(assembler::app_group_samples(org, vdc, &app));

    let vms = match session.list_vms(&app).await {
        Ok(vms) => collection.accept(vms, &app.name),
        Err(err) => return collection.record(err, &app.name),
    };
    for vm in &vms {
        visit_vm(session, org, vdc, &app, vm, collection).await;
    }
}

async fn visit_vm<S: Session>(
    session: &S,
    org: &Organization,
    vdc: &VirtualDatacenter,
    app: &AppGroup,
    vm_ref: &EntityRef,
    collection: &mut Collection,
) {
    match session.get_vm(vm_ref).await {
        Ok(vm) => collection.samples.extend(assembler::vm_samples(org, vdc, app, &vm)),
        Err(err) => collection.record(err, &vm_ref.name),
    }
}
