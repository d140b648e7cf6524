//! Typed inventory records.
//!
//! Records are validated when they cross the API boundary, so everything
//! here is complete: label composition never has to deal with a missing
//! attribute. `href` is the locator used for follow-up calls and is never
//! exported as a label.

use crate::error::CollectError;

/// Outcome of a listing call. Entries that cannot be turned into a reference
/// are rejected one by one; their siblings stay usable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Listing {
    pub refs: Vec<EntityRef>,
    pub rejected: Vec<CollectError>,
}

impl FromIterator<Result<EntityRef, CollectError>> for Listing {
    fn from_iter<I: IntoIterator<Item = Result<EntityRef, CollectError>>>(iter: I) -> Self {
        let mut listing = Listing::default();
        for entry in iter {
            match entry {
                Ok(r) => listing.refs.push(r),
                Err(e) => listing.rejected.push(e),
            }
        }
        listing
    }
}

/// Reference returned by a listing call, before the entity is described.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRef {
    pub name: String,
    pub href: String,
}

impl EntityRef {
    pub fn new(name: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            href: href.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Organization {
    pub id: String,
    pub name: String,
    pub full_name: String,
    pub enabled: bool,
    pub href: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VirtualDatacenter {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    pub allocation_model: String,
    /// MHz
    pub cpu_allocated: f64,
    pub mhz_per_vcpu: f64,
    pub memory_allocated_mb: f64,
    /// As reported by the API, no unit conversion.
    pub memory_used: f64,
    pub used_network_count: f64,
    pub href: String,
}

/// A vApp.
#[derive(Debug, Clone, PartialEq)]
pub struct AppGroup {
    pub id: String,
    pub name: String,
    pub deployed: bool,
    pub status: Status,
    pub in_maintenance: bool,
    pub href: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VirtualMachine {
    pub id: String,
    pub name: String,
    pub deployed: bool,
    pub status: Status,
    pub os_type: String,
    pub vcpu_count: u32,
    pub memory_mb: f64,
    pub href: String,
}

/// Power/deployment status shared by vApps and VMs, with the vCD codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    FailedCreation,
    Unresolved,
    Resolved,
    Deployed,
    Suspended,
    PoweredOn,
    WaitingForInput,
    Unknown,
    Unrecognized,
    PoweredOff,
    InconsistentState,
    Mixed,
}

impl Status {
    pub const ALL: [Status; 12] = [
        Status::FailedCreation,
        Status::Unresolved,
        Status::Resolved,
        Status::Deployed,
        Status::Suspended,
        Status::PoweredOn,
        Status::WaitingForInput,
        Status::Unknown,
        Status::Unrecognized,
        Status::PoweredOff,
        Status::InconsistentState,
        Status::Mixed,
    ];

    pub fn code(self) -> i32 {
        match self {
            Status::FailedCreation => -1,
            Status::Unresolved => 0,
            Status::Resolved => 1,
            Status::Deployed => 2,
            Status::Suspended => 3,
            Status::PoweredOn => 4,
            Status::WaitingForInput => 5,
            Status::Unknown => 6,
            Status::Unrecognized => 7,
            Status::PoweredOff => 8,
            Status::InconsistentState => 9,
            Status::Mixed => 10,
        }
    }

    pub fn from_code(code: i64) -> Option<Status> {
        Status::ALL.into_iter().find(|s| i64::from(s.code()) == code)
    }
}
