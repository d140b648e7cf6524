use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use reqwest::header::{HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::config::TargetConfig;
use crate::error::{CollectError, Level, Result};
use crate::inventory::{Connector, Session};
use crate::models::{AppGroup, EntityRef, Listing, Organization, VirtualDatacenter, VirtualMachine};
use crate::vcd::wire;

pub const API_VERSION: &str = "31.0";

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const LEGACY_TOKEN_HEADER: &str = "x-vcloud-authorization";
const ACCESS_TOKEN_HEADER: &str = "x-vmware-vcloud-access-token";

/// Opens sessions against the vCloud REST API.
#[derive(Debug, Clone)]
pub struct VcdConnector {
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl Default for VcdConnector {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl VcdConnector {
    /// `connect_timeout` bounds the TCP/TLS handshake, `request_timeout`
    /// each single API call.
    pub fn new(connect_timeout: Duration, request_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            request_timeout,
        }
    }
}

impl Connector for VcdConnector {
    type Session = VcdSession;

    #[instrument(skip_all, fields(section = %target.section, host = %target.host))]
    async fn connect(&self, target: &TargetConfig) -> Result<VcdSession> {
        let base = base_url(&target.host);
        let client = Client::builder()
            .danger_accept_invalid_certs(target.ignore_ssl)
            .connect_timeout(self.connect_timeout)
            .timeout(self.request_timeout)
            .build()
            .map_err(|e| CollectError::connectivity(&target.host, e))?;

        let response = client
            .post(format!("{base}/api/sessions"))
            .basic_auth(format!("{}@{}", target.user, target.org), Some(&target.password))
            .header(ACCEPT, accept_header())
            .send()
            .await
            .map_err(|e| CollectError::connectivity(&target.host, describe(&e)))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(CollectError::Auth {
                user: target.user.clone(),
                org: target.org.clone(),
                host: target.host.clone(),
            });
        }
        if !status.is_success() {
            return Err(CollectError::connectivity(
                &target.host,
                format!("login returned {status}"),
            ));
        }

        let headers = response.headers();
        let auth = if let Some(token) = headers.get(ACCESS_TOKEN_HEADER) {
            let bearer = format!("Bearer {}", token.to_str().unwrap_or_default());
            SessionAuth::Bearer(header_value(&bearer, &target.host)?)
        } else if let Some(token) = headers.get(LEGACY_TOKEN_HEADER) {
            SessionAuth::Legacy(token.clone())
        } else {
            return Err(CollectError::connectivity(
                &target.host,
                "login succeeded without a session token",
            ));
        };
        debug!("logged in");

        Ok(VcdSession {
            client,
            base,
            auth,
            children: Mutex::new(HashMap::new()),
        })
    }
}

#[derive(Debug, Clone)]
enum SessionAuth {
    Bearer(HeaderValue),
    Legacy(HeaderValue),
}

/// A logged-in vCD session. Dropped at the end of the scrape that opened it.
///
/// The document that describes an org, VDC or vApp also lists its children.
/// `get_*` keeps that listing under the entity's href so the following
/// `list_*` call does not fetch the same document again.
#[derive(Debug)]
pub struct VcdSession {
    client: Client,
    base: String,
    auth: SessionAuth,
    children: Mutex<HashMap<String, Listing>>,
}

impl VcdSession {
    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header(ACCEPT, accept_header());
        match &self.auth {
            SessionAuth::Bearer(value) => request.header(AUTHORIZATION, value.clone()),
            SessionAuth::Legacy(value) => request.header(LEGACY_TOKEN_HEADER, value.clone()),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, href: &str, level: Level) -> Result<T> {
        debug!(%href, %level, "GET");
        let response = self
            .authorized(self.client.get(href))
            .send()
            .await
            .map_err(|e| CollectError::traversal(level, format!("GET {href}: {}", describe(&e))))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CollectError::traversal(level, format!("GET {href} returned {status}")));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| CollectError::traversal(level, format!("GET {href}: undecodable body: {e}")))
    }

    fn remember(&self, href: &str, children: Listing) {
        self.children.lock().insert(href.to_string(), children);
    }

    fn recall(&self, href: &str) -> Option<Listing> {
        self.children.lock().remove(href)
    }
}

impl Session for VcdSession {
    async fn list_orgs(&self) -> Result<Listing> {
        let list: wire::OrgList = self.get_json(&format!("{}/api/org", self.base), Level::Org).await?;
        Ok(list.into_listing())
    }

    async fn get_org(&self, org: &EntityRef) -> Result<Organization> {
        let href = admin_view(&org.href);
        let doc: wire::AdminOrg = self.get_json(&href, Level::Org).await?;
        let (org, vdcs) = doc.into_organization(&href)?;
        self.remember(&org.href, tenant_vdcs(vdcs));
        Ok(org)
    }

    async fn list_vdcs(&self, org: &Organization) -> Result<Listing> {
        if let Some(vdcs) = self.recall(&org.href) {
            return Ok(vdcs);
        }
        let doc: wire::AdminOrg = self.get_json(&org.href, Level::Vdc).await?;
        let (_, vdcs) = doc.into_organization(&org.href)?;
        Ok(tenant_vdcs(vdcs))
    }

    async fn get_vdc(&self, vdc: &EntityRef) -> Result<VirtualDatacenter> {
        let doc: wire::Vdc = self.get_json(&vdc.href, Level::Vdc).await?;
        let (vdc, apps) = doc.into_datacenter(&vdc.href)?;
        self.remember(&vdc.href, apps);
        Ok(vdc)
    }

    async fn list_app_groups(&self, vdc: &VirtualDatacenter) -> Result<Listing> {
        if let Some(apps) = self.recall(&vdc.href) {
            return Ok(apps);
        }
        let doc: wire::Vdc = self.get_json(&vdc.href, Level::AppGroup).await?;
        Ok(doc.into_datacenter(&vdc.href)?.1)
    }

    async fn get_app_group(&self, app: &EntityRef) -> Result<AppGroup> {
        let doc: wire::VApp = self.get_json(&app.href, Level::AppGroup).await?;
        let (app, vms) = doc.into_app_group(&app.href)?;
        self.remember(&app.href, vms);
        Ok(app)
    }

    async fn list_vms(&self, app: &AppGroup) -> Result<Listing> {
        if let Some(vms) = self.recall(&app.href) {
            return Ok(vms);
        }
        let doc: wire::VApp = self.get_json(&app.href, Level::Vm).await?;
        Ok(doc.into_app_group(&app.href)?.1)
    }

    async fn get_vm(&self, vm: &EntityRef) -> Result<VirtualMachine> {
        let doc: wire::Vm = self.get_json(&vm.href, Level::Vm).await?;
        doc.into_virtual_machine(&vm.href)
    }

    async fn logout(&self) -> Result<()> {
        let response = self
            .authorized(self.client.delete(format!("{}/api/session", self.base)))
            .send()
            .await
            .map_err(|e| CollectError::connectivity(&self.base, describe(&e)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(CollectError::connectivity(&self.base, format!("logout returned {status}")));
        }
        Ok(())
    }
}

fn accept_header() -> String {
    format!("application/*+json;version={API_VERSION}")
}

fn header_value(value: &str, host: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| CollectError::connectivity(host, "session token is not a valid header value"))
}

/// `https://` is assumed when the configured host has no scheme.
pub fn base_url(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("https://") || host.starts_with("http://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}

/// Org references from `/api/org` point at the tenant view; enabled state and
/// the VDC list live in the admin view.
fn admin_view(href: &str) -> String {
    if href.contains("/api/admin/") {
        href.to_string()
    } else {
        href.replacen("/api/", "/api/admin/", 1)
    }
}

/// Admin VDC references are turned back into the tenant view, which carries
/// capacity and resource entities.
fn user_view(href: &str) -> String {
    href.replacen("/api/admin/", "/api/", 1)
}

fn tenant_vdcs(mut vdcs: Listing) -> Listing {
    for vdc in &mut vdcs.refs {
        vdc.href = user_view(&vdc.href);
    }
    vdcs
}

fn describe(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("timed out ({err})")
    } else if err.is_connect() {
        format!("connection failed ({err})")
    } else {
        err.to_string()
    }
}
