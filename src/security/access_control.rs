//! Admin IP allow-list.
//!
//! Enforced only in production and only on admin path prefixes. An empty
//! list admits nobody, and a request with no known peer address is refused.

use std::net::IpAddr;

use crate::config::RunMode;
use crate::error::GatewayError;
use crate::security::context::RequestContext;
use crate::security::pipeline::Stage;

pub struct AdminIpAllowList {
    enforce: bool,
    path_prefixes: Vec<String>,
    allowed: Vec<IpAddr>,
}

impl AdminIpAllowList {
    /// Unparseable entries are skipped with a warning; start-up validation
    /// reports them as errors before the pipeline is built.
    pub fn new(mode: RunMode, path_prefixes: Vec<String>, allowed: &[String]) -> Self {
        let allowed = allowed
            .iter()
            .filter_map(|ip| match ip.trim().parse::<IpAddr>() {
                Ok(addr) => Some(addr),
                Err(_) => {
                    tracing::warn!(entry = %ip, "Ignoring invalid admin allow-list entry");
                    None
                }
            })
            .collect();

        Self {
            enforce: mode.is_production(),
            path_prefixes,
            allowed,
        }
    }

    fn is_admin_path(&self, path: &str) -> bool {
        self.path_prefixes.iter().any(|p| path.starts_with(p.as_str()))
    }

    fn is_allowed(&self, ip: IpAddr) -> bool {
        let ip = match ip {
            IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(ip),
            v4 => v4,
        };
        self.allowed.contains(&ip)
    }
}

impl Stage for AdminIpAllowList {
    fn name(&self) -> &'static str {
        "admin_ip_allow_list"
    }

    fn on_request(&self, ctx: &mut RequestContext) -> Result<(), GatewayError> {
        if !self.enforce || !self.is_admin_path(&ctx.path) {
            return Ok(());
        }

        match ctx.client_ip {
            Some(ip) if self.is_allowed(ip) => Ok(()),
            ip => {
                tracing::warn!(
                    client_ip = %ctx.client_key(),
                    path = %ctx.path,
                    "Blocked admin access attempt"
                );
                Err(GatewayError::IpNotAllowed {
                    ip: ip.map(|ip| ip.to_string()),
                })
            }
        }
    }
}
