//! Endpoint registry
//!
//! Static mapping from logical operation names (`"providers.status"`) to
//! path templates (`"/api/providers/{id}/status"`). Call sites resolve a
//! name once and expand its placeholders; nothing here performs I/O.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Functional group an endpoint belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Auth,
    Dashboard,
    Analytics,
    Providers,
    Requests,
    Messages,
    Finances,
    Settings,
    System,
    Users,
    Roles,
    Notifications,
    Search,
    Export,
    Zones,
}

impl Domain {
    /// Every domain, in catalog order
    pub const ALL: [Domain; 15] = [
        Domain::Auth,
        Domain::Dashboard,
        Domain::Analytics,
        Domain::Providers,
        Domain::Requests,
        Domain::Messages,
        Domain::Finances,
        Domain::Settings,
        Domain::System,
        Domain::Users,
        Domain::Roles,
        Domain::Notifications,
        Domain::Search,
        Domain::Export,
        Domain::Zones,
    ];

    /// Lowercase name used as the prefix of endpoint names
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Auth => "auth",
            Domain::Dashboard => "dashboard",
            Domain::Analytics => "analytics",
            Domain::Providers => "providers",
            Domain::Requests => "requests",
            Domain::Messages => "messages",
            Domain::Finances => "finances",
            Domain::Settings => "settings",
            Domain::System => "system",
            Domain::Users => "users",
            Domain::Roles => "roles",
            Domain::Notifications => "notifications",
            Domain::Search => "search",
            Domain::Export => "export",
            Domain::Zones => "zones",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        Domain::ALL
            .iter()
            .copied()
            .find(|d| d.as_str() == wanted)
            .ok_or_else(|| Error::endpoint(s, "unknown endpoint domain"))
    }
}

/// A logical API operation and the path template it resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    /// Dotted logical name, e.g. `providers.status`
    pub name: &'static str,
    /// Group the endpoint belongs to
    pub domain: Domain,
    /// Path template; `{param}` segments are filled by [`Endpoint::path`]
    pub template: &'static str,
}

const fn ep(name: &'static str, domain: Domain, template: &'static str) -> Endpoint {
    Endpoint {
        name,
        domain,
        template,
    }
}

/// The full endpoint catalog
pub static CATALOG: &[Endpoint] = &[
    // Auth
    ep("auth.login", Domain::Auth, "/api/auth/login"),
    ep("auth.logout", Domain::Auth, "/api/auth/logout"),
    ep("auth.refresh", Domain::Auth, "/api/auth/refresh"),
    ep("auth.me", Domain::Auth, "/api/auth/me"),
    ep("auth.forgot_password", Domain::Auth, "/api/auth/forgot-password"),
    ep("auth.reset_password", Domain::Auth, "/api/auth/reset-password"),
    // Dashboard
    ep("dashboard.stats", Domain::Dashboard, "/api/dashboard/stats"),
    ep("dashboard.activity", Domain::Dashboard, "/api/dashboard/activity"),
    ep("dashboard.charts", Domain::Dashboard, "/api/dashboard/charts"),
    // Analytics
    ep("analytics.overview", Domain::Analytics, "/api/analytics/overview"),
    ep("analytics.revenue", Domain::Analytics, "/api/analytics/revenue"),
    ep("analytics.users", Domain::Analytics, "/api/analytics/users"),
    ep("analytics.providers", Domain::Analytics, "/api/analytics/providers"),
    ep("analytics.requests", Domain::Analytics, "/api/analytics/requests"),
    // Providers
    ep("providers.list", Domain::Providers, "/api/providers"),
    ep("providers.detail", Domain::Providers, "/api/providers/{id}"),
    ep("providers.status", Domain::Providers, "/api/providers/{id}/status"),
    ep("providers.verify", Domain::Providers, "/api/providers/{id}/verify"),
    ep("providers.documents", Domain::Providers, "/api/providers/{id}/documents"),
    ep("providers.reviews", Domain::Providers, "/api/providers/{id}/reviews"),
    // Service requests
    ep("requests.list", Domain::Requests, "/api/requests"),
    ep("requests.detail", Domain::Requests, "/api/requests/{id}"),
    ep("requests.status", Domain::Requests, "/api/requests/{id}/status"),
    ep("requests.assign", Domain::Requests, "/api/requests/{id}/assign"),
    ep("requests.cancel", Domain::Requests, "/api/requests/{id}/cancel"),
    // Messages
    ep("messages.conversations", Domain::Messages, "/api/messages/conversations"),
    ep("messages.thread", Domain::Messages, "/api/messages/conversations/{id}"),
    ep("messages.send", Domain::Messages, "/api/messages/conversations/{id}/send"),
    ep("messages.mark_read", Domain::Messages, "/api/messages/{id}/read"),
    // Finances
    ep("finances.transactions", Domain::Finances, "/api/finances/transactions"),
    ep("finances.transaction", Domain::Finances, "/api/finances/transactions/{id}"),
    ep("finances.payouts", Domain::Finances, "/api/finances/payouts"),
    ep("finances.reports", Domain::Finances, "/api/finances/reports"),
    ep("finances.commissions", Domain::Finances, "/api/finances/commissions"),
    // Settings
    ep("settings.general", Domain::Settings, "/api/settings"),
    ep("settings.section", Domain::Settings, "/api/settings/{section}"),
    // System
    ep("system.health", Domain::System, "/api/health"),
    ep("system.status", Domain::System, "/api/system/status"),
    ep("system.logs", Domain::System, "/api/system/logs"),
    ep("system.backup", Domain::System, "/api/system/backup"),
    // Users
    ep("users.list", Domain::Users, "/api/users"),
    ep("users.detail", Domain::Users, "/api/users/{id}"),
    ep("users.status", Domain::Users, "/api/users/{id}/status"),
    // Roles
    ep("roles.list", Domain::Roles, "/api/roles"),
    ep("roles.detail", Domain::Roles, "/api/roles/{id}"),
    ep("roles.permissions", Domain::Roles, "/api/roles/permissions"),
    // Notifications
    ep("notifications.list", Domain::Notifications, "/api/notifications"),
    ep("notifications.read", Domain::Notifications, "/api/notifications/{id}/read"),
    ep("notifications.read_all", Domain::Notifications, "/api/notifications/read-all"),
    ep("notifications.send", Domain::Notifications, "/api/notifications/send"),
    // Search
    ep("search.global", Domain::Search, "/api/search"),
    // Export
    ep("export.resource", Domain::Export, "/api/export/{resource}"),
    // Zones
    ep("zones.list", Domain::Zones, "/api/zones"),
    ep("zones.detail", Domain::Zones, "/api/zones/{id}"),
    ep("zones.coverage", Domain::Zones, "/api/zones/{id}/coverage"),
];

/// Look up an endpoint by its logical name
pub fn lookup(name: &str) -> Result<&'static Endpoint> {
    CATALOG
        .iter()
        .find(|e| e.name == name)
        .ok_or_else(|| Error::endpoint(name, "not found in endpoint catalog"))
}

/// All endpoints of one domain, in catalog order
pub fn by_domain(domain: Domain) -> impl Iterator<Item = &'static Endpoint> {
    CATALOG.iter().filter(move |e| e.domain == domain)
}

/// One piece of a parsed path template
enum Segment<'a> {
    Literal(&'a str),
    Param(&'a str),
}

/// Split a template into literal text and `{param}` placeholders
fn segments(template: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}').map(|i| open + i) else {
            break;
        };
        if open > 0 {
            out.push(Segment::Literal(&rest[..open]));
        }
        out.push(Segment::Param(&rest[open + 1..close]));
        rest = &rest[close + 1..];
    }

    if !rest.is_empty() {
        out.push(Segment::Literal(rest));
    }
    out
}

impl Endpoint {
    /// Placeholder names in template order
    pub fn params(&self) -> Vec<&'static str> {
        segments(self.template)
            .into_iter()
            .filter_map(|s| match s {
                Segment::Param(p) => Some(p),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    /// Whether the template has placeholders
    pub fn is_parameterized(&self) -> bool {
        self.template.contains('{')
    }

    /// Expand the template with the given values
    ///
    /// Values are percent-encoded as single path segments. Every placeholder
    /// must be supplied; extra values are ignored.
    pub fn path(&self, params: &[(&str, &str)]) -> Result<String> {
        let mut path = String::with_capacity(self.template.len() + 16);

        for segment in segments(self.template) {
            match segment {
                Segment::Literal(text) => path.push_str(text),
                Segment::Param(name) => {
                    let value = params
                        .iter()
                        .find(|(k, _)| *k == name)
                        .map(|(_, v)| *v)
                        .filter(|v| !v.is_empty())
                        .ok_or_else(|| {
                            Error::endpoint(self.name, format!("missing parameter '{}'", name))
                        })?;
                    path.push_str(&urlencoding::encode(value));
                }
            }
        }

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_names_are_unique() {
        let mut seen = HashSet::new();
        for endpoint in CATALOG {
            assert!(seen.insert(endpoint.name), "duplicate endpoint {}", endpoint.name);
        }
    }

    #[test]
    fn test_names_are_prefixed_by_domain() {
        for endpoint in CATALOG {
            let prefix = format!("{}.", endpoint.domain);
            assert!(
                endpoint.name.starts_with(&prefix),
                "{} should start with {}",
                endpoint.name,
                prefix
            );
            assert!(endpoint.template.starts_with("/api/"));
        }
    }

    #[test]
    fn test_every_domain_has_endpoints() {
        for domain in Domain::ALL {
            assert!(by_domain(domain).count() > 0, "no endpoints for {}", domain);
        }
    }

    #[test]
    fn test_lookup_and_expand() {
        let endpoint = lookup("providers.status").unwrap();
        assert_eq!(endpoint.params(), vec!["id"]);
        assert!(endpoint.is_parameterized());
        assert_eq!(
            endpoint.path(&[("id", "42")]).unwrap(),
            "/api/providers/42/status"
        );
    }

    #[test]
    fn test_expand_encodes_values() {
        let endpoint = lookup("export.resource").unwrap();
        assert_eq!(
            endpoint.path(&[("resource", "q3 report/final")]).unwrap(),
            "/api/export/q3%20report%2Ffinal"
        );
    }

    #[test]
    fn test_missing_parameter() {
        let endpoint = lookup("requests.detail").unwrap();
        let err = endpoint.path(&[]).unwrap_err();
        assert!(err.to_string().contains("missing parameter 'id'"));

        let err = endpoint.path(&[("id", "")]).unwrap_err();
        assert!(matches!(err, Error::Endpoint { .. }));
    }

    #[test]
    fn test_static_path_ignores_params() {
        let endpoint = lookup("providers.list").unwrap();
        assert!(endpoint.params().is_empty());
        assert_eq!(endpoint.path(&[("id", "7")]).unwrap(), "/api/providers");
    }

    #[test]
    fn test_unknown_endpoint() {
        assert!(lookup("providers.teleport").is_err());
    }

    #[test]
    fn test_domain_parsing() {
        assert_eq!("Zones".parse::<Domain>().unwrap(), Domain::Zones);
        assert_eq!(" finances ".parse::<Domain>().unwrap(), Domain::Finances);
        assert!("billing".parse::<Domain>().is_err());
    }
}
