//! Feature-module registration.
//!
//! A module contributes route declarations; the registry mounts each one at
//! `api_prefix + path`. Failures are logged, recorded in the report and
//! skipped so one broken module never stops the others from loading.

use std::collections::HashSet;
use std::panic::{AssertUnwindSafe, catch_unwind};

use axum::Router;

use crate::bootstrap::app_context::AppContext;
use crate::presentation::http::error_handlers::panic_message;
use crate::presentation::http::home;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    #[error("module `{0}` is not in the catalog")]
    ModuleNotFound(String),
    #[error("route table could not be built: {0}")]
    RouteTable(String),
    #[error("invalid route prefix `{0}`")]
    InvalidPrefix(String),
    #[error("prefix `{0}` is already registered")]
    DuplicatePrefix(String),
    #[error("router rejected `{prefix}`: {reason}")]
    Panicked { prefix: String, reason: String },
}

/// One router a module wants mounted, with its sub-path and OpenAPI tags.
pub struct RouteDeclaration {
    router: Router<AppContext>,
    path: String,
    tags: Vec<String>,
}

impl RouteDeclaration {
    pub fn new(path: impl Into<String>, router: Router<AppContext>) -> Self {
        Self {
            router,
            path: path.into(),
            tags: Vec::new(),
        }
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }
}

pub trait FeatureModule: Send + Sync {
    fn name(&self) -> &'static str;
    fn urlpatterns(&self) -> Result<Vec<RouteDeclaration>, RegistrationError>;
}

pub type ModuleConstructor = fn() -> Box<dyn FeatureModule>;

/// Modules compiled into the binary, selectable through `INSTALLED_MODULES`.
pub static BUILTIN_MODULES: &[(&str, ModuleConstructor)] = &[("home", home::module)];

#[derive(Clone)]
pub struct ModuleCatalog {
    entries: Vec<(&'static str, ModuleConstructor)>,
}

impl ModuleCatalog {
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Adds or replaces an entry.
    pub fn with(mut self, name: &'static str, ctor: ModuleConstructor) -> Self {
        self.entries.retain(|(n, _)| *n != name);
        self.entries.push((name, ctor));
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|(n, _)| *n).collect()
    }

    pub fn resolve(&self, name: &str) -> Option<Box<dyn FeatureModule>> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, ctor)| ctor())
    }
}

impl Default for ModuleCatalog {
    fn default() -> Self {
        Self {
            entries: BUILTIN_MODULES.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredRoute {
    pub module: String,
    pub prefix: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationFailure {
    pub module: String,
    pub error: RegistrationError,
}

#[derive(Debug, Clone, Default)]
pub struct RegistrationReport {
    pub registered: Vec<RegisteredRoute>,
    pub failures: Vec<RegistrationFailure>,
}

impl RegistrationReport {
    pub fn prefixes(&self) -> Vec<&str> {
        self.registered.iter().map(|r| r.prefix.as_str()).collect()
    }

    /// Modules with at least one mounted route, in registration order.
    pub fn modules(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for route in &self.registered {
            if !names.contains(&route.module.as_str()) {
                names.push(&route.module);
            }
        }
        names
    }

    pub fn failed_modules(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.module.as_str()).collect()
    }

    fn fail(&mut self, module: &str, error: RegistrationError) {
        self.failures.push(RegistrationFailure {
            module: module.to_string(),
            error,
        });
    }
}

pub struct ModuleRegistry<'a> {
    api_prefix: String,
    installed: Vec<String>,
    catalog: &'a ModuleCatalog,
}

impl<'a> ModuleRegistry<'a> {
    pub fn new(
        api_prefix: impl Into<String>,
        installed: Vec<String>,
        catalog: &'a ModuleCatalog,
    ) -> Self {
        Self {
            api_prefix: api_prefix.into(),
            installed,
            catalog,
        }
    }

    /// Mounts every installed module on `router`, in installation order.
    pub fn register(
        self,
        mut router: Router<AppContext>,
    ) -> (Router<AppContext>, RegistrationReport) {
        let mut report = RegistrationReport::default();
        let mut seen: HashSet<String> = HashSet::new();

        tracing::info!(modules = ?self.installed, "modules_loading");
        if self.installed.is_empty() {
            tracing::info!("no_installed_modules");
            return (router, report);
        }

        for name in &self.installed {
            let Some(module) = self.catalog.resolve(name) else {
                let err = RegistrationError::ModuleNotFound(name.clone());
                tracing::error!(module = %name, error = %err, "module_not_found");
                report.fail(name, err);
                continue;
            };

            let declarations = match module.urlpatterns() {
                Ok(declarations) => declarations,
                Err(err) => {
                    tracing::error!(module = %name, error = %err, "module_urlpatterns_failed");
                    report.fail(name, err);
                    continue;
                }
            };
            if declarations.is_empty() {
                tracing::info!(module = %name, "module_has_no_routes");
                continue;
            }

            for decl in declarations {
                let prefix = format!("{}{}", self.api_prefix, decl.path);
                if let Err(err) = validate_prefix(&prefix) {
                    tracing::error!(module = %name, %prefix, error = %err, "route_registration_failed");
                    report.fail(name, err);
                    continue;
                }
                if seen.contains(&prefix) {
                    let err = RegistrationError::DuplicatePrefix(prefix.clone());
                    tracing::error!(module = %name, %prefix, error = %err, "route_registration_failed");
                    report.fail(name, err);
                    continue;
                }

                let RouteDeclaration {
                    router: nested,
                    tags,
                    ..
                } = decl;
                let candidate = router.clone();
                let attempt = catch_unwind(AssertUnwindSafe(|| candidate.nest(&prefix, nested)));
                match attempt {
                    Ok(next) => {
                        router = next;
                        tracing::info!(module = %name, %prefix, ?tags, "route_registered");
                        seen.insert(prefix.clone());
                        report.registered.push(RegisteredRoute {
                            module: name.clone(),
                            prefix,
                            tags,
                        });
                    }
                    Err(payload) => {
                        let err = RegistrationError::Panicked {
                            prefix: prefix.clone(),
                            reason: panic_message(payload.as_ref()),
                        };
                        tracing::error!(module = %name, %prefix, error = %err, "route_registration_failed");
                        report.fail(name, err);
                    }
                }
            }
        }

        tracing::info!(
            registered = report.registered.len(),
            failed = report.failures.len(),
            "modules_loaded"
        );
        (router, report)
    }
}

fn validate_prefix(prefix: &str) -> Result<(), RegistrationError> {
    let invalid = prefix.is_empty()
        || !prefix.starts_with('/')
        || prefix == "/"
        || prefix.contains('*')
        || prefix.contains("//");
    if invalid {
        Err(RegistrationError::InvalidPrefix(prefix.to_string()))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_rules() {
        assert!(validate_prefix("/api/home").is_ok());
        assert!(validate_prefix("/home").is_ok());
        assert!(validate_prefix("").is_err());
        assert!(validate_prefix("/").is_err());
        assert!(validate_prefix("home").is_err());
        assert!(validate_prefix("/api/*rest").is_err());
        assert!(validate_prefix("/api//home").is_err());
    }

    #[test]
    fn default_catalog_contains_home() {
        let catalog = ModuleCatalog::default();
        assert_eq!(catalog.names(), vec!["home"]);
        assert!(catalog.resolve("home").is_some());
        assert!(catalog.resolve("billing").is_none());
    }

    #[test]
    fn report_counts_each_module_once() {
        let route = |module: &str, prefix: &str| RegisteredRoute {
            module: module.into(),
            prefix: prefix.into(),
            tags: Vec::new(),
        };
        let report = RegistrationReport {
            registered: vec![
                route("shop", "/api/cart"),
                route("home", "/api/home"),
                route("shop", "/api/orders"),
            ],
            failures: Vec::new(),
        };
        assert_eq!(report.modules(), vec!["shop", "home"]);
        assert_eq!(report.prefixes().len(), 3);
    }

    #[test]
    fn catalog_with_replaces_existing_entry() {
        let catalog = ModuleCatalog::default().with("home", home::module);
        assert_eq!(catalog.names(), vec!["home"]);
    }
}
