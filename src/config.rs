//! The parsed security configuration tree.
//!
//! This is the compiler's input: a plain data model with serde derives, produced by
//! whatever surface syntax the deployment uses. [`load_config`] covers the common
//! YAML-on-disk case; tests deserialize inline YAML the same way.

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::error::CompileError;
use crate::matcher::PathSyntax;
use crate::order::{FilterSlot, Placement};

fn default_true() -> bool {
    true
}

fn default_max_sessions() -> usize {
    1
}

/// When the security-context stage may create an HTTP session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionCreationPolicy {
    Always,
    #[default]
    IfRequired,
    Never,
    Stateless,
}

/// Session-fixation protection mode. `None` removes the session-management stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionFixationPolicy {
    #[default]
    MigrateSession,
    None,
}

/// Transport channel an intercept rule may require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequiredChannel {
    Http,
    Https,
    Any,
}

/// Marker for `filters: none`: requests matching the rule bypass the chain entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FiltersMarker {
    None,
}

/// Global chain options plus the ordered rule list and feature sub-configurations.
#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// Top-level pattern selecting this chain; defaults to the universal pattern.
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub path_type: PathSyntax,
    #[serde(default)]
    pub case_sensitive: bool,
    /// Enables the default mechanism set: form login, basic auth, logout, anonymous.
    #[serde(default)]
    pub auto_config: bool,
    #[serde(default = "default_true")]
    pub once_per_request: bool,
    #[serde(default)]
    pub create_session: SessionCreationPolicy,
    #[serde(default)]
    pub session_fixation_protection: SessionFixationPolicy,
    /// Treat `access` strings as opaque boolean expressions instead of token lists.
    #[serde(default)]
    pub use_expressions: bool,
    #[serde(default)]
    pub disable_url_rewriting: bool,
    #[serde(default)]
    pub access_denied_page: Option<String>,
    #[serde(default)]
    pub entry_point_ref: Option<String>,
    #[serde(default)]
    pub security_context_repository_ref: Option<String>,
    /// An independently-scoped session controller. Mutually exclusive with
    /// `concurrent_session_control`.
    #[serde(default)]
    pub session_controller_ref: Option<String>,
    #[serde(default)]
    pub intercept_urls: Vec<InterceptUrl>,
    #[serde(default)]
    pub form_login: Option<FormLoginConfig>,
    #[serde(default)]
    pub http_basic: Option<HttpBasicConfig>,
    #[serde(default)]
    pub logout: Option<LogoutConfig>,
    #[serde(default)]
    pub anonymous: Option<AnonymousConfig>,
    #[serde(default)]
    pub remember_me: Option<RememberMeConfig>,
    #[serde(default)]
    pub concurrent_session_control: Option<ConcurrentSessionConfig>,
    #[serde(default)]
    pub x509: Option<X509Config>,
    #[serde(default)]
    pub port_mappings: Vec<PortMapping>,
    #[serde(default)]
    pub custom_filters: Vec<CustomFilterConfig>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        SecurityConfig {
            pattern: None,
            path_type: PathSyntax::default(),
            case_sensitive: false,
            auto_config: false,
            once_per_request: true,
            create_session: SessionCreationPolicy::default(),
            session_fixation_protection: SessionFixationPolicy::default(),
            use_expressions: false,
            disable_url_rewriting: false,
            access_denied_page: None,
            entry_point_ref: None,
            security_context_repository_ref: None,
            session_controller_ref: None,
            intercept_urls: Vec::new(),
            form_login: None,
            http_basic: None,
            logout: None,
            anonymous: None,
            remember_me: None,
            concurrent_session_control: None,
            x509: None,
            port_mappings: Vec::new(),
            custom_filters: Vec::new(),
        }
    }
}

/// One declared protected-resource rule. Declaration order is significant.
#[derive(Debug, Clone, Deserialize)]
pub struct InterceptUrl {
    pub pattern: String,
    #[serde(default)]
    pub method: Option<String>,
    /// Comma-separated attribute tokens, or one expression when `use_expressions` is set.
    #[serde(default)]
    pub access: Option<String>,
    #[serde(default)]
    pub filters: Option<FiltersMarker>,
    #[serde(default)]
    pub requires_channel: Option<RequiredChannel>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FormLoginConfig {
    /// Custom login page. Absent means the generated default page is served.
    #[serde(default)]
    pub login_page: Option<String>,
    #[serde(default)]
    pub login_processing_url: Option<String>,
    #[serde(default)]
    pub default_target_url: Option<String>,
    #[serde(default)]
    pub always_use_default_target: bool,
    #[serde(default)]
    pub authentication_success_handler_ref: Option<String>,
    #[serde(default)]
    pub authentication_failure_handler_ref: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HttpBasicConfig {
    #[serde(default)]
    pub realm: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogoutConfig {
    #[serde(default)]
    pub logout_url: Option<String>,
    #[serde(default)]
    pub logout_success_url: Option<String>,
    #[serde(default = "default_true")]
    pub invalidate_session: bool,
}

impl Default for LogoutConfig {
    fn default() -> Self {
        LogoutConfig {
            logout_url: None,
            logout_success_url: None,
            invalidate_session: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnonymousConfig {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub granted_authority: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RememberMeConfig {
    #[serde(default)]
    pub key: Option<String>,
    /// Negative means "never expires"; only representable by a non-persistent store.
    #[serde(default)]
    pub token_validity_seconds: Option<i64>,
    #[serde(default)]
    pub services_ref: Option<String>,
    #[serde(default)]
    pub token_repository_ref: Option<String>,
    #[serde(default)]
    pub data_source_ref: Option<String>,
    #[serde(default)]
    pub user_service_ref: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConcurrentSessionConfig {
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
    #[serde(default)]
    pub exception_if_maximum_exceeded: bool,
    #[serde(default)]
    pub expired_url: Option<String>,
    #[serde(default)]
    pub session_registry_ref: Option<String>,
}

impl Default for ConcurrentSessionConfig {
    fn default() -> Self {
        ConcurrentSessionConfig {
            max_sessions: 1,
            exception_if_maximum_exceeded: false,
            expired_url: None,
            session_registry_ref: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct X509Config {
    #[serde(default)]
    pub subject_principal_regex: Option<String>,
}

/// One http↔https port pair for channel redirects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PortMapping {
    pub http: u16,
    pub https: u16,
}

/// A caller-supplied filter with a placement directive. Exactly one of `after`,
/// `before` or `position` must be set.
#[derive(Debug, Clone, Deserialize)]
pub struct CustomFilterConfig {
    pub name: String,
    #[serde(default)]
    pub after: Option<String>,
    #[serde(default)]
    pub before: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
}

impl CustomFilterConfig {
    /// Resolve the directive into a [`Placement`], rejecting unknown anchors.
    pub fn placement(&self) -> Result<Placement, CompileError> {
        let directives = [&self.after, &self.before, &self.position]
            .iter()
            .filter(|d| d.is_some())
            .count();
        if directives != 1 {
            return Err(CompileError::validation(
                "custom_filters",
                format!(
                    "filter '{}' must declare exactly one of after/before/position",
                    self.name
                ),
            ));
        }
        let anchor = |name: &str| {
            FilterSlot::from_name(name).ok_or_else(|| {
                crate::error::PlacementError::UnknownAnchor {
                    filter: self.name.clone(),
                    anchor: name.to_string(),
                }
            })
        };
        if let Some(name) = &self.after {
            return Ok(Placement::After(anchor(name)?));
        }
        if let Some(name) = &self.before {
            return Ok(Placement::Before(anchor(name)?));
        }
        match self.position.as_deref() {
            Some("FIRST") => Ok(Placement::First),
            Some("LAST") => Ok(Placement::Last),
            Some(name) => Ok(Placement::Position(anchor(name)?)),
            None => unreachable!("directive count checked above"),
        }
    }
}

impl SecurityConfig {
    /// Validate option-level invariants before any wiring happens.
    ///
    /// Path options must be absolute, and mutually exclusive options are rejected here
    /// so a failed compile never gets as far as constructing stages.
    pub fn validate(&self) -> Result<(), CompileError> {
        require_absolute("access_denied_page", self.access_denied_page.as_deref())?;
        if let Some(form) = &self.form_login {
            require_absolute("form_login.login_page", form.login_page.as_deref())?;
            require_absolute(
                "form_login.login_processing_url",
                form.login_processing_url.as_deref(),
            )?;
            require_absolute(
                "form_login.default_target_url",
                form.default_target_url.as_deref(),
            )?;
        }
        if let Some(logout) = &self.logout {
            require_absolute("logout.logout_url", logout.logout_url.as_deref())?;
            require_absolute(
                "logout.logout_success_url",
                logout.logout_success_url.as_deref(),
            )?;
        }
        if let Some(concurrent) = &self.concurrent_session_control {
            require_absolute(
                "concurrent_session_control.expired_url",
                concurrent.expired_url.as_deref(),
            )?;
        }
        if self.security_context_repository_ref.is_some()
            && matches!(
                self.create_session,
                SessionCreationPolicy::Never | SessionCreationPolicy::Stateless
            )
        {
            return Err(CompileError::validation(
                "create_session",
                "cannot be 'never' or 'stateless' when security_context_repository_ref is set",
            ));
        }
        Ok(())
    }
}

fn require_absolute(field: &str, value: Option<&str>) -> Result<(), CompileError> {
    match value {
        Some(v) if !v.starts_with('/') => Err(CompileError::validation(
            field,
            format!("'{}' must be an absolute path beginning with '/'", v),
        )),
        _ => Ok(()),
    }
}

/// Load a security configuration from a YAML file.
pub fn load_config(path: impl AsRef<Path>) -> anyhow::Result<SecurityConfig> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read security config {}", path.display()))?;
    let config: SecurityConfig =
        serde_yaml::from_str(&text).context("failed to parse security config")?;
    Ok(config)
}
