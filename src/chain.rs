//! Compiled chain artifacts.
//!
//! Everything in this module is the *output* of compilation: immutable stage
//! descriptions the request layer walks per request. Stages carry the settings the
//! configuration resolved to, plus shared handles (session registry, access rule index)
//! where several stages must observe the same state.

use std::sync::Arc;

use http::Method;

use crate::access::{AccessRuleIndex, ConfigAttribute};
use crate::config::{RequiredChannel, SessionCreationPolicy, SessionFixationPolicy};
use crate::matcher::{method_matches, PathMatcher};
use crate::session::{SessionController, SessionRegistry};

/// Login page served by the generating stage when none is configured.
pub const DEFAULT_LOGIN_PAGE: &str = "/login";
/// Realm sent with basic-auth challenges when none is configured.
pub const DEFAULT_REALM: &str = "Secured";

/// Where unauthenticated requests are sent to begin authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryPoint {
    /// Redirect to the form login page.
    LoginPage { url: String },
    /// Challenge with `WWW-Authenticate: Basic`.
    BasicAuth { realm: String },
    /// An externally supplied entry point, identified by its registered name.
    External { name: String },
}

/// How remember-me tokens are issued and verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RememberMeServices {
    /// Self-contained signed tokens. The only mode that can express "never expires"
    /// via a negative validity.
    TokenBased { key: String, validity_seconds: i64 },
    /// Server-side token records in a persistent store.
    PersistentToken {
        store: TokenStore,
        validity_seconds: i64,
    },
    /// An externally supplied implementation.
    External {
        services_ref: String,
        token_validity_seconds: Option<i64>,
    },
}

impl RememberMeServices {
    pub fn is_persistent(&self) -> bool {
        matches!(self, RememberMeServices::PersistentToken { .. })
    }
}

/// Backing store for persistent remember-me tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenStore {
    Repository { ref_name: String },
    DataSource { ref_name: String },
}

/// Maps insecure ports to their secure counterparts for channel redirects.
///
/// Custom mappings replace the defaults (80↔443, 8080↔8443) entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortMapper {
    mappings: Vec<(u16, u16)>,
}

impl Default for PortMapper {
    fn default() -> Self {
        PortMapper {
            mappings: vec![(80, 443), (8080, 8443)],
        }
    }
}

impl PortMapper {
    pub fn with_mappings(mappings: Vec<(u16, u16)>) -> Self {
        if mappings.is_empty() {
            PortMapper::default()
        } else {
            PortMapper { mappings }
        }
    }

    pub fn lookup_https_port(&self, http_port: u16) -> Option<u16> {
        self.mappings
            .iter()
            .find(|(http, _)| *http == http_port)
            .map(|(_, https)| *https)
    }

    pub fn lookup_http_port(&self, https_port: u16) -> Option<u16> {
        self.mappings
            .iter()
            .find(|(_, https)| *https == https_port)
            .map(|(http, _)| *http)
    }

    pub fn mapping_count(&self) -> usize {
        self.mappings.len()
    }
}

/// One compiled channel requirement.
#[derive(Debug, Clone)]
pub struct ChannelRule {
    pub matcher: PathMatcher,
    pub method: Option<Method>,
    pub channel: RequiredChannel,
}

/// Redirects requests that arrive on the wrong transport. First matching rule wins.
#[derive(Debug, Clone)]
pub struct ChannelFilter {
    pub rules: Vec<ChannelRule>,
    pub port_mapper: PortMapper,
}

impl ChannelFilter {
    pub fn required_channel_for(&self, path: &str, method: &Method) -> Option<RequiredChannel> {
        self.rules
            .iter()
            .find(|r| method_matches(r.method.as_ref(), method) && r.matcher.matches(path))
            .map(|r| r.channel)
    }
}

/// Rejects requests whose session was expired by the concurrency controller.
#[derive(Debug, Clone)]
pub struct ConcurrentSessionFilter {
    pub registry: Arc<SessionRegistry>,
    pub expired_url: Option<String>,
}

/// Establishes the security context for the request, loading and persisting it
/// according to the session creation policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityContextFilter {
    pub create_session: SessionCreationPolicy,
    pub disable_url_rewriting: bool,
    /// External repository name when the context is not session-backed.
    pub repository_ref: Option<String>,
}

impl SecurityContextFilter {
    /// `always` eagerly creates a session before the rest of the chain runs.
    pub fn force_eager_session_creation(&self) -> bool {
        self.create_session == SessionCreationPolicy::Always
    }

    pub fn allows_session_creation(&self) -> bool {
        !matches!(
            self.create_session,
            SessionCreationPolicy::Never | SessionCreationPolicy::Stateless
        )
    }
}

/// Terminates the session and runs the registered logout handlers in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoutFilter {
    pub logout_url: String,
    pub logout_success_url: String,
    pub invalidate_session: bool,
    /// Handler names in invocation order. Features append their own handlers.
    pub handlers: Vec<String>,
}

/// Extracts the principal from a verified client certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct X509Filter {
    pub subject_principal_regex: String,
}

/// Processes form login submissions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormLoginFilter {
    pub login_processing_url: String,
    pub default_target_url: String,
    pub always_use_default_target: bool,
    pub success_handler_ref: Option<String>,
    pub failure_handler_ref: Option<String>,
}

/// Serves a generated login page when no custom page is configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginPageFilter {
    pub login_page_url: String,
}

/// Processes `Authorization: Basic` credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicAuthFilter {
    pub realm: String,
}

/// Exposes the authenticated principal through the standard request API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequestWrapperFilter;

/// Restores an authentication from a remember-me token when the context is empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RememberMeFilter {
    pub services: RememberMeServices,
}

/// Populates an anonymous authentication when nothing else did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnonymousFilter {
    pub username: String,
    pub granted_authority: String,
}

/// Renders the access-denied response for authenticated-but-forbidden requests.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AccessDeniedHandler {
    /// Forward target; a bare 403 with a minimal JSON body when absent.
    pub error_page: Option<String>,
}

impl AccessDeniedHandler {
    pub fn default_body(&self) -> serde_json::Value {
        serde_json::json!({ "error": "access denied" })
    }
}

/// Catches authorization failures from downstream stages and routes them either to the
/// entry point (unauthenticated) or the access-denied handler (authenticated).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionTranslationFilter {
    pub entry_point: EntryPoint,
    pub access_denied: AccessDeniedHandler,
}

/// Applies session-fixation protection after authentication and notifies the shared
/// registry when one is wired.
#[derive(Debug, Clone)]
pub struct SessionManagementFilter {
    pub session_fixation: SessionFixationPolicy,
    pub registry: Option<Arc<SessionRegistry>>,
}

/// The authorization decision stage, last in the chain.
#[derive(Debug, Clone)]
pub struct AuthorizationFilter {
    pub once_per_request: bool,
    pub index: Arc<AccessRuleIndex>,
}

/// A caller-supplied stage the compiler only places, never interprets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomFilter {
    pub name: String,
}

/// One stage of a compiled chain.
#[derive(Debug, Clone)]
pub enum ChainFilter {
    Channel(ChannelFilter),
    ConcurrentSession(ConcurrentSessionFilter),
    SecurityContext(SecurityContextFilter),
    Logout(LogoutFilter),
    X509(X509Filter),
    FormLogin(FormLoginFilter),
    LoginPage(LoginPageFilter),
    BasicAuth(BasicAuthFilter),
    RequestWrapper(RequestWrapperFilter),
    RememberMe(RememberMeFilter),
    Anonymous(AnonymousFilter),
    ExceptionTranslation(ExceptionTranslationFilter),
    SessionManagement(SessionManagementFilter),
    Authorization(AuthorizationFilter),
    Custom(CustomFilter),
}

impl ChainFilter {
    /// Stable stage name, used in logs and assertions on chain composition.
    pub fn name(&self) -> &str {
        match self {
            ChainFilter::Channel(_) => "channel",
            ChainFilter::ConcurrentSession(_) => "concurrent_session",
            ChainFilter::SecurityContext(_) => "security_context",
            ChainFilter::Logout(_) => "logout",
            ChainFilter::X509(_) => "x509",
            ChainFilter::FormLogin(_) => "form_login",
            ChainFilter::LoginPage(_) => "login_page",
            ChainFilter::BasicAuth(_) => "basic_auth",
            ChainFilter::RequestWrapper(_) => "request_wrapper",
            ChainFilter::RememberMe(_) => "remember_me",
            ChainFilter::Anonymous(_) => "anonymous",
            ChainFilter::ExceptionTranslation(_) => "exception_translation",
            ChainFilter::SessionManagement(_) => "session_management",
            ChainFilter::Authorization(_) => "authorization",
            ChainFilter::Custom(f) => &f.name,
        }
    }
}

/// A fully compiled security chain.
///
/// Immutable once built; all request-time queries borrow shared state.
#[derive(Debug)]
pub struct CompiledChain {
    pattern: PathMatcher,
    stages: Vec<ChainFilter>,
    /// Patterns whose requests bypass every stage (`filters: none`).
    bypass: Vec<PathMatcher>,
    index: Arc<AccessRuleIndex>,
    session_controller: Option<Arc<SessionController>>,
}

impl CompiledChain {
    pub(crate) fn new(
        pattern: PathMatcher,
        stages: Vec<ChainFilter>,
        bypass: Vec<PathMatcher>,
        index: Arc<AccessRuleIndex>,
        session_controller: Option<Arc<SessionController>>,
    ) -> Self {
        CompiledChain {
            pattern,
            stages,
            bypass,
            index,
            session_controller,
        }
    }

    /// Whether this chain handles the request path at all.
    pub fn matches(&self, path: &str) -> bool {
        self.pattern.matches(path)
    }

    pub fn pattern(&self) -> &PathMatcher {
        &self.pattern
    }

    /// All stages in execution order.
    pub fn stages(&self) -> &[ChainFilter] {
        &self.stages
    }

    /// The stages that apply to one request. Empty for bypassed paths.
    pub fn stages_for(&self, path: &str) -> &[ChainFilter] {
        if self.is_bypassed(path) {
            &[]
        } else {
            &self.stages
        }
    }

    pub fn is_bypassed(&self, path: &str) -> bool {
        self.bypass.iter().any(|m| m.matches(path))
    }

    pub fn access_attributes_for(&self, path: &str, method: &Method) -> Vec<ConfigAttribute> {
        self.index.attributes_for(path, method)
    }

    pub fn access_rules(&self) -> &AccessRuleIndex {
        &self.index
    }

    /// Stage names in order, for composition assertions.
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(ChainFilter::name).collect()
    }

    pub fn stage(&self, name: &str) -> Option<&ChainFilter> {
        self.stages.iter().find(|s| s.name() == name)
    }

    /// The admission controller, present when concurrent session control is wired.
    pub fn session_controller(&self) -> Option<&Arc<SessionController>> {
        self.session_controller.as_ref()
    }
}
