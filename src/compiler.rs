//! Chain compilation.
//!
//! [`ChainCompiler`] turns a validated [`SecurityConfig`] into a [`CompiledChain`]:
//! core stages first, then feature contributions, then caller-supplied filters, merged
//! through the order registry into one total order. Compilation either produces a
//! complete chain or fails with the first error; no partially wired chain ever escapes.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::access::{AccessRule, AccessRuleIndex, ConfigAttribute};
use crate::chain::{
    AccessDeniedHandler, AnonymousFilter, AuthorizationFilter, BasicAuthFilter, ChainFilter,
    CompiledChain, CustomFilter, ExceptionTranslationFilter, FormLoginFilter,
    LoginPageFilter, LogoutFilter, RequestWrapperFilter, SecurityContextFilter,
    SessionManagementFilter, DEFAULT_LOGIN_PAGE, DEFAULT_REALM,
};
use crate::config::{FiltersMarker, SecurityConfig, SessionFixationPolicy};
use crate::error::CompileError;
use crate::matcher::{parse_method, PathMatcher};
use crate::order::{FilterOrderRegistry, FilterSlot, Placement};
use crate::resolver::Resolver;
use crate::session::SessionController;
use crate::wirers::{built_in_wirers, Binding, FeatureWirer};

const DEFAULT_LOGOUT_URL: &str = "/logout";
const DEFAULT_LOGOUT_SUCCESS_URL: &str = "/";
const DEFAULT_LOGIN_PROCESSING_URL: &str = "/login";
const DEFAULT_TARGET_URL: &str = "/";
const DEFAULT_ANONYMOUS_USER: &str = "anonymousUser";
const DEFAULT_ANONYMOUS_AUTHORITY: &str = "ROLE_ANONYMOUS";

/// Attributes that mark a rule as open to unauthenticated requests.
const ANONYMOUS_ATTRIBUTES: [&str; 2] = ["IS_AUTHENTICATED_ANONYMOUSLY", "permitAll"];

/// Compiles security configurations against a fixed set of external references.
pub struct ChainCompiler {
    resolver: Resolver,
    wirers: Vec<Box<dyn FeatureWirer>>,
}

impl ChainCompiler {
    pub fn new(resolver: Resolver) -> Self {
        ChainCompiler {
            resolver,
            wirers: built_in_wirers(),
        }
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Compile one configuration into a chain.
    pub fn compile(&self, config: &SecurityConfig) -> Result<CompiledChain, CompileError> {
        config.validate()?;
        if let Some(name) = &config.security_context_repository_ref {
            self.resolver.security_context_repository(name)?;
        }

        // Feature wiring first: core stages depend on the bindings (logout handlers,
        // the shared session registry, the entry point).
        let mut contributed = Vec::new();
        let mut bindings = Vec::new();
        for wirer in &self.wirers {
            if !wirer.applies(config) {
                continue;
            }
            debug!(feature = wirer.name(), "wiring feature");
            let contribution = wirer.wire(config, &self.resolver)?;
            contributed.extend(contribution.filters);
            bindings.extend(contribution.bindings);
        }

        let (index, bypass) = self.compile_access_rules(config)?;
        let index = Arc::new(index);

        let mut registry = FilterOrderRegistry::new();
        self.register_core_filters(config, &bindings, &index, &mut registry)?;
        for (filter, placement) in contributed {
            registry.register(filter.name().to_string(), placement, filter);
        }
        for custom in &config.custom_filters {
            let placement = custom.placement()?;
            registry.register(
                custom.name.clone(),
                placement,
                ChainFilter::Custom(CustomFilter {
                    name: custom.name.clone(),
                }),
            );
        }
        let stages = registry.finalize()?;

        self.warn_if_login_page_protected(config, &index, &bypass);

        let pattern = match &config.pattern {
            Some(p) => PathMatcher::compile(p, config.path_type, config.case_sensitive)?,
            None => PathMatcher::universal(config.path_type, config.case_sensitive),
        };

        let session_controller = self.chain_session_controller(config, &bindings)?;

        debug!(
            pattern = pattern.pattern(),
            stages = ?stages.iter().map(ChainFilter::name).collect::<Vec<_>>(),
            "compiled security chain"
        );

        Ok(CompiledChain::new(
            pattern,
            stages,
            bypass,
            index,
            session_controller,
        ))
    }

    /// Register the always-present stages and the auto-config mechanism set.
    fn register_core_filters(
        &self,
        config: &SecurityConfig,
        bindings: &[Binding],
        index: &Arc<AccessRuleIndex>,
        registry: &mut FilterOrderRegistry<ChainFilter>,
    ) -> Result<(), CompileError> {
        let mut add = |slot: FilterSlot, filter: ChainFilter| {
            registry.register(filter.name().to_string(), Placement::Slot(slot), filter);
        };

        add(
            FilterSlot::SecurityContext,
            ChainFilter::SecurityContext(SecurityContextFilter {
                create_session: config.create_session,
                disable_url_rewriting: config.disable_url_rewriting,
                repository_ref: config.security_context_repository_ref.clone(),
            }),
        );

        if config.auto_config || config.logout.is_some() {
            let logout = config.logout.clone().unwrap_or_default();
            let mut handlers = vec!["security_context_logout".to_string()];
            handlers.extend(bindings.iter().filter_map(|b| match b {
                Binding::LogoutHandler(h) => Some(h.clone()),
                _ => None,
            }));
            add(
                FilterSlot::Logout,
                ChainFilter::Logout(LogoutFilter {
                    logout_url: logout
                        .logout_url
                        .unwrap_or_else(|| DEFAULT_LOGOUT_URL.to_string()),
                    logout_success_url: logout
                        .logout_success_url
                        .unwrap_or_else(|| DEFAULT_LOGOUT_SUCCESS_URL.to_string()),
                    invalidate_session: logout.invalidate_session,
                    handlers,
                }),
            );
        }

        if config.auto_config || config.form_login.is_some() {
            let form = config.form_login.clone().unwrap_or_default();
            add(
                FilterSlot::Authentication,
                ChainFilter::FormLogin(FormLoginFilter {
                    login_processing_url: form
                        .login_processing_url
                        .unwrap_or_else(|| DEFAULT_LOGIN_PROCESSING_URL.to_string()),
                    default_target_url: form
                        .default_target_url
                        .unwrap_or_else(|| DEFAULT_TARGET_URL.to_string()),
                    always_use_default_target: form.always_use_default_target,
                    success_handler_ref: form.authentication_success_handler_ref,
                    failure_handler_ref: form.authentication_failure_handler_ref,
                }),
            );
            if form.login_page.is_none() {
                add(
                    FilterSlot::LoginPageGenerating,
                    ChainFilter::LoginPage(LoginPageFilter {
                        login_page_url: DEFAULT_LOGIN_PAGE.to_string(),
                    }),
                );
            }
        }

        if config.auto_config || config.http_basic.is_some() {
            let realm = config
                .http_basic
                .as_ref()
                .and_then(|b| b.realm.clone())
                .unwrap_or_else(|| DEFAULT_REALM.to_string());
            add(
                FilterSlot::BasicAuth,
                ChainFilter::BasicAuth(BasicAuthFilter { realm }),
            );
        }

        add(
            FilterSlot::SecurityContextHolderAware,
            ChainFilter::RequestWrapper(RequestWrapperFilter),
        );

        if config.auto_config || config.anonymous.is_some() {
            let anonymous = config.anonymous.clone().unwrap_or_default();
            add(
                FilterSlot::Anonymous,
                ChainFilter::Anonymous(AnonymousFilter {
                    username: anonymous
                        .username
                        .unwrap_or_else(|| DEFAULT_ANONYMOUS_USER.to_string()),
                    granted_authority: anonymous
                        .granted_authority
                        .unwrap_or_else(|| DEFAULT_ANONYMOUS_AUTHORITY.to_string()),
                }),
            );
        }

        let entry_point = bindings.iter().find_map(|b| match b {
            Binding::EntryPoint(e) => Some(e.clone()),
            _ => None,
        });
        let Some(entry_point) = entry_point else {
            return Err(CompileError::validation(
                "entry_point_ref",
                "no authentication entry point was wired",
            ));
        };
        let access_denied = AccessDeniedHandler {
            error_page: bindings.iter().find_map(|b| match b {
                Binding::AccessDeniedPage(p) => Some(p.clone()),
                _ => None,
            }),
        };
        add(
            FilterSlot::ExceptionTranslation,
            ChainFilter::ExceptionTranslation(ExceptionTranslationFilter {
                entry_point,
                access_denied,
            }),
        );

        if config.session_fixation_protection != SessionFixationPolicy::None {
            let session_registry = bindings.iter().find_map(|b| match b {
                Binding::SessionRegistry(r) => Some(Arc::clone(r)),
                _ => None,
            });
            add(
                FilterSlot::SessionManagement,
                ChainFilter::SessionManagement(SessionManagementFilter {
                    session_fixation: config.session_fixation_protection,
                    registry: session_registry,
                }),
            );
        }

        add(
            FilterSlot::Authorization,
            ChainFilter::Authorization(AuthorizationFilter {
                once_per_request: config.once_per_request,
                index: Arc::clone(index),
            }),
        );

        Ok(())
    }

    /// Compile intercept rules into the access index and the bypass pattern list.
    fn compile_access_rules(
        &self,
        config: &SecurityConfig,
    ) -> Result<(AccessRuleIndex, Vec<PathMatcher>), CompileError> {
        let mut rules = Vec::new();
        let mut bypass = Vec::new();
        for url in &config.intercept_urls {
            let matcher =
                PathMatcher::compile(&url.pattern, config.path_type, config.case_sensitive)?;
            if url.filters == Some(FiltersMarker::None) {
                if url.access.is_some() {
                    return Err(CompileError::validation(
                        "intercept_urls",
                        format!(
                            "rule '{}' combines 'filters: none' with access attributes; \
                            a bypassed path is never authorized",
                            url.pattern
                        ),
                    ));
                }
                bypass.push(matcher);
                continue;
            }
            let Some(access) = &url.access else {
                // Channel-only rules carry no authorization requirement.
                continue;
            };
            let method = url.method.as_deref().map(parse_method).transpose()?;
            let attributes = if config.use_expressions {
                vec![ConfigAttribute::Expression(access.trim().to_string())]
            } else {
                access
                    .split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(|t| ConfigAttribute::Literal(t.to_string()))
                    .collect()
            };
            rules.push(AccessRule {
                matcher,
                method,
                attributes,
            });
        }
        Ok((AccessRuleIndex::from_rules(rules), bypass))
    }

    /// The admission controller the chain exposes, if any.
    fn chain_session_controller(
        &self,
        config: &SecurityConfig,
        bindings: &[Binding],
    ) -> Result<Option<Arc<SessionController>>, CompileError> {
        if let Some(controller) = bindings.iter().find_map(|b| match b {
            Binding::SessionController(c) => Some(Arc::clone(c)),
            _ => None,
        }) {
            return Ok(Some(controller));
        }
        match &config.session_controller_ref {
            Some(name) => Ok(Some(self.resolver.session_controller(name)?)),
            None => Ok(None),
        }
    }

    /// A custom login page that the access rules themselves protect locks every
    /// unauthenticated user out. Compilation still succeeds; the situation is loud in
    /// the logs instead.
    fn warn_if_login_page_protected(
        &self,
        config: &SecurityConfig,
        index: &AccessRuleIndex,
        bypass: &[PathMatcher],
    ) {
        let Some(login_page) = config.form_login.as_ref().and_then(|f| f.login_page.as_deref())
        else {
            return;
        };
        if bypass.iter().any(|m| m.matches(login_page)) {
            return;
        }
        let attributes = index.attributes_for(login_page, &http::Method::GET);
        if attributes.is_empty() {
            return;
        }
        let open = attributes
            .iter()
            .any(|a| ANONYMOUS_ATTRIBUTES.contains(&a.value()));
        if !open {
            warn!(
                login_page,
                "the login page appears to be protected by the access rules; \
                anonymous users may be unable to authenticate"
            );
        }
    }
}
