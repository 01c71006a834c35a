//! Concurrent session control.

use std::sync::Arc;

use crate::chain::{ChainFilter, ConcurrentSessionFilter};
use crate::config::SecurityConfig;
use crate::error::CompileError;
use crate::order::{FilterSlot, Placement};
use crate::resolver::Resolver;
use crate::session::{ExceededPolicy, SessionController, SessionRegistry};
use crate::wirers::{Binding, Contribution, FeatureWirer};

/// Wires the concurrent-session stage and the shared registry behind it.
///
/// The registry is adopted from `session_registry_ref` when given, otherwise created
/// here. The same instance is bound to the session-management stage and to the
/// admission controller, so every component observes one session population.
///
/// A chain-level `session_controller_ref` is a competing claim on session admission and
/// is rejected as ambiguous rather than silently picking a winner.
pub struct ConcurrentSessionWirer;

impl FeatureWirer for ConcurrentSessionWirer {
    fn name(&self) -> &'static str {
        "concurrent-session"
    }

    fn applies(&self, config: &SecurityConfig) -> bool {
        config.concurrent_session_control.is_some()
    }

    fn wire(
        &self,
        config: &SecurityConfig,
        resolver: &Resolver,
    ) -> Result<Contribution, CompileError> {
        let control = config
            .concurrent_session_control
            .as_ref()
            .ok_or_else(|| CompileError::validation("concurrent_session_control", "missing"))?;

        if config.session_controller_ref.is_some() {
            return Err(CompileError::WiringAmbiguity {
                resource: "session controller".to_string(),
                message: "concurrent_session_control manages its own controller; \
                    remove session_controller_ref or the concurrency settings"
                    .to_string(),
            });
        }

        let registry = match &control.session_registry_ref {
            Some(name) => resolver.session_registry(name)?,
            None => Arc::new(SessionRegistry::new()),
        };

        let policy = if control.exception_if_maximum_exceeded {
            ExceededPolicy::RejectLogin
        } else {
            ExceededPolicy::ExpireOldest
        };
        let controller = Arc::new(SessionController::new(
            Arc::clone(&registry),
            control.max_sessions,
            policy,
        ));

        Ok(Contribution::default()
            .filter(
                ChainFilter::ConcurrentSession(ConcurrentSessionFilter {
                    registry: Arc::clone(&registry),
                    expired_url: control.expired_url.clone(),
                }),
                Placement::Slot(FilterSlot::ConcurrentSession),
            )
            .binding(Binding::SessionRegistry(registry))
            .binding(Binding::SessionController(controller)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::ExternalObject;

    #[test]
    fn shares_one_registry_between_filter_and_controller() {
        let config: SecurityConfig = serde_yaml::from_str(
            "concurrent_session_control:\n  max_sessions: 2\n",
        )
        .unwrap();
        let contribution = ConcurrentSessionWirer
            .wire(&config, &Resolver::new())
            .unwrap();

        let ChainFilter::ConcurrentSession(filter) = &contribution.filters[0].0 else {
            panic!("expected concurrent session filter");
        };
        let controller = contribution
            .bindings
            .iter()
            .find_map(|b| match b {
                Binding::SessionController(c) => Some(c),
                _ => None,
            })
            .expect("controller binding");
        assert!(Arc::ptr_eq(&filter.registry, controller.registry()));
        assert_eq!(controller.max_sessions(), 2);
        assert_eq!(controller.policy(), ExceededPolicy::ExpireOldest);
    }

    #[test]
    fn adopts_referenced_registry() {
        let registry = Arc::new(SessionRegistry::new());
        let mut resolver = Resolver::new();
        resolver.register("reg", ExternalObject::SessionRegistry(Arc::clone(&registry)));

        let config: SecurityConfig = serde_yaml::from_str(
            "concurrent_session_control:\n  session_registry_ref: reg\n",
        )
        .unwrap();
        let contribution = ConcurrentSessionWirer.wire(&config, &resolver).unwrap();
        let ChainFilter::ConcurrentSession(filter) = &contribution.filters[0].0 else {
            panic!("expected concurrent session filter");
        };
        assert!(Arc::ptr_eq(&filter.registry, &registry));
    }

    #[test]
    fn competing_controller_reference_is_ambiguous() {
        let config: SecurityConfig = serde_yaml::from_str(
            "session_controller_ref: external\nconcurrent_session_control:\n  max_sessions: 1\n",
        )
        .unwrap();
        let err = ConcurrentSessionWirer
            .wire(&config, &Resolver::new())
            .unwrap_err();
        assert!(matches!(err, CompileError::WiringAmbiguity { .. }));
    }

    #[test]
    fn exception_option_selects_reject_policy() {
        let config: SecurityConfig = serde_yaml::from_str(
            "concurrent_session_control:\n  max_sessions: 1\n  exception_if_maximum_exceeded: true\n",
        )
        .unwrap();
        let contribution = ConcurrentSessionWirer
            .wire(&config, &Resolver::new())
            .unwrap();
        let controller = contribution
            .bindings
            .iter()
            .find_map(|b| match b {
                Binding::SessionController(c) => Some(c),
                _ => None,
            })
            .unwrap();
        assert_eq!(controller.policy(), ExceededPolicy::RejectLogin);
    }
}
