//! Entry point and access-denied wiring.

use crate::chain::{EntryPoint, DEFAULT_LOGIN_PAGE, DEFAULT_REALM};
use crate::config::SecurityConfig;
use crate::error::CompileError;
use crate::resolver::Resolver;
use crate::wirers::{Binding, Contribution, FeatureWirer};

/// Derives the chain's authentication entry point.
///
/// An explicit `entry_point_ref` always wins. Otherwise the strongest interactive
/// mechanism decides: form login over basic auth. A chain with neither and no explicit
/// reference has no way to begin authentication and is rejected.
pub struct EntryPointWirer;

impl FeatureWirer for EntryPointWirer {
    fn name(&self) -> &'static str {
        "entry-point"
    }

    fn applies(&self, _config: &SecurityConfig) -> bool {
        // Every chain needs an entry point for its exception translation stage.
        true
    }

    fn wire(
        &self,
        config: &SecurityConfig,
        resolver: &Resolver,
    ) -> Result<Contribution, CompileError> {
        let entry_point = if let Some(name) = &config.entry_point_ref {
            resolver.entry_point(name)?
        } else if config.auto_config || config.form_login.is_some() {
            let url = config
                .form_login
                .as_ref()
                .and_then(|f| f.login_page.clone())
                .unwrap_or_else(|| DEFAULT_LOGIN_PAGE.to_string());
            EntryPoint::LoginPage { url }
        } else if config.http_basic.is_some() {
            let realm = config
                .http_basic
                .as_ref()
                .and_then(|b| b.realm.clone())
                .unwrap_or_else(|| DEFAULT_REALM.to_string());
            EntryPoint::BasicAuth { realm }
        } else {
            return Err(CompileError::validation(
                "entry_point_ref",
                "no authentication entry point could be derived; enable form_login, \
                http_basic or auto_config, or set entry_point_ref",
            ));
        };

        Ok(Contribution::default().binding(Binding::EntryPoint(entry_point)))
    }
}

/// Binds the forward target for access-denied responses when one is configured.
pub struct AccessDeniedWirer;

impl FeatureWirer for AccessDeniedWirer {
    fn name(&self) -> &'static str {
        "access-denied"
    }

    fn applies(&self, config: &SecurityConfig) -> bool {
        config.access_denied_page.is_some()
    }

    fn wire(
        &self,
        config: &SecurityConfig,
        _resolver: &Resolver,
    ) -> Result<Contribution, CompileError> {
        let page = config
            .access_denied_page
            .clone()
            .ok_or_else(|| CompileError::validation("access_denied_page", "missing"))?;
        Ok(Contribution::default().binding(Binding::AccessDeniedPage(page)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::ExternalObject;

    fn derive(yaml: &str, resolver: &Resolver) -> Result<EntryPoint, CompileError> {
        let config: SecurityConfig = serde_yaml::from_str(yaml).unwrap();
        let contribution = EntryPointWirer.wire(&config, resolver)?;
        let entry = contribution
            .bindings
            .into_iter()
            .find_map(|b| match b {
                Binding::EntryPoint(e) => Some(e),
                _ => None,
            })
            .expect("entry point binding");
        Ok(entry)
    }

    #[test]
    fn explicit_reference_overrides_derived_default() {
        let mut resolver = Resolver::new();
        resolver.register(
            "custom",
            ExternalObject::EntryPoint(EntryPoint::External {
                name: "custom".into(),
            }),
        );
        let entry = derive("entry_point_ref: custom\nauto_config: true\n", &resolver).unwrap();
        assert_eq!(entry, EntryPoint::External { name: "custom".into() });
    }

    #[test]
    fn form_login_wins_over_basic() {
        let entry = derive(
            "form_login:\n  login_page: /acegilogin.jsp\nhttp_basic: {}\n",
            &Resolver::new(),
        )
        .unwrap();
        assert_eq!(
            entry,
            EntryPoint::LoginPage {
                url: "/acegilogin.jsp".into()
            }
        );
    }

    #[test]
    fn auto_config_defaults_to_the_generated_login_page() {
        let entry = derive("auto_config: true\n", &Resolver::new()).unwrap();
        assert_eq!(
            entry,
            EntryPoint::LoginPage {
                url: DEFAULT_LOGIN_PAGE.into()
            }
        );
    }

    #[test]
    fn basic_only_chain_challenges_with_its_realm() {
        let entry = derive("http_basic:\n  realm: Internal\n", &Resolver::new()).unwrap();
        assert_eq!(entry, EntryPoint::BasicAuth { realm: "Internal".into() });
    }

    #[test]
    fn chain_without_any_mechanism_is_rejected() {
        let err = derive("intercept_urls: []\n", &Resolver::new()).unwrap_err();
        assert!(matches!(err, CompileError::Validation { .. }));
    }
}
