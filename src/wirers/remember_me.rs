//! Remember-me authentication.

use crate::chain::{ChainFilter, RememberMeFilter, RememberMeServices, TokenStore};
use crate::config::{RememberMeConfig, SecurityConfig};
use crate::error::CompileError;
use crate::order::{FilterSlot, Placement};
use crate::resolver::Resolver;
use crate::wirers::{Binding, Contribution, FeatureWirer};

const DEFAULT_KEY: &str = "portcullis-remember-me";
const DEFAULT_VALIDITY_SECONDS: i64 = 14 * 24 * 3600;

/// Wires remember-me token services.
///
/// The token source is picked from the configuration: a complete external services
/// implementation, a persistent repository or data source, or self-contained signed
/// tokens. Declaring more than one source is ambiguous. Persistent stores cannot
/// express "never expires", so a negative validity combined with one is rejected.
///
/// Remember-me tokens must be cancelled on logout, which is why this wirer also binds a
/// logout handler.
pub struct RememberMeWirer;

impl RememberMeWirer {
    fn services(
        remember_me: &RememberMeConfig,
        resolver: &Resolver,
    ) -> Result<RememberMeServices, CompileError> {
        let sources = [
            remember_me.services_ref.is_some(),
            remember_me.token_repository_ref.is_some(),
            remember_me.data_source_ref.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count();
        if sources > 1 {
            return Err(CompileError::WiringAmbiguity {
                resource: "remember-me token source".to_string(),
                message: "services_ref, token_repository_ref and data_source_ref \
                    are mutually exclusive"
                    .to_string(),
            });
        }

        if let Some(name) = &remember_me.services_ref {
            let external_validity = resolver.remember_me_services(name)?;
            if remember_me.token_validity_seconds.is_some()
                && remember_me.token_validity_seconds != external_validity
            {
                return Err(CompileError::validation(
                    "remember_me.token_validity_seconds",
                    "cannot override the validity of externally supplied services",
                ));
            }
            return Ok(RememberMeServices::External {
                services_ref: name.clone(),
                token_validity_seconds: external_validity,
            });
        }

        let validity = remember_me
            .token_validity_seconds
            .unwrap_or(DEFAULT_VALIDITY_SECONDS);

        let store = if let Some(name) = &remember_me.token_repository_ref {
            resolver.token_repository(name)?;
            Some(TokenStore::Repository {
                ref_name: name.clone(),
            })
        } else if let Some(name) = &remember_me.data_source_ref {
            resolver.data_source(name)?;
            Some(TokenStore::DataSource {
                ref_name: name.clone(),
            })
        } else {
            None
        };

        match store {
            Some(store) => {
                if validity < 0 {
                    return Err(CompileError::validation(
                        "remember_me.token_validity_seconds",
                        "a negative validity requires a non-persistent token store",
                    ));
                }
                Ok(RememberMeServices::PersistentToken {
                    store,
                    validity_seconds: validity,
                })
            }
            None => {
                if let Some(name) = &remember_me.user_service_ref {
                    resolver.user_service(name)?;
                }
                Ok(RememberMeServices::TokenBased {
                    key: remember_me
                        .key
                        .clone()
                        .unwrap_or_else(|| DEFAULT_KEY.to_string()),
                    validity_seconds: validity,
                })
            }
        }
    }
}

impl FeatureWirer for RememberMeWirer {
    fn name(&self) -> &'static str {
        "remember-me"
    }

    fn applies(&self, config: &SecurityConfig) -> bool {
        config.remember_me.is_some()
    }

    fn wire(
        &self,
        config: &SecurityConfig,
        resolver: &Resolver,
    ) -> Result<Contribution, CompileError> {
        let remember_me = config
            .remember_me
            .as_ref()
            .ok_or_else(|| CompileError::validation("remember_me", "missing"))?;
        let services = Self::services(remember_me, resolver)?;

        Ok(Contribution::default()
            .filter(
                ChainFilter::RememberMe(RememberMeFilter { services }),
                Placement::Slot(FilterSlot::RememberMe),
            )
            .binding(Binding::LogoutHandler("remember_me_services".to_string())))
    }
}
