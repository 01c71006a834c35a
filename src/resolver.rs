//! Named reference resolution.
//!
//! Several configuration options point at externally constructed objects by name
//! (`entry_point_ref`, `session_registry_ref`, `token_repository_ref`, ...). The
//! [`Resolver`] is the registry those names resolve against. Lookups are typed: a name
//! that exists but holds the wrong kind of object fails the same way as a missing name,
//! with the expected capability in the error.

use std::collections::HashMap;
use std::sync::Arc;

use crate::chain::EntryPoint;
use crate::error::CompileError;
use crate::session::{SessionController, SessionRegistry};

/// An externally constructed object a configuration reference may point at.
#[derive(Debug, Clone)]
pub enum ExternalObject {
    SessionRegistry(Arc<SessionRegistry>),
    SessionController(Arc<SessionController>),
    EntryPoint(EntryPoint),
    /// A persistent remember-me token repository.
    TokenRepository,
    /// A raw data source a token repository can be built over.
    DataSource,
    /// A complete remember-me services implementation.
    RememberMeServices { token_validity_seconds: Option<i64> },
    /// A security context repository replacing session-backed storage.
    SecurityContextRepository,
    /// A user details service for token-based remember-me.
    UserService,
}

impl ExternalObject {
    fn kind(&self) -> &'static str {
        match self {
            ExternalObject::SessionRegistry(_) => "session registry",
            ExternalObject::SessionController(_) => "session controller",
            ExternalObject::EntryPoint(_) => "authentication entry point",
            ExternalObject::TokenRepository => "token repository",
            ExternalObject::DataSource => "data source",
            ExternalObject::RememberMeServices { .. } => "remember-me services",
            ExternalObject::SecurityContextRepository => "security context repository",
            ExternalObject::UserService => "user service",
        }
    }
}

/// Registry of named external objects consulted during compilation.
#[derive(Debug, Default)]
pub struct Resolver {
    objects: HashMap<String, ExternalObject>,
}

impl Resolver {
    pub fn new() -> Self {
        Resolver {
            objects: HashMap::new(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, object: ExternalObject) -> &mut Self {
        self.objects.insert(name.into(), object);
        self
    }

    fn lookup(&self, name: &str, expected: &'static str) -> Result<&ExternalObject, CompileError> {
        self.objects
            .get(name)
            .ok_or_else(|| CompileError::UnresolvedReference {
                name: name.to_string(),
                expected,
            })
    }

    fn wrong_kind(name: &str, expected: &'static str) -> CompileError {
        CompileError::UnresolvedReference {
            name: name.to_string(),
            expected,
        }
    }

    pub fn session_registry(&self, name: &str) -> Result<Arc<SessionRegistry>, CompileError> {
        const EXPECTED: &str = "session registry";
        match self.lookup(name, EXPECTED)? {
            ExternalObject::SessionRegistry(r) => Ok(Arc::clone(r)),
            // A controller owns a registry; accepting its name keeps a single shared
            // instance across the stages that track sessions.
            ExternalObject::SessionController(c) => Ok(Arc::clone(c.registry())),
            _ => Err(Self::wrong_kind(name, EXPECTED)),
        }
    }

    pub fn session_controller(&self, name: &str) -> Result<Arc<SessionController>, CompileError> {
        const EXPECTED: &str = "session controller";
        match self.lookup(name, EXPECTED)? {
            ExternalObject::SessionController(c) => Ok(Arc::clone(c)),
            _ => Err(Self::wrong_kind(name, EXPECTED)),
        }
    }

    pub fn entry_point(&self, name: &str) -> Result<EntryPoint, CompileError> {
        const EXPECTED: &str = "authentication entry point";
        match self.lookup(name, EXPECTED)? {
            ExternalObject::EntryPoint(e) => Ok(e.clone()),
            _ => Err(Self::wrong_kind(name, EXPECTED)),
        }
    }

    pub fn token_repository(&self, name: &str) -> Result<(), CompileError> {
        const EXPECTED: &str = "token repository";
        match self.lookup(name, EXPECTED)? {
            ExternalObject::TokenRepository => Ok(()),
            _ => Err(Self::wrong_kind(name, EXPECTED)),
        }
    }

    pub fn data_source(&self, name: &str) -> Result<(), CompileError> {
        const EXPECTED: &str = "data source";
        match self.lookup(name, EXPECTED)? {
            ExternalObject::DataSource => Ok(()),
            _ => Err(Self::wrong_kind(name, EXPECTED)),
        }
    }

    pub fn remember_me_services(&self, name: &str) -> Result<Option<i64>, CompileError> {
        const EXPECTED: &str = "remember-me services";
        match self.lookup(name, EXPECTED)? {
            ExternalObject::RememberMeServices {
                token_validity_seconds,
            } => Ok(*token_validity_seconds),
            _ => Err(Self::wrong_kind(name, EXPECTED)),
        }
    }

    pub fn security_context_repository(&self, name: &str) -> Result<(), CompileError> {
        const EXPECTED: &str = "security context repository";
        match self.lookup(name, EXPECTED)? {
            ExternalObject::SecurityContextRepository => Ok(()),
            _ => Err(Self::wrong_kind(name, EXPECTED)),
        }
    }

    pub fn user_service(&self, name: &str) -> Result<(), CompileError> {
        const EXPECTED: &str = "user service";
        match self.lookup(name, EXPECTED)? {
            ExternalObject::UserService => Ok(()),
            _ => Err(Self::wrong_kind(name, EXPECTED)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_name_reports_expected_capability() {
        let resolver = Resolver::new();
        let err = resolver.entry_point("nowhere").unwrap_err();
        match err {
            CompileError::UnresolvedReference { name, expected } => {
                assert_eq!(name, "nowhere");
                assert_eq!(expected, "authentication entry point");
            }
            other => panic!("expected UnresolvedReference, got {other:?}"),
        }
    }

    #[test]
    fn wrong_kind_fails_like_a_missing_name() {
        let mut resolver = Resolver::new();
        resolver.register("ds", ExternalObject::DataSource);
        assert!(resolver.token_repository("ds").is_err());
        assert!(resolver.data_source("ds").is_ok());
    }

    #[test]
    fn controller_reference_yields_its_registry() {
        let registry = Arc::new(SessionRegistry::new());
        let controller = Arc::new(SessionController::new(
            Arc::clone(&registry),
            1,
            Default::default(),
        ));
        let mut resolver = Resolver::new();
        resolver.register("ctl", ExternalObject::SessionController(controller));
        let resolved = resolver.session_registry("ctl").unwrap();
        assert!(Arc::ptr_eq(&resolved, &registry));
    }
}
