//! Feature wiring.
//!
//! Each optional feature is wired by its own [`FeatureWirer`]. A wirer inspects the
//! configuration, decides whether its feature is enabled, validates the feature's own
//! options, and returns a [`Contribution`]: filters with placement directives plus
//! [`Binding`]s describing cross-cutting effects other stages must absorb (an extra
//! logout handler, a shared session registry, the chain's entry point).
//!
//! Wirers never mutate the chain directly. The compiler aggregates contributions and
//! applies bindings in one place, so a failed wirer leaves nothing half-built.

mod channel;
mod concurrent_session;
mod entry_point;
mod remember_me;
mod x509;

pub use channel::ChannelWirer;
pub use concurrent_session::ConcurrentSessionWirer;
pub use entry_point::{AccessDeniedWirer, EntryPointWirer};
pub use remember_me::RememberMeWirer;
pub use x509::X509Wirer;

use std::sync::Arc;

use crate::chain::{ChainFilter, EntryPoint};
use crate::config::SecurityConfig;
use crate::error::CompileError;
use crate::order::Placement;
use crate::resolver::Resolver;
use crate::session::{SessionController, SessionRegistry};

/// A cross-cutting effect a feature imposes on stages it does not own.
#[derive(Debug, Clone)]
pub enum Binding {
    /// Append a handler to the logout stage's handler list.
    LogoutHandler(String),
    /// Share this registry with the session-management stage.
    SessionRegistry(Arc<SessionRegistry>),
    /// Expose this controller on the compiled chain.
    SessionController(Arc<SessionController>),
    /// The chain's authentication entry point.
    EntryPoint(EntryPoint),
    /// Forward target for access-denied responses.
    AccessDeniedPage(String),
}

/// What one feature contributes to the chain.
#[derive(Debug, Default)]
pub struct Contribution {
    pub filters: Vec<(ChainFilter, Placement)>,
    pub bindings: Vec<Binding>,
}

impl Contribution {
    pub fn filter(mut self, filter: ChainFilter, placement: Placement) -> Self {
        self.filters.push((filter, placement));
        self
    }

    pub fn binding(mut self, binding: Binding) -> Self {
        self.bindings.push(binding);
        self
    }
}

/// Wires one optional feature into the chain.
pub trait FeatureWirer {
    /// Short name used in wiring logs.
    fn name(&self) -> &'static str;

    /// Whether the configuration enables this feature.
    fn applies(&self, config: &SecurityConfig) -> bool;

    /// Validate the feature's options and produce its contribution.
    ///
    /// Called only when [`applies`](Self::applies) returned true.
    fn wire(
        &self,
        config: &SecurityConfig,
        resolver: &Resolver,
    ) -> Result<Contribution, CompileError>;
}

/// All built-in wirers, in the order the compiler runs them.
///
/// Entry-point wiring runs last so it can observe which authentication mechanisms the
/// other features enabled.
pub fn built_in_wirers() -> Vec<Box<dyn FeatureWirer>> {
    vec![
        Box::new(ChannelWirer),
        Box::new(ConcurrentSessionWirer),
        Box::new(X509Wirer),
        Box::new(RememberMeWirer),
        Box::new(AccessDeniedWirer),
        Box::new(EntryPointWirer),
    ]
}
