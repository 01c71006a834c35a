//! # Portcullis
//!
//! **Portcullis** compiles a declarative security configuration into an ordered filter
//! chain and an access rule index, ready for a request pipeline to execute.
//!
//! ## Overview
//!
//! A configuration names the protection features a deployment wants: form login, basic
//! auth, remember-me tokens, client certificates, concurrent session limits, transport
//! channel requirements, per-URL access rules. Compilation resolves every feature into
//! concrete chain stages, places them in the canonical order, validates cross-feature
//! interactions, and fails loudly on anything ambiguous. A chain either compiles fully
//! or not at all.
//!
//! ## Architecture
//!
//! - **[`config`]** - the declarative configuration tree (serde, YAML-friendly)
//! - **[`matcher`]** - ant-style and regex request pattern matching
//! - **[`access`]** - the compiled access rule index queried at authorization time
//! - **[`order`]** - canonical slot ranks and placement resolution
//! - **[`wirers`]** - one wirer per optional feature, contributing stages and bindings
//! - **[`resolver`]** - typed lookup of externally supplied objects by name
//! - **[`session`]** - the shared session registry and admission controller
//! - **[`chain`]** - the compiled stage types and the finished [`CompiledChain`]
//! - **[`compiler`]** - the orchestration that ties the above together
//!
//! ## Example
//!
//! ```
//! use portcullis::{ChainCompiler, Resolver, SecurityConfig};
//!
//! let config: SecurityConfig = serde_yaml::from_str(
//!     r#"
//!     auto_config: true
//!     intercept_urls:
//!       - pattern: /secure/**
//!         access: ROLE_USER
//!     "#,
//! )
//! .unwrap();
//!
//! let chain = ChainCompiler::new(Resolver::new()).compile(&config).unwrap();
//! assert!(chain.stage("form_login").is_some());
//! ```

pub mod access;
pub mod chain;
pub mod compiler;
pub mod config;
pub mod error;
pub mod matcher;
pub mod order;
pub mod resolver;
pub mod session;
pub mod wirers;

pub use access::{AccessRule, AccessRuleIndex, ConfigAttribute};
pub use chain::{ChainFilter, CompiledChain, EntryPoint, PortMapper, RememberMeServices};
pub use compiler::ChainCompiler;
pub use config::{load_config, SecurityConfig};
pub use error::{CompileError, PlacementError};
pub use matcher::{PathMatcher, PathSyntax};
pub use order::{FilterOrderRegistry, FilterSlot, Placement};
pub use resolver::{ExternalObject, Resolver};
pub use session::{ExceededPolicy, SessionController, SessionRegistry};
