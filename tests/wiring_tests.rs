//! Cross-feature wiring: shared session state, reference resolution and the
//! ambiguity/validation rules that span more than one feature.

use std::sync::Arc;

use portcullis::chain::ChainFilter;
use portcullis::{
    ChainCompiler, CompileError, CompiledChain, EntryPoint, ExceededPolicy, ExternalObject,
    Resolver, SecurityConfig, SessionController, SessionRegistry,
};

fn compile_with(yaml: &str, resolver: Resolver) -> Result<CompiledChain, CompileError> {
    let config: SecurityConfig = serde_yaml::from_str(yaml).expect("test yaml must parse");
    ChainCompiler::new(resolver).compile(&config)
}

fn compile(yaml: &str) -> Result<CompiledChain, CompileError> {
    compile_with(yaml, Resolver::new())
}

#[test]
fn one_registry_is_shared_across_every_session_aware_component() {
    let chain = compile(
        "auto_config: true\nconcurrent_session_control:\n  max_sessions: 1\n",
    )
    .unwrap();

    let Some(ChainFilter::ConcurrentSession(filter)) = chain.stage("concurrent_session") else {
        panic!("expected concurrent session stage");
    };
    let Some(ChainFilter::SessionManagement(management)) = chain.stage("session_management")
    else {
        panic!("expected session management stage");
    };
    let controller = chain.session_controller().expect("controller wired");

    let registry = management.registry.as_ref().expect("registry bound");
    assert!(Arc::ptr_eq(&filter.registry, registry));
    assert!(Arc::ptr_eq(controller.registry(), registry));
}

#[test]
fn external_registry_is_adopted_not_replaced() {
    let registry = Arc::new(SessionRegistry::new());
    let mut resolver = Resolver::new();
    resolver.register("reg", ExternalObject::SessionRegistry(Arc::clone(&registry)));

    let chain = compile_with(
        "auto_config: true\nconcurrent_session_control:\n  session_registry_ref: reg\n",
        resolver,
    )
    .unwrap();
    let controller = chain.session_controller().unwrap();
    assert!(Arc::ptr_eq(controller.registry(), &registry));
}

#[test]
fn concurrency_control_and_controller_ref_cannot_coexist() {
    let mut resolver = Resolver::new();
    let registry = Arc::new(SessionRegistry::new());
    resolver.register(
        "ctl",
        ExternalObject::SessionController(Arc::new(SessionController::new(
            registry,
            1,
            ExceededPolicy::RejectLogin,
        ))),
    );
    let err = compile_with(
        "auto_config: true\nsession_controller_ref: ctl\n\
         concurrent_session_control:\n  max_sessions: 1\n",
        resolver,
    )
    .unwrap_err();
    assert!(matches!(err, CompileError::WiringAmbiguity { .. }));
}

#[test]
fn standalone_controller_ref_is_exposed_on_the_chain() {
    let registry = Arc::new(SessionRegistry::new());
    let controller = Arc::new(SessionController::new(
        Arc::clone(&registry),
        3,
        ExceededPolicy::RejectLogin,
    ));
    let mut resolver = Resolver::new();
    resolver.register("ctl", ExternalObject::SessionController(Arc::clone(&controller)));

    let chain = compile_with("auto_config: true\nsession_controller_ref: ctl\n", resolver)
        .unwrap();
    let exposed = chain.session_controller().unwrap();
    assert!(Arc::ptr_eq(exposed, &controller));
}

#[test]
fn stateless_chain_rejects_a_context_repository_reference() {
    let mut resolver = Resolver::new();
    resolver.register("repo", ExternalObject::SecurityContextRepository);
    let err = compile_with(
        "auto_config: true\ncreate_session: never\nsecurity_context_repository_ref: repo\n",
        resolver,
    )
    .unwrap_err();
    assert!(matches!(err, CompileError::Validation { ref field, .. }
        if field == "create_session"));
}

#[test]
fn context_repository_reference_must_resolve() {
    let err = compile(
        "auto_config: true\nsecurity_context_repository_ref: missing\n",
    )
    .unwrap_err();
    assert!(matches!(err, CompileError::UnresolvedReference { ref name, .. }
        if name == "missing"));
}

#[test]
fn explicit_entry_point_overrides_the_derived_one() {
    let mut resolver = Resolver::new();
    resolver.register(
        "openid",
        ExternalObject::EntryPoint(EntryPoint::External {
            name: "openid".into(),
        }),
    );
    let chain = compile_with("auto_config: true\nentry_point_ref: openid\n", resolver)
        .unwrap();
    let Some(ChainFilter::ExceptionTranslation(translation)) =
        chain.stage("exception_translation")
    else {
        panic!("expected exception translation stage");
    };
    assert_eq!(
        translation.entry_point,
        EntryPoint::External { name: "openid".into() }
    );
}

#[test]
fn access_denied_page_reaches_exception_translation() {
    let chain = compile("auto_config: true\naccess_denied_page: /denied\n").unwrap();
    let Some(ChainFilter::ExceptionTranslation(translation)) =
        chain.stage("exception_translation")
    else {
        panic!("expected exception translation stage");
    };
    assert_eq!(translation.access_denied.error_page.as_deref(), Some("/denied"));
}

#[test]
fn basic_only_chain_uses_a_basic_entry_point() {
    let chain = compile("http_basic:\n  realm: Internal\n").unwrap();
    let Some(ChainFilter::ExceptionTranslation(translation)) =
        chain.stage("exception_translation")
    else {
        panic!("expected exception translation stage");
    };
    assert_eq!(
        translation.entry_point,
        EntryPoint::BasicAuth { realm: "Internal".into() }
    );
    assert!(chain.stage("form_login").is_none());
}

#[test]
fn chain_without_an_entry_point_source_fails() {
    let err = compile("anonymous: {}\n").unwrap_err();
    assert!(matches!(err, CompileError::Validation { .. }));
}

#[test]
fn persistent_remember_me_with_negative_validity_fails_compile() {
    let mut resolver = Resolver::new();
    resolver.register("tokens", ExternalObject::TokenRepository);
    let err = compile_with(
        r#"
        auto_config: true
        remember_me:
          token_repository_ref: tokens
          token_validity_seconds: -1
        "#,
        resolver,
    )
    .unwrap_err();
    assert!(matches!(err, CompileError::Validation { .. }));
}

#[test]
fn non_persistent_remember_me_accepts_negative_validity() {
    let chain = compile(
        "auto_config: true\nremember_me:\n  key: k\n  token_validity_seconds: -1\n",
    )
    .unwrap();
    assert!(chain.stage("remember_me").is_some());
}

#[test]
fn registered_sessions_are_visible_through_the_compiled_chain() {
    let chain = compile(
        r#"
        auto_config: true
        concurrent_session_control:
          max_sessions: 2
          exception_if_maximum_exceeded: true
        "#,
    )
    .unwrap();
    let controller = chain.session_controller().unwrap();
    controller.register_login("carol", "s1");
    controller.register_login("carol", "s2");
    assert!(controller.check_login_allowed("carol").is_err());

    let Some(ChainFilter::ConcurrentSession(filter)) = chain.stage("concurrent_session") else {
        panic!("expected concurrent session stage");
    };
    assert_eq!(filter.registry.session_count("carol"), 2);
}
