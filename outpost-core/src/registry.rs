//! Thread-safe method registry using DashMap.
//!
//! Holds every method declaration a process exposes, tracks the
//! visibility and binding facts eligibility is judged on, and runs
//! handlers for requests arriving from the peer.

use std::fmt;
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use serde_json::Value;

use crate::error::{EligibilityError, OutpostError, OutpostResult};
use crate::types::MethodPath;
use crate::wire::{
    CallOutcome, MethodFault, FAULT_INELIGIBLE_METHOD, FAULT_PANIC, FAULT_UNKNOWN_METHOD,
};

/// Handler body for a concrete method declaration.
///
/// Handlers are synchronous and CPU-bound from the registry's point
/// of view; the dispatcher moves them onto the blocking pool so a
/// slow handler never stalls the channel receive loop.
pub type MethodHandler = Arc<dyn Fn(Vec<Value>) -> Result<Value, MethodFault> + Send + Sync>;

/// Visibility of a method declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
}

/// Binding of a method declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Static,
    Instance,
}

/// A declared method: its path, the facts remote eligibility is
/// judged on, and the handler body if the declaration is concrete.
#[derive(Clone)]
pub struct MethodDecl {
    pub path: MethodPath,
    pub visibility: Visibility,
    pub binding: Binding,
    pub handler: Option<MethodHandler>,
}

impl MethodDecl {
    pub fn new(
        path: MethodPath,
        visibility: Visibility,
        binding: Binding,
        handler: Option<MethodHandler>,
    ) -> Self {
        Self {
            path,
            visibility,
            binding,
            handler,
        }
    }

    /// The common case: a public static declaration with a body.
    pub fn public_static<F>(path: MethodPath, handler: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<Value, MethodFault> + Send + Sync + 'static,
    {
        Self::new(
            path,
            Visibility::Public,
            Binding::Static,
            Some(Arc::new(handler)),
        )
    }

    /// A declaration without a handler body.
    pub fn is_abstract(&self) -> bool {
        self.handler.is_none()
    }
}

impl fmt::Debug for MethodDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDecl")
            .field("path", &self.path)
            .field("visibility", &self.visibility)
            .field("binding", &self.binding)
            .field("has_handler", &self.handler.is_some())
            .finish()
    }
}

/// Thread-safe registry of method declarations.
/// Uses DashMap for lock-free concurrent access.
#[derive(Debug, Default)]
pub struct MethodRegistry {
    /// Map of method path to declaration.
    methods: DashMap<MethodPath, MethodDecl>,
}

static GLOBAL_REGISTRY: OnceLock<Arc<MethodRegistry>> = OnceLock::new();

impl MethodRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            methods: DashMap::new(),
        }
    }

    /// Create a registry wrapped in an Arc for sharing across threads.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Process-wide registry backing the implicit root domain.
    pub fn global() -> Arc<Self> {
        Arc::clone(GLOBAL_REGISTRY.get_or_init(Self::new_shared))
    }

    /// Register a public static method with a handler body.
    /// Returns MethodAlreadyDeclared if the path is taken.
    pub fn register<F>(&self, path: &str, handler: F) -> OutpostResult<()>
    where
        F: Fn(Vec<Value>) -> Result<Value, MethodFault> + Send + Sync + 'static,
    {
        let path = MethodPath::new(path).map_err(OutpostError::Validation)?;
        self.declare(MethodDecl::public_static(path, handler))
    }

    /// Add a declaration with explicit visibility and binding.
    pub fn declare(&self, decl: MethodDecl) -> OutpostResult<()> {
        // Check for duplicate - fail fast
        if self.methods.contains_key(&decl.path) {
            return Err(OutpostError::MethodAlreadyDeclared(decl.path));
        }
        self.methods.insert(decl.path.clone(), decl);
        Ok(())
    }

    /// Judge whether a path may be invoked across the process boundary.
    ///
    /// Checked in order: the path must be declared, public, static,
    /// and concrete. The first failing fact is reported.
    pub fn check_eligibility(&self, path: &MethodPath) -> Result<(), EligibilityError> {
        let decl = self
            .methods
            .get(path)
            .ok_or_else(|| EligibilityError::UnknownMethod { path: path.clone() })?;

        if decl.visibility == Visibility::Private {
            return Err(EligibilityError::PrivateMethod { path: path.clone() });
        }
        if decl.binding == Binding::Instance {
            return Err(EligibilityError::InstanceMethod { path: path.clone() });
        }
        if decl.is_abstract() {
            return Err(EligibilityError::AbstractMethod { path: path.clone() });
        }
        Ok(())
    }

    /// Check if a path is declared.
    pub fn contains(&self, path: &MethodPath) -> bool {
        self.methods.contains_key(path)
    }

    /// Number of declarations.
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// All declared paths.
    pub fn method_paths(&self) -> Vec<MethodPath> {
        self.methods.iter().map(|r| r.key().clone()).collect()
    }

    /// Execute a declared method locally and report its outcome.
    ///
    /// Eligibility failures come back as faults rather than errors so
    /// the callee can answer a bad request instead of tearing down the
    /// channel. The handler runs on the blocking pool; a panic inside
    /// it is caught and reported as a fault.
    pub async fn dispatch(&self, path: &MethodPath, args: Vec<Value>) -> CallOutcome {
        // Scope the map guard: it must not be held across the await.
        let handler = {
            if let Err(e) = self.check_eligibility(path) {
                let kind = match e {
                    EligibilityError::UnknownMethod { .. } => FAULT_UNKNOWN_METHOD,
                    _ => FAULT_INELIGIBLE_METHOD,
                };
                return CallOutcome::fault(MethodFault::new(kind, e.to_string()));
            }
            match self.methods.get(path).and_then(|d| d.handler.clone()) {
                Some(handler) => handler,
                // Declaration removed between the check and the fetch.
                None => {
                    return CallOutcome::fault(MethodFault::new(
                        FAULT_UNKNOWN_METHOD,
                        format!("no declaration for {path}"),
                    ))
                }
            }
        };

        tracing::debug!(method = %path, args = args.len(), "Dispatching method");

        match tokio::task::spawn_blocking(move || handler(args)).await {
            Ok(Ok(value)) => CallOutcome::ok(value),
            Ok(Err(fault)) => CallOutcome::fault(fault),
            Err(join_err) if join_err.is_panic() => {
                let panic = join_err.into_panic();
                let message = if let Some(s) = panic.downcast_ref::<&str>() {
                    (*s).to_string()
                } else if let Some(s) = panic.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "handler panicked".to_string()
                };
                tracing::warn!(method = %path, message = %message, "Handler panicked");
                CallOutcome::fault(MethodFault::new(FAULT_PANIC, message))
            }
            Err(_) => CallOutcome::fault(MethodFault::new(FAULT_PANIC, "handler was cancelled")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(s: &str) -> MethodPath {
        MethodPath::new(s).unwrap()
    }

    #[test]
    fn test_register_and_contains() {
        let registry = MethodRegistry::new();
        registry
            .register("calc::add", |_args| Ok(json!(null)))
            .unwrap();
        assert!(registry.contains(&path("calc::add")));
        assert_eq!(registry.len(), 1);
        assert!(!registry.is_empty());
    }

    #[test]
    fn test_duplicate_declaration_rejected() {
        let registry = MethodRegistry::new();
        registry.register("calc::add", |_| Ok(json!(1))).unwrap();
        let err = registry.register("calc::add", |_| Ok(json!(2)));
        assert!(matches!(err, Err(OutpostError::MethodAlreadyDeclared(_))));
    }

    #[test]
    fn test_register_rejects_invalid_path() {
        let registry = MethodRegistry::new();
        assert!(registry.register("noseparator", |_| Ok(json!(null))).is_err());
    }

    #[test]
    fn test_eligibility_checks_in_order() {
        let registry = MethodRegistry::new();
        registry
            .declare(MethodDecl::new(
                path("m::private"),
                Visibility::Private,
                Binding::Static,
                Some(Arc::new(|_| Ok(json!(null)))),
            ))
            .unwrap();
        registry
            .declare(MethodDecl::new(
                path("m::instance"),
                Visibility::Public,
                Binding::Instance,
                Some(Arc::new(|_| Ok(json!(null)))),
            ))
            .unwrap();
        registry
            .declare(MethodDecl::new(
                path("m::abstract"),
                Visibility::Public,
                Binding::Static,
                None,
            ))
            .unwrap();

        assert!(matches!(
            registry.check_eligibility(&path("m::missing")),
            Err(EligibilityError::UnknownMethod { .. })
        ));
        assert!(matches!(
            registry.check_eligibility(&path("m::private")),
            Err(EligibilityError::PrivateMethod { .. })
        ));
        assert!(matches!(
            registry.check_eligibility(&path("m::instance")),
            Err(EligibilityError::InstanceMethod { .. })
        ));
        assert!(matches!(
            registry.check_eligibility(&path("m::abstract")),
            Err(EligibilityError::AbstractMethod { .. })
        ));
    }

    #[test]
    fn test_eligibility_ok_for_public_static_concrete() {
        let registry = MethodRegistry::new();
        registry.register("calc::add", |_| Ok(json!(null))).unwrap();
        assert!(registry.check_eligibility(&path("calc::add")).is_ok());
    }

    #[tokio::test]
    async fn test_dispatch_ok() {
        let registry = MethodRegistry::new();
        registry
            .register("calc::add", |args| {
                let a = args[0].as_i64().unwrap_or(0);
                let b = args[1].as_i64().unwrap_or(0);
                Ok(json!(a + b))
            })
            .unwrap();

        let outcome = registry
            .dispatch(&path("calc::add"), vec![json!(2), json!(3)])
            .await;
        assert_eq!(outcome, CallOutcome::ok(json!(5)));
    }

    #[tokio::test]
    async fn test_dispatch_handler_fault_passthrough() {
        let registry = MethodRegistry::new();
        registry
            .register("calc::boom", |_| {
                Err(MethodFault::invalid_operation("boom"))
            })
            .unwrap();

        let outcome = registry.dispatch(&path("calc::boom"), vec![]).await;
        match outcome {
            CallOutcome::Err { fault } => {
                assert_eq!(fault.kind, crate::wire::FAULT_INVALID_OPERATION);
                assert_eq!(fault.message, "boom");
            }
            other => panic!("expected fault, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_dispatch_unknown_method_fault() {
        let registry = MethodRegistry::new();
        let outcome = registry.dispatch(&path("calc::missing"), vec![]).await;
        match outcome {
            CallOutcome::Err { fault } => assert_eq!(fault.kind, FAULT_UNKNOWN_METHOD),
            other => panic!("expected fault, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_dispatch_ineligible_method_fault() {
        let registry = MethodRegistry::new();
        registry
            .declare(MethodDecl::new(
                path("m::hidden"),
                Visibility::Private,
                Binding::Static,
                Some(Arc::new(|_| Ok(json!(null)))),
            ))
            .unwrap();

        let outcome = registry.dispatch(&path("m::hidden"), vec![]).await;
        match outcome {
            CallOutcome::Err { fault } => {
                assert_eq!(fault.kind, FAULT_INELIGIBLE_METHOD);
                assert!(fault.message.contains("private"));
            }
            other => panic!("expected fault, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_dispatch_panic_becomes_fault() {
        let registry = MethodRegistry::new();
        registry
            .register("m::panics", |_| panic!("deliberate test panic"))
            .unwrap();

        let outcome = registry.dispatch(&path("m::panics"), vec![]).await;
        match outcome {
            CallOutcome::Err { fault } => {
                assert_eq!(fault.kind, FAULT_PANIC);
                assert!(fault.message.contains("deliberate test panic"));
            }
            other => panic!("expected fault, got {other:?}"),
        }
    }

    #[test]
    fn test_concurrent_registration() {
        use std::thread;

        let registry = MethodRegistry::new_shared();

        let handles: Vec<_> = (0..10)
            .map(|i| {
                let reg = Arc::clone(&registry);
                thread::spawn(move || {
                    reg.register(&format!("mod{}::method", i), |_| Ok(json!(null)))
                        .unwrap();
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.len(), 10);
    }

    #[test]
    fn test_global_registry_is_shared() {
        let a = MethodRegistry::global();
        let b = MethodRegistry::global();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
