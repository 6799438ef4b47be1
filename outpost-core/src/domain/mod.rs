//! Isolation domains and transparent cross-process invocation.
//!
//! A domain pairs a method registry with one end of a private framed
//! channel. Calls made through [`Domain::execute`] are marshaled to
//! the peer process, executed against its registry, and the outcome
//! is routed back to the awaiting caller by message id. The root
//! domain has no channel and executes calls in-process.

mod lifecycle;
mod pending;

pub use lifecycle::{DomainState, LifecycleEvents};
pub use pending::{CallReply, PendingCalls};

use std::fmt;
use std::sync::{Arc, Mutex as StdMutex, OnceLock, PoisonError};

use serde_json::Value;
use tokio::sync::{oneshot, watch};

use crate::config::DomainOptions;
use crate::error::{OutpostError, OutpostResult};
use crate::registry::MethodRegistry;
use crate::supervisor;
use crate::transport::{self, FrameReader, FrameWriter, FramedChannel, RendezvousPoint};
use crate::types::{DomainName, MessageId, MethodPath, RendezvousName, WorkerPath};
use crate::wire::{
    self, CallOutcome, InvokeRequest, InvokeResponse, MethodFault, WireMessage,
    FAULT_SERIALIZATION,
};

// =============================================================================
// Disconnect Reasons
// =============================================================================

/// Why a domain's channel stopped carrying messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The peer closed its end of the channel.
    PeerDisconnected,
    /// The peer process is no longer running.
    PeerProcessExited,
    /// The channel failed mid-session and cannot be trusted.
    TransportFailure(String),
    /// This side shut the domain down.
    LocalShutdown,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PeerDisconnected => write!(f, "peer closed the channel"),
            Self::PeerProcessExited => write!(f, "peer process exited"),
            Self::TransportFailure(detail) => write!(f, "transport failure: {detail}"),
            Self::LocalShutdown => write!(f, "local shutdown"),
        }
    }
}

/// Which side of the process pair a domain sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainRole {
    /// The implicit in-process domain; no channel, no peer.
    Root,
    /// The creating side: spawned the worker and holds its pid.
    Parent,
    /// The worker side: attached to the creator's rendezvous.
    Child,
}

// =============================================================================
// Domain
// =============================================================================

static CURRENT_DOMAIN: OnceLock<Arc<Domain>> = OnceLock::new();

/// An isolation domain bound to one end of a private channel.
pub struct Domain {
    name: DomainName,
    role: DomainRole,
    options: DomainOptions,
    registry: Arc<MethodRegistry>,
    /// None only for the root domain.
    writer: Option<Arc<FrameWriter>>,
    pending: PendingCalls,
    lifecycle: LifecycleEvents,
    /// Set exactly once with the disconnect reason.
    closed: watch::Sender<Option<DisconnectReason>>,
    child_pid: Option<u32>,
    /// Signals the worker watcher to kill the child on local close.
    kill_child: StdMutex<Option<oneshot::Sender<()>>>,
}

impl Domain {
    /// Create a child domain: spawn the worker and wait for it to
    /// attach to the rendezvous point.
    ///
    /// The rendezvous socket is bound before the worker is spawned,
    /// so the worker never races the listener. If the worker fails
    /// to attach in time it is killed and the error is returned.
    pub async fn create(
        name: DomainName,
        worker: &WorkerPath,
        registry: Arc<MethodRegistry>,
        options: DomainOptions,
    ) -> OutpostResult<Arc<Self>> {
        let rendezvous = RendezvousName::for_current_process(name.clone());
        let point = RendezvousPoint::create(&rendezvous, &options)?;

        let spawned = supervisor::spawn_worker(worker, &rendezvous, &options)?;
        let pid = spawned.pid();

        let channel = match point.accept(&options).await {
            Ok(channel) => channel,
            Err(e) => {
                // The worker never attached; reap it before failing.
                let mut child = spawned.into_child();
                let _ = child.start_kill();
                let _ = child.wait().await;
                return Err(e.into());
            }
        };
        drop(point);

        let (kill_tx, kill_rx) = oneshot::channel();
        let domain = Self::attach_inner(
            name,
            DomainRole::Parent,
            channel,
            registry,
            options,
            Some(pid),
            Some(kill_tx),
        );

        // Watch the worker: its exit closes the domain, and a local
        // close kills the worker.
        let watcher = Arc::clone(&domain);
        let mut child = spawned.into_child();
        tokio::spawn(async move {
            tokio::select! {
                status = child.wait() => {
                    if let Ok(status) = status {
                        tracing::info!(pid = pid, status = %status, "Worker process exited");
                    }
                    watcher.close(DisconnectReason::PeerProcessExited);
                }
                _ = kill_rx => {
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                    tracing::debug!(pid = pid, "Worker process stopped");
                }
            }
        });

        tracing::info!(domain = %domain.name, pid = pid, "Child domain created");
        Ok(domain)
    }

    /// Attach to a rendezvous point bound by the creating process.
    /// Called from inside the spawned worker.
    ///
    /// Starts a watcher on the creator's pid: once that process is
    /// gone the domain closes and its unload events fire, even if the
    /// creator never said goodbye.
    pub async fn connect_child(
        rendezvous: &RendezvousName,
        registry: Arc<MethodRegistry>,
        options: DomainOptions,
    ) -> OutpostResult<Arc<Self>> {
        let channel = transport::connect(rendezvous, &options).await?;
        let parent_pid = rendezvous.token().value();
        let poll = options.parent_poll_interval;

        let domain = Self::attach_inner(
            rendezvous.domain().clone(),
            DomainRole::Child,
            channel,
            registry,
            options,
            None,
            None,
        );

        // The watcher ends with the domain: either the creator dies,
        // or a close from elsewhere releases it.
        let watcher = Arc::clone(&domain);
        let mut closed_rx = domain.closed.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                _ = closed_rx.wait_for(|reason| reason.is_some()) => {}
                _ = supervisor::wait_for_process_exit(parent_pid, poll) => {
                    watcher.close(DisconnectReason::PeerProcessExited);
                }
            }
        });

        tracing::info!(domain = %domain.name, parent_pid = parent_pid, "Attached to parent domain");
        Ok(domain)
    }

    /// Attach a domain to an already-established channel.
    ///
    /// No process supervision is wired up; the domain closes when the
    /// channel does. Useful for same-process pairs.
    pub fn attach(
        name: DomainName,
        role: DomainRole,
        channel: FramedChannel,
        registry: Arc<MethodRegistry>,
        options: DomainOptions,
    ) -> Arc<Self> {
        Self::attach_inner(name, role, channel, registry, options, None, None)
    }

    fn attach_inner(
        name: DomainName,
        role: DomainRole,
        channel: FramedChannel,
        registry: Arc<MethodRegistry>,
        options: DomainOptions,
        child_pid: Option<u32>,
        kill_child: Option<oneshot::Sender<()>>,
    ) -> Arc<Self> {
        let (reader, writer) = channel.split();
        let (closed_tx, closed_rx) = watch::channel(None);

        let domain = Arc::new(Self {
            name,
            role,
            options,
            registry,
            writer: Some(writer),
            pending: PendingCalls::new(),
            lifecycle: LifecycleEvents::new(),
            closed: closed_tx,
            child_pid,
            kill_child: StdMutex::new(kill_child),
        });

        let loop_domain = Arc::clone(&domain);
        tokio::spawn(async move {
            receive_loop(loop_domain, reader, closed_rx).await;
        });

        domain
    }

    /// The implicit root domain: no channel, calls execute locally.
    pub fn root(registry: Arc<MethodRegistry>, options: DomainOptions) -> Arc<Self> {
        let (closed_tx, _) = watch::channel(None);
        Arc::new(Self {
            name: DomainName::root(),
            role: DomainRole::Root,
            options,
            registry,
            writer: None,
            pending: PendingCalls::new(),
            lifecycle: LifecycleEvents::new(),
            closed: closed_tx,
            child_pid: None,
            kill_child: StdMutex::new(None),
        })
    }

    /// Install `domain` as this process's current domain.
    /// Fails if one is already installed.
    pub fn init_current(domain: Arc<Self>) -> OutpostResult<()> {
        CURRENT_DOMAIN
            .set(domain)
            .map_err(|_| OutpostError::CurrentDomainAlreadySet)
    }

    /// The process's current domain. Falls back to a lazily created
    /// root domain over the global registry.
    pub fn current() -> Arc<Self> {
        Arc::clone(CURRENT_DOMAIN.get_or_init(|| {
            Domain::root(MethodRegistry::global(), DomainOptions::default())
        }))
    }

    // =========================================================================
    // Invocation
    // =========================================================================

    /// Execute a declared method and await its result.
    ///
    /// For channel-backed domains the call is marshaled to the peer;
    /// for the root domain it dispatches locally. Eligibility is
    /// judged before anything is written to the transport, so an
    /// ineligible call never produces wire traffic.
    pub async fn execute(&self, method: &str, args: Vec<Value>) -> OutpostResult<Value> {
        let path = MethodPath::new(method).map_err(OutpostError::Validation)?;

        if let Some(reason) = self.close_reason() {
            return Err(OutpostError::DomainClosed {
                reason: reason.to_string(),
            });
        }

        self.registry.check_eligibility(&path)?;

        let Some(writer) = &self.writer else {
            return self
                .registry
                .dispatch(&path, args)
                .await
                .into_result()
                .map_err(OutpostError::Remote);
        };

        let id = MessageId::new();
        // The waiter must exist before the request bytes leave, or a
        // fast peer could answer into the void.
        let reply_rx = self.pending.register(id);

        let request = InvokeRequest {
            id,
            method: path.clone(),
            args,
        };
        let payload = match wire::encode_request(&request) {
            Ok(payload) => payload,
            Err(e) => {
                self.pending.abandon(id);
                return Err(e.into());
            }
        };

        if let Err(e) = writer.send(&payload).await {
            self.pending.abandon(id);
            return Err(e);
        }

        tracing::debug!(domain = %self.name, method = %path, id = %id, "Invocation sent");

        let reply = match self.options.call_timeout {
            Some(limit) => match tokio::time::timeout(limit, reply_rx).await {
                Ok(reply) => reply,
                Err(_) => {
                    self.pending.abandon(id);
                    return Err(OutpostError::CallTimeout {
                        method: path.to_string(),
                        waited_ms: limit.as_millis() as u64,
                    });
                }
            },
            None => reply_rx.await,
        };

        match reply {
            Ok(Ok(outcome)) => outcome.into_result().map_err(OutpostError::Remote),
            Ok(Err(reason)) => Err(OutpostError::DomainClosed {
                reason: reason.to_string(),
            }),
            Err(_) => {
                let reason = self
                    .close_reason()
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| "channel torn down".to_string());
                Err(OutpostError::DomainClosed { reason })
            }
        }
    }

    /// Route one decoded payload: responses resolve waiting calls,
    /// requests dispatch concurrently and answer over the writer.
    fn handle_payload(self: &Arc<Self>, payload: &[u8]) {
        match wire::decode(payload) {
            Ok(WireMessage::Response(response)) => {
                if !self.pending.resolve(response.id, response.outcome) {
                    tracing::debug!(
                        domain = %self.name,
                        id = %response.id,
                        "Discarding response with no waiting call"
                    );
                }
            }
            Ok(WireMessage::Request(request)) => {
                if let Some(writer) = &self.writer {
                    let registry = Arc::clone(&self.registry);
                    let writer = Arc::clone(writer);
                    let domain = self.name.clone();
                    tokio::spawn(async move {
                        dispatch_request(domain, registry, writer, request).await;
                    });
                }
            }
            Err(e) => {
                // Framing was intact, only this payload is bad; the
                // channel stays up.
                tracing::warn!(domain = %self.name, error = %e, "Skipping undecodable payload");
            }
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Record the disconnect reason and tear the domain down.
    ///
    /// Idempotent: only the first caller performs teardown. Fails all
    /// pending calls, stops the receive loop, kills a spawned worker,
    /// and fires the unload events in order.
    pub fn close(&self, reason: DisconnectReason) -> bool {
        let mut first = false;
        self.closed.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(reason.clone());
                first = true;
                true
            } else {
                false
            }
        });
        if !first {
            return false;
        }

        tracing::info!(domain = %self.name, reason = %reason, "Domain closing");

        let failed = self.pending.fail_all(&reason);
        if failed > 0 {
            tracing::debug!(domain = %self.name, calls = failed, "Failed pending calls");
        }

        if let Some(writer) = &self.writer {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                let writer = Arc::clone(writer);
                handle.spawn(async move { writer.close().await });
            }
        }

        let kill_tx = self
            .kill_child
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(tx) = kill_tx {
            let _ = tx.send(());
        }

        self.lifecycle.fire_unload();
        true
    }

    /// Close with [`DisconnectReason::LocalShutdown`].
    pub fn shutdown(&self) -> bool {
        self.close(DisconnectReason::LocalShutdown)
    }

    /// Resolve once the domain has closed, with the reason.
    pub async fn wait_closed(&self) -> DisconnectReason {
        let mut rx = self.closed.subscribe();
        loop {
            if let Some(reason) = rx.borrow_and_update().clone() {
                return reason;
            }
            if rx.changed().await.is_err() {
                return DisconnectReason::LocalShutdown;
            }
        }
    }

    /// Register an observer for the start of teardown.
    pub fn on_unloading(&self, observer: impl FnOnce() + Send + 'static) -> OutpostResult<()> {
        self.lifecycle
            .on_unloading(observer)
            .map_err(OutpostError::Lifecycle)
    }

    /// Register an observer for the end of teardown.
    pub fn on_unloaded(&self, observer: impl FnOnce() + Send + 'static) -> OutpostResult<()> {
        self.lifecycle
            .on_unloaded(observer)
            .map_err(OutpostError::Lifecycle)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn name(&self) -> &DomainName {
        &self.name
    }

    pub fn role(&self) -> DomainRole {
        self.role
    }

    pub fn options(&self) -> &DomainOptions {
        &self.options
    }

    pub fn registry(&self) -> &Arc<MethodRegistry> {
        &self.registry
    }

    pub fn state(&self) -> DomainState {
        self.lifecycle.state()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.borrow().is_some()
    }

    pub fn close_reason(&self) -> Option<DisconnectReason> {
        self.closed.borrow().clone()
    }

    /// Pid of the spawned worker, for parent-side domains.
    pub fn child_pid(&self) -> Option<u32> {
        self.child_pid
    }

    /// Number of calls currently awaiting a response.
    pub fn pending_calls(&self) -> usize {
        self.pending.len()
    }
}

// =============================================================================
// Receive Loop
// =============================================================================

/// Pump frames off the channel until it closes or the domain does.
async fn receive_loop(
    domain: Arc<Domain>,
    mut reader: FrameReader,
    mut closed_rx: watch::Receiver<Option<DisconnectReason>>,
) {
    let reason = loop {
        tokio::select! {
            _ = closed_rx.changed() => {
                // Local close already recorded the reason.
                return;
            }
            frame = reader.recv() => match frame {
                Ok(Some(payload)) => domain.handle_payload(&payload),
                Ok(None) => break DisconnectReason::PeerDisconnected,
                Err(e) => {
                    tracing::error!(domain = %domain.name, error = %e, "Channel failed");
                    break DisconnectReason::TransportFailure(e.to_string());
                }
            }
        }
    };
    domain.close(reason);
}

/// Execute one inbound request and send the response back.
///
/// A response that fails to encode, or whose frame exceeds the
/// channel limit, is replaced by a serialization fault under the same
/// id; the fault is small enough for any configured limit, so the
/// caller gets an answer instead of waiting out its deadline.
async fn dispatch_request(
    domain: DomainName,
    registry: Arc<MethodRegistry>,
    writer: Arc<FrameWriter>,
    request: InvokeRequest,
) {
    let id = request.id;
    let outcome = registry.dispatch(&request.method, request.args).await;
    let response = InvokeResponse { id, outcome };

    let sent = match wire::encode_response(&response) {
        Ok(payload) => writer.send(&payload).await,
        Err(e) => Err(e.into()),
    };
    let Err(e) = sent else { return };

    tracing::warn!(
        domain = %domain,
        id = %id,
        error = %e,
        "Replacing undeliverable response with fault"
    );
    let fallback = InvokeResponse {
        id,
        outcome: CallOutcome::fault(MethodFault::new(
            FAULT_SERIALIZATION,
            format!("response could not be delivered: {e}"),
        )),
    };
    let resent = match wire::encode_response(&fallback) {
        Ok(payload) => writer.send(&payload).await,
        Err(e) => Err(e.into()),
    };
    if let Err(e) = resent {
        tracing::error!(domain = %domain, id = %id, error = %e, "Failed to send fault response");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EligibilityError;
    use serde_json::json;

    fn test_options() -> DomainOptions {
        DomainOptions {
            runtime_dir: std::env::temp_dir().join("outpost-domain-tests"),
            ..DomainOptions::default()
        }
    }

    #[tokio::test]
    async fn test_root_domain_executes_locally() {
        let registry = MethodRegistry::new_shared();
        registry
            .register("calc::add", |args| {
                let a = args[0].as_i64().unwrap_or(0);
                let b = args[1].as_i64().unwrap_or(0);
                Ok(json!(a + b))
            })
            .unwrap();

        let domain = Domain::root(Arc::clone(&registry), test_options());
        assert_eq!(domain.role(), DomainRole::Root);
        assert_eq!(domain.name().as_str(), "root");

        let value = domain
            .execute("calc::add", vec![json!(2), json!(3)])
            .await
            .unwrap();
        assert_eq!(value, json!(5));
    }

    #[tokio::test]
    async fn test_root_domain_remote_fault_shape() {
        let registry = MethodRegistry::new_shared();
        registry
            .register("calc::boom", |_| {
                Err(MethodFault::invalid_operation("boom"))
            })
            .unwrap();

        let domain = Domain::root(registry, test_options());
        let err = domain.execute("calc::boom", vec![]).await.unwrap_err();
        match err {
            OutpostError::Remote(fault) => {
                assert_eq!(fault.kind, crate::wire::FAULT_INVALID_OPERATION);
                assert_eq!(fault.message, "boom");
            }
            other => panic!("expected remote fault, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_execute_rejects_undeclared_method() {
        let domain = Domain::root(MethodRegistry::new_shared(), test_options());
        let err = domain.execute("calc::missing", vec![]).await.unwrap_err();
        assert!(matches!(
            err,
            OutpostError::Eligibility(EligibilityError::UnknownMethod { .. })
        ));
    }

    #[tokio::test]
    async fn test_execute_rejects_malformed_path() {
        let domain = Domain::root(MethodRegistry::new_shared(), test_options());
        let err = domain.execute("noseparator", vec![]).await.unwrap_err();
        assert!(matches!(err, OutpostError::Validation(_)));
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent_and_fires_events() {
        let domain = Domain::root(MethodRegistry::new_shared(), test_options());
        let log: Arc<StdMutex<Vec<&'static str>>> = Arc::new(StdMutex::new(Vec::new()));

        let l = Arc::clone(&log);
        domain
            .on_unloading(move || l.lock().unwrap().push("unloading"))
            .unwrap();
        let l = Arc::clone(&log);
        domain
            .on_unloaded(move || l.lock().unwrap().push("unloaded"))
            .unwrap();

        assert!(domain.shutdown());
        assert!(!domain.shutdown());
        assert_eq!(domain.state(), DomainState::Unloaded);
        assert_eq!(domain.close_reason(), Some(DisconnectReason::LocalShutdown));
        assert_eq!(*log.lock().unwrap(), vec!["unloading", "unloaded"]);

        let err = domain.execute("calc::add", vec![]).await.unwrap_err();
        assert!(matches!(err, OutpostError::DomainClosed { .. }));
    }

    #[tokio::test]
    async fn test_wait_closed_observes_reason() {
        let domain = Domain::root(MethodRegistry::new_shared(), test_options());
        let waiter = {
            let domain = Arc::clone(&domain);
            tokio::spawn(async move { domain.wait_closed().await })
        };

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        domain.shutdown();

        let reason = waiter.await.unwrap();
        assert_eq!(reason, DisconnectReason::LocalShutdown);
    }

    #[tokio::test]
    async fn test_current_domain_lazy_root_then_init_fails() {
        let a = Domain::current();
        let b = Domain::current();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.role(), DomainRole::Root);

        let other = Domain::root(MethodRegistry::new_shared(), test_options());
        assert!(matches!(
            Domain::init_current(other),
            Err(OutpostError::CurrentDomainAlreadySet)
        ));
    }

    #[test]
    fn test_disconnect_reason_display() {
        assert_eq!(
            DisconnectReason::PeerProcessExited.to_string(),
            "peer process exited"
        );
        assert!(DisconnectReason::TransportFailure("checksum".to_string())
            .to_string()
            .contains("checksum"));
    }
}
