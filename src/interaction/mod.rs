//! User-interaction gating
//!
//! This module provides:
//! - The pending-request correlation table keyed by request id
//! - Suspension of callers until an approve/reject entry point resolves
//!   their request, exactly once
//! - The prompter collaborator that surfaces new requests to the UI
//! - The per-origin permission collaborator
//!
//! A pending request has no timeout. It lives until approved, rejected, or
//! the process restarts; a dropped resolver surfaces to the suspended
//! caller as rejection.

use crate::errors::{KeyWardenError, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tracing::debug;

/// Family tag for a pending request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RequestKind {
    Unlock,
    Sign,
    TxConfig,
}

/// A message-signing request awaiting approval
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignPayload {
    pub chain_id: String,
    pub signer: String,
    pub message: Vec<u8>,
}

/// Transaction fee/config parameters; the user may edit these before
/// approving
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxConfig {
    pub gas: u64,
    pub fee_amount: String,
    pub fee_denom: String,
    pub memo: String,
}

/// Payload of a pending request; approval may carry back an edited payload
/// of the same kind
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum RequestPayload {
    Unlock,
    Sign(SignPayload),
    TxConfig(TxConfig),
}

impl RequestPayload {
    pub fn kind(&self) -> RequestKind {
        match self {
            RequestPayload::Unlock => RequestKind::Unlock,
            RequestPayload::Sign(_) => RequestKind::Sign,
            RequestPayload::TxConfig(_) => RequestKind::TxConfig,
        }
    }
}

/// Snapshot of one pending request, safe to hand to the UI
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRequestInfo {
    pub id: u64,
    pub origin: String,
    pub chain_id: String,
    pub payload: RequestPayload,
}

struct PendingEntry {
    info: PendingRequestInfo,
    resolver: oneshot::Sender<Result<RequestPayload>>,
}

/// Notification collaborator: told about each new pending request so the
/// extension can open its approval UI
#[async_trait]
pub trait Prompter: Send + Sync {
    async fn prompt(&self, request: &PendingRequestInfo);
}

/// Prompter for flows with no UI attached (tests, headless embedding)
pub struct NoPrompt;

#[async_trait]
impl Prompter for NoPrompt {
    async fn prompt(&self, _request: &PendingRequestInfo) {}
}

/// Origin-permission collaborator, consulted before a pending request is
/// ever created
pub trait PermissionChecker: Send + Sync {
    fn is_allowed(&self, origin: &str, chain_id: &str) -> bool;
}

/// Permission policy for trusted internal callers
pub struct AllowAll;

impl PermissionChecker for AllowAll {
    fn is_allowed(&self, _origin: &str, _chain_id: &str) -> bool {
        true
    }
}

/// Explicit origin x chain allowlist
#[derive(Default)]
pub struct OriginAllowlist {
    allowed: HashSet<(String, String)>,
}

impl OriginAllowlist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow(&mut self, origin: &str, chain_id: &str) {
        self.allowed
            .insert((origin.to_string(), chain_id.to_string()));
    }
}

impl PermissionChecker for OriginAllowlist {
    fn is_allowed(&self, origin: &str, chain_id: &str) -> bool {
        self.allowed
            .contains(&(origin.to_string(), chain_id.to_string()))
    }
}

/// Request/response correlation table. Callers suspend in `wait_approve`;
/// a separate approve/reject entry point resolves each id exactly once.
pub struct InteractionHub {
    pending: Mutex<HashMap<u64, PendingEntry>>,
    next_id: AtomicU64,
    prompter: Arc<dyn Prompter>,
}

impl InteractionHub {
    pub fn new(prompter: Arc<dyn Prompter>) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            prompter,
        }
    }

    /// Record a pending request and suspend until it is resolved. Returns
    /// the approved payload (original or user-edited) or `UserRejected`.
    pub async fn wait_approve(
        &self,
        origin: &str,
        chain_id: &str,
        payload: RequestPayload,
    ) -> Result<RequestPayload> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (resolver, receiver) = oneshot::channel();

        let info = PendingRequestInfo {
            id,
            origin: origin.to_string(),
            chain_id: chain_id.to_string(),
            payload,
        };

        {
            let mut pending = self.pending.lock().unwrap();
            pending.insert(
                id,
                PendingEntry {
                    info: info.clone(),
                    resolver,
                },
            );
        }
        debug!(
            "Pending {:?} request {} from {} on {}",
            info.payload.kind(),
            id,
            origin,
            chain_id
        );

        self.prompter.prompt(&info).await;

        match receiver.await {
            Ok(result) => result,
            // Resolver dropped without an answer (process teardown):
            // treated as rejection
            Err(_) => Err(KeyWardenError::UserRejected),
        }
    }

    /// Resolve a pending request as approved, optionally substituting a
    /// user-edited payload of the same kind
    pub fn approve(
        &self,
        id: u64,
        expected: RequestKind,
        override_payload: Option<RequestPayload>,
    ) -> Result<()> {
        let entry = self.take(id, expected)?;

        let payload = match override_payload {
            Some(p) if p.kind() != expected => {
                // Put the untouched entry back; the request stays pending
                self.pending.lock().unwrap().insert(id, entry);
                return Err(KeyWardenError::InvalidState(
                    "override payload kind mismatch".to_string(),
                ));
            }
            Some(p) => p,
            None => entry.info.payload.clone(),
        };

        debug!("Approved request {}", id);
        // The waiting caller may itself have gone away; that is its choice
        let _ = entry.resolver.send(Ok(payload));
        Ok(())
    }

    /// Resolve a pending request as rejected
    pub fn reject(&self, id: u64, expected: RequestKind) -> Result<()> {
        let entry = self.take(id, expected)?;
        debug!("Rejected request {}", id);
        let _ = entry.resolver.send(Err(KeyWardenError::UserRejected));
        Ok(())
    }

    /// Approve every pending request of a kind (unlock resolution after a
    /// successful password entry)
    pub fn approve_all(&self, kind: RequestKind) {
        let mut pending = self.pending.lock().unwrap();
        let ids: Vec<u64> = pending
            .iter()
            .filter(|(_, e)| e.info.payload.kind() == kind)
            .map(|(id, _)| *id)
            .collect();

        for id in ids {
            if let Some(entry) = pending.remove(&id) {
                let payload = entry.info.payload.clone();
                let _ = entry.resolver.send(Ok(payload));
            }
        }
    }

    /// Snapshot one pending request for the approval UI
    pub fn get(&self, id: u64) -> Result<PendingRequestInfo> {
        let pending = self.pending.lock().unwrap();
        pending
            .get(&id)
            .map(|e| e.info.clone())
            .ok_or(KeyWardenError::UnknownRequest(id))
    }

    /// All pending requests, oldest id first
    pub fn pending_requests(&self) -> Vec<PendingRequestInfo> {
        let pending = self.pending.lock().unwrap();
        let mut infos: Vec<_> = pending.values().map(|e| e.info.clone()).collect();
        infos.sort_by_key(|i| i.id);
        infos
    }

    fn take(&self, id: u64, expected: RequestKind) -> Result<PendingEntry> {
        let mut pending = self.pending.lock().unwrap();
        // A kind mismatch means the id is unknown to this entry point
        let kind_matches = pending
            .get(&id)
            .map(|entry| entry.info.payload.kind() == expected)
            .unwrap_or(false);
        if !kind_matches {
            return Err(KeyWardenError::UnknownRequest(id));
        }
        Ok(pending.remove(&id).unwrap())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    /// Prompter that reports each new request id to the test
    struct ChannelPrompt {
        ids: mpsc::UnboundedSender<u64>,
    }

    #[async_trait]
    impl Prompter for ChannelPrompt {
        async fn prompt(&self, request: &PendingRequestInfo) {
            let _ = self.ids.send(request.id);
        }
    }

    fn hub_with_channel() -> (Arc<InteractionHub>, mpsc::UnboundedReceiver<u64>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let hub = Arc::new(InteractionHub::new(Arc::new(ChannelPrompt { ids: tx })));
        (hub, rx)
    }

    fn sign_payload(msg: &[u8]) -> RequestPayload {
        RequestPayload::Sign(SignPayload {
            chain_id: "cosmoshub-4".to_string(),
            signer: "cosmos1xyz".to_string(),
            message: msg.to_vec(),
        })
    }

    #[tokio::test]
    async fn test_approve_releases_caller_with_original_payload() {
        let (hub, mut ids) = hub_with_channel();

        let waiter = {
            let hub = hub.clone();
            tokio::spawn(async move {
                hub.wait_approve("https://app.example", "cosmoshub-4", sign_payload(b"hello"))
                    .await
            })
        };

        let id = ids.recv().await.unwrap();
        assert_eq!(hub.get(id).unwrap().origin, "https://app.example");

        hub.approve(id, RequestKind::Sign, None).unwrap();

        let approved = waiter.await.unwrap().unwrap();
        match approved {
            RequestPayload::Sign(p) => assert_eq!(p.message, b"hello"),
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_reject_fails_caller_and_consumes_id() {
        let (hub, mut ids) = hub_with_channel();

        let waiter = {
            let hub = hub.clone();
            tokio::spawn(async move {
                hub.wait_approve("origin", "chain", sign_payload(b"m")).await
            })
        };

        let id = ids.recv().await.unwrap();
        hub.reject(id, RequestKind::Sign).unwrap();

        assert!(matches!(
            waiter.await.unwrap(),
            Err(KeyWardenError::UserRejected)
        ));

        // The id was consumed; a later approve sees an unknown request
        assert!(matches!(
            hub.approve(id, RequestKind::Sign, None),
            Err(KeyWardenError::UnknownRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_and_kind_mismatched_ids() {
        let (hub, mut ids) = hub_with_channel();

        assert!(matches!(
            hub.approve(42, RequestKind::Sign, None),
            Err(KeyWardenError::UnknownRequest(42))
        ));

        let _waiter = {
            let hub = hub.clone();
            tokio::spawn(async move {
                hub.wait_approve("origin", "chain", sign_payload(b"m")).await
            })
        };
        let id = ids.recv().await.unwrap();

        // A sign request cannot be resolved through the tx-config entry point
        assert!(matches!(
            hub.reject(id, RequestKind::TxConfig),
            Err(KeyWardenError::UnknownRequest(_))
        ));
        // Still pending afterwards
        assert!(hub.get(id).is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_requests_resolve_independently() {
        let (hub, mut ids) = hub_with_channel();

        let first = {
            let hub = hub.clone();
            tokio::spawn(async move { hub.wait_approve("a", "chain", sign_payload(b"1")).await })
        };
        let id_a = ids.recv().await.unwrap();

        let second = {
            let hub = hub.clone();
            tokio::spawn(async move { hub.wait_approve("b", "chain", sign_payload(b"2")).await })
        };
        let id_b = ids.recv().await.unwrap();

        assert_eq!(hub.pending_requests().len(), 2);

        hub.reject(id_a, RequestKind::Sign).unwrap();
        hub.approve(id_b, RequestKind::Sign, None).unwrap();

        assert!(first.await.unwrap().is_err());
        assert!(second.await.unwrap().is_ok());
        assert!(hub.pending_requests().is_empty());
    }

    #[tokio::test]
    async fn test_approve_with_edited_payload() {
        let (hub, mut ids) = hub_with_channel();

        let waiter = {
            let hub = hub.clone();
            tokio::spawn(async move {
                hub.wait_approve(
                    "origin",
                    "chain",
                    RequestPayload::TxConfig(TxConfig {
                        gas: 100_000,
                        fee_amount: "1000".to_string(),
                        fee_denom: "uatom".to_string(),
                        memo: String::new(),
                    }),
                )
                .await
            })
        };
        let id = ids.recv().await.unwrap();

        // Kind-mismatched override leaves the request pending
        assert!(matches!(
            hub.approve(id, RequestKind::TxConfig, Some(sign_payload(b"x"))),
            Err(KeyWardenError::InvalidState(_))
        ));
        assert!(hub.get(id).is_ok());

        let edited = TxConfig {
            gas: 200_000,
            fee_amount: "5000".to_string(),
            fee_denom: "uatom".to_string(),
            memo: "edited".to_string(),
        };
        hub.approve(
            id,
            RequestKind::TxConfig,
            Some(RequestPayload::TxConfig(edited.clone())),
        )
        .unwrap();

        match waiter.await.unwrap().unwrap() {
            RequestPayload::TxConfig(config) => assert_eq!(config, edited),
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_dropped_hub_rejects_waiters() {
        let (hub, mut ids) = hub_with_channel();

        let waiter = {
            let hub = hub.clone();
            tokio::spawn(async move {
                hub.wait_approve("origin", "chain", sign_payload(b"m")).await
            })
        };
        let _ = ids.recv().await.unwrap();

        // Simulated process teardown: clearing the table drops resolvers
        hub.pending.lock().unwrap().clear();

        assert!(matches!(
            waiter.await.unwrap(),
            Err(KeyWardenError::UserRejected)
        ));
    }
}
