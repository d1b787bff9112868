//! Per-action-session bookkeeping shared between the datachannel and actions (§3).

/// Who a `Data` frame's backend calls should be impersonated as, injected as
/// `Impersonate-User`/`Impersonate-Group` headers on the agent's cluster API
/// calls (§6).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImpersonationContext {
    /// The target user to impersonate, if any.
    pub target_user: Option<String>,
    /// The target groups to impersonate.
    pub target_groups: Vec<String>,
}

/// Bookkeeping the datachannel keeps per live `requestId` (§3 "Action session").
#[derive(Debug, Clone)]
pub struct ActionSession {
    /// The session's request id.
    pub request_id: u32,
    /// The log id used to correlate `StreamMessage`s for this session.
    pub log_id: String,
    /// Whether the action has been torn down.
    pub closed: bool,
    /// Optional impersonation context carried from `new-datachannel`.
    pub impersonation: ImpersonationContext,
}

impl ActionSession {
    /// Creates a fresh, open session.
    pub fn new(request_id: u32, log_id: String, impersonation: ImpersonationContext) -> Self {
        Self {
            request_id,
            log_id,
            closed: false,
            impersonation,
        }
    }

    /// Marks the session closed. Idempotent.
    pub fn close(&mut self) {
        self.closed = true;
    }
}
