use ethers::types::H256;
use serde::Serialize;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    /// Orchestrator reached a step worth telling the user about.
    Milestone,
    /// Native pathway is waiting on the destination state oracle.
    Waiting,
    Tier1,
    Tier2,
    Tier3,
    Narrative,
    Warning,
    Released,
    ProviderFailed,
    StillInProgress,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusUpdate {
    pub tx_hash: Option<H256>,
    pub kind: StatusKind,
    pub message: String,
}

impl StatusUpdate {
    pub fn new(tx_hash: Option<H256>, kind: StatusKind, message: impl Into<String>) -> Self {
        Self {
            tx_hash,
            kind,
            message: message.into(),
        }
    }
}

/// Where orchestrators push interim updates. A disabled sink, or one whose
/// receiver is gone, drops updates silently.
#[derive(Debug, Clone, Default)]
pub struct StatusSink {
    tx: Option<mpsc::UnboundedSender<StatusUpdate>>,
}

impl StatusSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<StatusUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn emit(&self, tx_hash: Option<H256>, kind: StatusKind, message: impl Into<String>) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(StatusUpdate::new(tx_hash, kind, message));
        }
    }

    pub fn milestone(&self, tx_hash: Option<H256>, message: impl Into<String>) {
        self.emit(tx_hash, StatusKind::Milestone, message);
    }

    pub fn warning(&self, tx_hash: Option<H256>, message: impl Into<String>) {
        self.emit(tx_hash, StatusKind::Warning, message);
    }
}
