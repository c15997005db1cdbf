//! Registry entry wrapping the wire-visible transaction with its
//! transition rules.

use chrono::Utc;

use host_types::{HostError, HostResult, PendingTransaction, RejectReason, TxStatus};

/// A pending transaction plus registry-internal bookkeeping.
#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub tx: PendingTransaction,
    /// Set while a confirm decision is signing/submitting, so a
    /// concurrent second decision loses cleanly.
    pub in_flight: bool,
    /// Broadcast channel that accepted the submission.
    pub channel: Option<String>,
}

impl Entry {
    pub fn new(tx: PendingTransaction) -> Self {
        Self {
            tx,
            in_flight: false,
            channel: None,
        }
    }

    /// Err(`already_decided`) once a decision was made or is in
    /// progress.
    pub fn guard_decidable(&self) -> HostResult<()> {
        // A submitted entry (channel set) is past the decision point
        // even though its status is still `pending` while it gathers
        // confirmations.
        if self.tx.status.is_terminal() || self.in_flight || self.channel.is_some() {
            return Err(HostError::AlreadyDecided {
                id: self.tx.id.clone(),
            });
        }
        Ok(())
    }

    /// Claim the entry for an in-progress confirm decision.
    pub fn begin_confirm(&mut self) -> HostResult<()> {
        self.guard_decidable()?;
        self.in_flight = true;
        Ok(())
    }

    /// Release the claim after a failed submission attempt left the
    /// entry undecided (e.g. wallet locked).
    pub fn abort_confirm(&mut self) {
        self.in_flight = false;
    }

    /// Terminal transition: confirmed.
    pub fn mark_confirmed(&mut self, confirmations: u32, block_number: Option<u64>) {
        self.in_flight = false;
        self.tx.status = TxStatus::Confirmed;
        self.tx.confirmations = self.tx.confirmations.max(confirmations);
        if block_number.is_some() {
            self.tx.block_number = block_number;
        }
        self.tx.last_checked = Utc::now();
    }

    /// Terminal transition: rejected. Returns `already_decided` if a
    /// decision was already made.
    pub fn mark_rejected(
        &mut self,
        reason: RejectReason,
        details: Option<String>,
        audit_log_id: String,
    ) -> HostResult<()> {
        self.guard_decidable()?;
        self.tx.status = TxStatus::Rejected;
        self.tx.reject_reason = Some(reason);
        self.tx.reject_details = details;
        self.tx.audit_log_id = Some(audit_log_id);
        self.tx.rejected_at = Some(Utc::now());
        self.tx.last_checked = Utc::now();
        Ok(())
    }

    /// Terminal transition: failed. Used by the submit path and the
    /// confirmation poller; never races a decision because the caller
    /// holds the registry lock.
    pub fn mark_failed(&mut self, error: Option<String>) {
        self.in_flight = false;
        self.tx.status = TxStatus::Failed;
        self.tx.reject_details = error;
        self.tx.last_checked = Utc::now();
    }

    /// Monotonic confirmation-count update from the poller.
    /// Returns true if the count advanced.
    pub fn record_confirmations(&mut self, confirmations: u32, block_number: Option<u64>) -> bool {
        self.tx.last_checked = Utc::now();
        if confirmations <= self.tx.confirmations {
            return false;
        }
        self.tx.confirmations = confirmations;
        if block_number.is_some() {
            self.tx.block_number = block_number;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use host_types::{ChainTag, TxKind};

    fn entry() -> Entry {
        Entry::new(PendingTransaction::new(
            "ptx-1",
            ChainTag::Ethereum,
            "0xA",
            "0xB",
            "1.0",
            "ETH",
            TxKind::Transfer,
        ))
    }

    #[test]
    fn test_reject_is_terminal_and_immutable() {
        let mut e = entry();
        e.mark_rejected(RejectReason::SuspiciousActivity, None, "audit-1".into())
            .unwrap();
        assert_eq!(e.tx.status, TxStatus::Rejected);
        assert!(e.tx.rejected_at.is_some());
        assert_eq!(e.tx.audit_log_id.as_deref(), Some("audit-1"));

        // Second decision of either kind is refused.
        let err = e
            .mark_rejected(RejectReason::SuspiciousActivity, None, "audit-2".into())
            .unwrap_err();
        assert!(matches!(err, HostError::AlreadyDecided { .. }));
        assert_eq!(e.tx.audit_log_id.as_deref(), Some("audit-1"));
        assert!(e.begin_confirm().is_err());
    }

    #[test]
    fn test_confirm_claim_blocks_second_decision() {
        let mut e = entry();
        e.begin_confirm().unwrap();

        let err = e.begin_confirm().unwrap_err();
        assert!(matches!(err, HostError::AlreadyDecided { .. }));
        assert!(e
            .mark_rejected(RejectReason::UserRequest, None, "a".into())
            .is_err());

        // Aborting the claim makes the entry decidable again.
        e.abort_confirm();
        assert!(e.begin_confirm().is_ok());
    }

    #[test]
    fn test_confirmations_monotonic() {
        let mut e = entry();
        assert!(e.record_confirmations(2, Some(100)));
        assert!(!e.record_confirmations(1, Some(99)));
        assert_eq!(e.tx.confirmations, 2);
        assert_eq!(e.tx.block_number, Some(100));
        assert!(e.record_confirmations(3, None));
        // Block number survives a None update.
        assert_eq!(e.tx.block_number, Some(100));
    }

    #[test]
    fn test_rejected_fields_absent_unless_rejected() {
        let mut e = entry();
        e.mark_confirmed(6, Some(12345));
        assert_eq!(e.tx.status, TxStatus::Confirmed);
        assert!(e.tx.rejected_at.is_none());
        assert!(e.tx.reject_reason.is_none());
    }

    #[test]
    fn test_failed_transition() {
        let mut e = entry();
        e.begin_confirm().unwrap();
        e.mark_failed(Some("all channels down".into()));
        assert_eq!(e.tx.status, TxStatus::Failed);
        assert!(!e.in_flight);
        assert!(e.begin_confirm().is_err());
    }
}
