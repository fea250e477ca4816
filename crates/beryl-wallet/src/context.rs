//! Sender-side secrets kept between initiate and finalize.

use serde::{Deserialize, Serialize};

use beryl_core::crypto::SecretKey;
use beryl_core::types::{BlindingFactor, Commitment};

use crate::error::WalletError;
use crate::slate::{Slate, SlateId};

/// What the sender committed to when it created a slate.
///
/// The receiver's copy of the slate is checked against this before the
/// sender signs anything. Secret keys zeroize on drop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SenderContext {
    pub slate_id: SlateId,
    pub tx_log_id: u32,
    pub sec_key: SecretKey,
    pub sec_nonce: SecretKey,
    pub amount: u64,
    pub fee: u64,
    pub lock_height: u64,
    pub offset: BlindingFactor,
    pub inputs: Vec<Commitment>,
    pub change_outputs: Vec<Commitment>,
}

impl SenderContext {
    /// Check that the slate still carries what the sender created.
    pub fn check_slate(&self, slate: &Slate) -> Result<(), WalletError> {
        let mismatch = |what: &str| Err(WalletError::InvalidSlate(format!("{what} changed by receiver")));

        if slate.amount != self.amount {
            return mismatch("amount");
        }
        if slate.fee != self.fee {
            return mismatch("fee");
        }
        if slate.lock_height != self.lock_height {
            return mismatch("lock height");
        }
        if slate.offset != self.offset {
            return mismatch("offset");
        }
        if slate.input_commitments() != self.inputs {
            return mismatch("inputs");
        }
        let outputs = slate.output_commitments();
        if !self.change_outputs.iter().all(|c| outputs.contains(c)) {
            return mismatch("change output");
        }
        if outputs.len() != self.change_outputs.len() + 1 {
            return Err(WalletError::InvalidSlate(format!(
                "expected one receiver output, found {}",
                outputs.len().saturating_sub(self.change_outputs.len())
            )));
        }
        let own = slate
            .participant(0)
            .ok_or_else(|| WalletError::InvalidSlate("sender participant missing".into()))?;
        if own.public_excess != self.sec_key.public_key() || own.public_nonce != self.sec_nonce.public_key() {
            return mismatch("sender participant data");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slate::tests::test_slate;
    use beryl_core::crypto;
    use beryl_core::types::TxOutput;

    fn context_for(slate: &mut Slate) -> SenderContext {
        let sec_key = SecretKey::random();
        let sec_nonce = SecretKey::random();
        slate.participants[0].public_excess = sec_key.public_key();
        slate.participants[0].public_nonce = sec_nonce.public_key();
        SenderContext {
            slate_id: slate.id,
            tx_log_id: 0,
            sec_key,
            sec_nonce,
            amount: slate.amount,
            fee: slate.fee,
            lock_height: slate.lock_height,
            offset: slate.offset,
            inputs: slate.input_commitments(),
            change_outputs: vec![],
        }
    }

    fn receiver_output() -> TxOutput {
        let commitment = crypto::commit(200, &SecretKey::random());
        TxOutput { commitment, proof: crypto::create_output_proof(&[1; 32], &commitment, 0, 200) }
    }

    #[test]
    fn untouched_slate_passes() {
        let mut slate = test_slate();
        let ctx = context_for(&mut slate);
        slate.outputs.push(receiver_output());
        ctx.check_slate(&slate).unwrap();
    }

    #[test]
    fn tampered_amount_detected() {
        let mut slate = test_slate();
        let ctx = context_for(&mut slate);
        slate.outputs.push(receiver_output());
        slate.amount += 1;
        assert_eq!(
            ctx.check_slate(&slate).unwrap_err(),
            WalletError::InvalidSlate("amount changed by receiver".into())
        );
    }

    #[test]
    fn missing_receiver_output_detected() {
        let mut slate = test_slate();
        let ctx = context_for(&mut slate);
        assert!(ctx.check_slate(&slate).is_err());
    }

    #[test]
    fn secrets_not_in_debug() {
        let mut slate = test_slate();
        let ctx = context_for(&mut slate);
        assert!(format!("{ctx:?}").contains("REDACTED"));
    }
}
