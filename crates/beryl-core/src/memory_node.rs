//! In-memory node for tests.
//!
//! Keeps an ordered output index, a transaction pool and kernel heights, and
//! validates posted transactions the way a real node's pool would. Blocks are
//! mined explicitly with [`InMemoryNode::mine_blocks`].

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::NodeError;
use crate::traits::{ChainOutput, NodeClient, OutputInfo, OutputRange, PostOutcome, RejectReason};
use crate::types::{Commitment, OutputProof, PublicKey, Transaction};

#[derive(Default)]
struct NodeState {
    height: u64,
    /// Every leaf ever added, spent or not: index -> height.
    index_heights: BTreeMap<u64, u64>,
    /// Unspent leaves by index.
    unspent: BTreeMap<u64, ChainOutput>,
    by_commitment: HashMap<Commitment, u64>,
    pool: Vec<Transaction>,
    kernels: HashMap<PublicKey, u64>,
    unreachable: bool,
    posted: usize,
}

impl NodeState {
    fn next_index(&self) -> u64 {
        self.index_heights.keys().next_back().map_or(1, |i| i + 1)
    }

    fn highest_index(&self) -> u64 {
        self.index_heights.keys().next_back().copied().unwrap_or(0)
    }

    fn push_leaf(&mut self, commitment: Commitment, proof: OutputProof, is_coinbase: bool) -> u64 {
        let mmr_index = self.next_index();
        self.index_heights.insert(mmr_index, self.height);
        self.unspent.insert(
            mmr_index,
            ChainOutput { mmr_index, commitment, proof, height: self.height, is_coinbase },
        );
        self.by_commitment.insert(commitment, mmr_index);
        mmr_index
    }

    fn spend(&mut self, commitment: &Commitment) -> bool {
        match self.by_commitment.remove(commitment) {
            Some(index) => self.unspent.remove(&index).is_some(),
            None => false,
        }
    }

    fn check(&self) -> Result<(), NodeError> {
        if self.unreachable {
            Err(NodeError::Unreachable("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

/// A synthetic node with switchable reachability.
#[derive(Default)]
pub struct InMemoryNode {
    state: Mutex<NodeState>,
}

impl InMemoryNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an output directly to the tip block. Returns its index.
    pub fn add_output(&self, commitment: Commitment, proof: OutputProof, is_coinbase: bool) -> u64 {
        self.state.lock().push_leaf(commitment, proof, is_coinbase)
    }

    /// Spend an output outside any wallet, as another party double-spending
    /// would. Returns whether it was unspent.
    pub fn spend_output(&self, commitment: &Commitment) -> bool {
        self.state.lock().spend(commitment)
    }

    /// Mine `n` blocks. The first includes every pooled transaction.
    pub fn mine_blocks(&self, n: u64) {
        let mut state = self.state.lock();
        for _ in 0..n {
            state.height += 1;
            let pool = std::mem::take(&mut state.pool);
            for tx in pool {
                for input in &tx.inputs {
                    state.spend(&input.commitment);
                }
                for output in &tx.outputs {
                    state.push_leaf(output.commitment, output.proof, false);
                }
                let height = state.height;
                for kernel in &tx.kernels {
                    state.kernels.insert(kernel.excess, height);
                }
            }
        }
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unreachable = unreachable;
    }

    pub fn height(&self) -> u64 {
        self.state.lock().height
    }

    pub fn pool_size(&self) -> usize {
        self.state.lock().pool.len()
    }

    /// Number of transactions accepted into the pool since creation.
    pub fn posted_count(&self) -> usize {
        self.state.lock().posted
    }

    pub fn is_unspent(&self, commitment: &Commitment) -> bool {
        self.state.lock().by_commitment.contains_key(commitment)
    }
}

impl NodeClient for InMemoryNode {
    fn get_height(&self) -> Result<u64, NodeError> {
        let state = self.state.lock();
        state.check()?;
        Ok(state.height)
    }

    fn get_outputs(&self, commitments: &[Commitment]) -> Result<Vec<OutputInfo>, NodeError> {
        let state = self.state.lock();
        state.check()?;
        Ok(commitments
            .iter()
            .filter_map(|c| state.by_commitment.get(c))
            .filter_map(|index| state.unspent.get(index))
            .map(|leaf| OutputInfo {
                commitment: leaf.commitment,
                height: leaf.height,
                is_coinbase: leaf.is_coinbase,
            })
            .collect())
    }

    fn post_transaction(&self, tx: &Transaction) -> Result<PostOutcome, NodeError> {
        let mut state = self.state.lock();
        state.check()?;

        if let Err(e) = tx.validate() {
            return Ok(PostOutcome::Rejected(RejectReason::Invalid(e.to_string())));
        }

        let pooled_inputs: HashSet<Commitment> = state
            .pool
            .iter()
            .flat_map(|t| t.inputs.iter().map(|i| i.commitment))
            .collect();
        for input in &tx.inputs {
            if !state.by_commitment.contains_key(&input.commitment)
                || pooled_inputs.contains(&input.commitment)
            {
                return Ok(PostOutcome::Rejected(RejectReason::InputSpent(input.commitment)));
            }
        }
        for output in &tx.outputs {
            if state.by_commitment.contains_key(&output.commitment) {
                return Ok(PostOutcome::Rejected(RejectReason::DuplicateOutput(output.commitment)));
            }
        }

        state.pool.push(tx.clone());
        state.posted += 1;
        Ok(PostOutcome::Accepted)
    }

    fn get_outputs_in_range(
        &self,
        start_index: u64,
        end_index: Option<u64>,
        max: u64,
    ) -> Result<OutputRange, NodeError> {
        let state = self.state.lock();
        state.check()?;

        let highest_index = state.highest_index();
        let end = end_index.unwrap_or(highest_index).min(highest_index);
        let mut outputs = Vec::new();
        let mut last_retrieved_index = end;
        if start_index < end {
            for (index, leaf) in state.unspent.range(start_index + 1..=end) {
                if outputs.len() as u64 >= max {
                    break;
                }
                outputs.push(*leaf);
                last_retrieved_index = *index;
            }
            if (outputs.len() as u64) < max {
                last_retrieved_index = end;
            }
        } else {
            last_retrieved_index = start_index.max(end);
        }

        Ok(OutputRange { highest_index, last_retrieved_index, outputs })
    }

    fn get_pmmr_range(
        &self,
        start_height: u64,
        end_height: Option<u64>,
    ) -> Result<(u64, u64), NodeError> {
        let state = self.state.lock();
        state.check()?;

        let end_height = end_height.unwrap_or(state.height);
        let mut in_range = state
            .index_heights
            .iter()
            .filter(|(_, h)| **h >= start_height && **h <= end_height)
            .map(|(i, _)| *i);
        let first = in_range.next().unwrap_or(0);
        let last = in_range.last().unwrap_or(first);
        Ok((first, last))
    }

    fn get_kernel(&self, excess: &PublicKey) -> Result<Option<u64>, NodeError> {
        let state = self.state.lock();
        state.check()?;
        Ok(state.kernels.get(excess).copied())
    }
}
