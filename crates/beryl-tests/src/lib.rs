//! End-to-end wallet scenarios for Beryl.
//!
//! Integration tests run two or more wallet sessions against one
//! in-memory node and check the ledger, the transaction log and the
//! node's view of the chain after each step of the slate exchange.

pub mod helpers;
