//! Contract bindings for all external contracts.
//!
//! This crate consolidates the Solidity interfaces the withdrawal engine talks to:
//! - OP Stack contracts (OptimismPortal2, L2ToL1MessagePasser, DisputeGameFactory, FaultDisputeGame)
//! - Standard bridge events (deposit and withdrawal history)
//!
//! All bindings are generated using alloy's `sol!` macro.

pub mod bridge;
pub mod opstack;
