//! # Settlement Core
//!
//! The client-side settlement core of a cooperative finance back
//! office: batch payout of pending disbursements and reconciliation of
//! incoming payments, over a typed gateway to the backend ledger.
//!
//! ## Features
//!
//! - **Selection-set engine**: pure grouping of pending disbursements
//!   by payee and complement computation for exclusion-list payouts
//! - **Batch coordination**: payee-scoped payout sessions with a
//!   `open`/`toggle`/`submit`/`close` command interface and a strict
//!   no-optimistic-mutation rule for money state
//! - **Reconciliation matching**: ranked candidate lookup and match
//!   commits with server-sourced status, never derived locally
//! - **Status projection**: exhaustive status-to-label mapping for the
//!   list views
//! - **Gateway abstraction**: trait-based transport with an HTTP/JSON
//!   implementation and an in-memory one for tests
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use settlement_core::{BatchCoordinator, GatewayConfig, HttpGateway};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let gateway = HttpGateway::new(GatewayConfig::from_env())?;
//! let coordinator = BatchCoordinator::new(gateway);
//!
//! coordinator.open("supplier-42").await?;
//! coordinator.toggle("TX-1009")?; // withhold one transaction
//! let receipt = coordinator.submit().await?;
//! println!("paid {} transactions", receipt.paid.len());
//! # Ok(())
//! # }
//! ```

pub mod conciliation;
pub mod disbursement;
pub mod gateway;
pub mod status;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use conciliation::*;
pub use disbursement::*;
pub use gateway::*;
pub use status::*;
pub use traits::*;
pub use types::*;
