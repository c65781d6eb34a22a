//! Disbursement batch coordination and selection-set arithmetic

pub mod batch;
pub mod schedule;
pub mod selection;

pub use batch::{BatchCoordinator, BatchReceipt, SessionPhase, SessionView};
pub use schedule::ScheduleManager;
pub use selection::{complement, group_by_payee};
