pub mod approval_state;
pub mod config;
pub mod role;
pub mod storage;

pub use approval_state::ApprovalState;
pub use role::Role;
