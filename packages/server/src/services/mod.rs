pub mod aggregation;
pub mod documents;
pub mod gateway;
pub mod moderation;
pub mod orchestrator;
pub mod reconcile;
pub mod scope;
