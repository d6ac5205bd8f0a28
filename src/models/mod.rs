pub mod reputationmodel;
pub mod reviewmodel;
