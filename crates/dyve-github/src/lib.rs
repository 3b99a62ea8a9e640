//! GitHub provider for Dyve.
//!
//! Mirrors the teams of one GitHub organization, with members folded into
//! each team snapshot. The organization is the only leased level: one
//! `teams` job refreshes every team and its membership.

pub mod catalog;
pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod provider;
pub mod upstream;

pub use catalog::GitHubCatalog;
pub use client::{GitHubApi, GitHubClient};
pub use config::GitHubConfig;
pub use error::ApiError;
pub use model::{Member, OrgInfo, TeamInfo};
pub use provider::{TEAMS, lease_plan, reconciler, root_entity, seed_root};
