//! Cloud Foundry provider for Dyve.
//!
//! Mirrors the foundation → organization → space → app hierarchy of one
//! Cloud Foundry installation into a hierarchy store. Each level is kept up
//! to date by its own [`Cascade`](dyve_core::Cascade) handler:
//!
//! | Leased kind     | Scope           | Fetches                          |
//! |-----------------|-----------------|----------------------------------|
//! | `cf_foundation` | `organizations` | `GET /v3/organizations`          |
//! | `cf_org`        | `spaces`        | `GET /v3/spaces?organization_guids=` |
//! | `cf_space`      | `apps`          | `GET /v3/apps?space_guids=`      |

pub mod catalog;
pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod provider;
pub mod upstream;

pub use catalog::CloudFoundryCatalog;
pub use client::{CloudFoundryApi, CloudFoundryClient};
pub use config::CloudFoundryConfig;
pub use error::ApiError;
pub use model::{AppInfo, FoundationInfo, OrgInfo, SpaceInfo};
pub use provider::{APPS, ORGANIZATIONS, SPACES, lease_plan, reconciler, root_entity, seed_root};
