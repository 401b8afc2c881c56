//! A small, typed client for the GitHub Actions REST API.
//!
//! Only the surface the dashboard needs is implemented: listing the most
//! recent workflow runs of one repository, with rate-limit responses
//! recognised as their own error variant so pollers can skip a cycle quietly.
//!
//! ```rust,ignore
//! use github_actions::{Client, ClientConfig};
//!
//! let client = Client::new(ClientConfig::new("octo-org", "octo-repo"))?;
//! let runs = client.list_workflow_runs(5).await?;
//! for run in &runs.workflow_runs {
//!     println!("{} {} {:?}", run.id, run.status, run.conclusion);
//! }
//! ```

pub mod client;
pub mod error;
pub mod types;


pub use client::{Client, ClientConfig, DEFAULT_API_URL};
pub use error::{GithubError, Result};
pub use types::{WorkflowRun, WorkflowRunList};
