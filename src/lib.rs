//! Warden - failover reconciliation agent for replicated metadata-server
//! clusters.
//!
//! Warden runs under an external cluster resource manager that invokes
//! one lifecycle action per process run (start, stop, monitor, promote,
//! demote). It reconciles the cluster's desired role assignment against
//! the live state of the local metadata server, decides whether this
//! node is safe to promote to leader, and maintains the cluster-wide
//! metadata-freshness attribute that gates promotion.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  Cluster Resource Manager                       │
//! │     start │ stop │ monitor │ promote │ demote │ notify          │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  │
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Lifecycle Actions                          │
//! │        (reconcile first, then act on the result value)          │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  │
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      State Reconciler                           │
//! │   probe result × cluster attribute → status │ score │ policy    │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  │
//! ┌─────────────────────────────────────────────────────────────────┐
//! │   Process Probe    │  Coordinator   │  Snapshots │ Lock file    │
//! │  admin channel +   │  attributes,   │  rotation, │  crash vs    │
//! │  fault tolerance   │  vote weight   │  retention │  clean stop  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Module Organization
//!
//! ## Core
//! - [`core::config`] - Configuration parsing and validation
//! - [`core::error`] - Error types and status codes
//!
//! ## Reconciliation
//! - [`probe`] - Process probe and fault classification
//! - [`reconcile`] - Pure state reconciler and vote scores
//!
//! ## Actions
//! - [`actions::monitor`] - Periodic health check and side effects
//! - [`actions::start`] - Cold start with shadow personality
//! - [`actions::stop`] - Graceful stop, kill escalation, rotation
//! - [`actions::promote`] - Reload/restart/prevent promotion strategies
//! - [`actions::demote`] - Quick halt of a leader
//!
//! ## Collaborators
//! - [`server::admin`] - Blocking admin channel to the metadata server
//! - [`server::process`] - Process-table control of the server daemon
//! - [`server::lock`] - Advisory lock file
//! - [`cluster`] - Resource-manager attribute store and voting
//! - [`storage::snapshot`] - Dump generations and archives
//!
//! ## CLI
//! - [`cli`] - Action parsing, validation, capabilities document
//!
//! # Key Invariants
//!
//! - A replica whose local metadata version is 0 is never
//!   promotion-eligible.
//! - The promotion policy derives solely from the reconciliation that
//!   immediately precedes the promote, never from cached state.
//! - A non-leading, non-fully-synced shadow carries the minimum vote
//!   score.
//! - The cluster attribute is written only when no cluster transition is
//!   believed in flight, and never moves backwards.
//! - Every action is idempotent and safe to re-run after an invocation
//!   abandoned at the manager's timeout.

// Core infrastructure
pub mod core;

// Probe and pure reconciliation
pub mod probe;
pub mod reconcile;

// Lifecycle actions
pub mod actions;

// Collaborator access
pub mod cluster;
pub mod server;
pub mod storage;

// CLI
pub mod cli;
