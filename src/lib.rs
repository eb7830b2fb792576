// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # klusterlet-addon-controller
//!
//! Hub-side controller that turns `KlusterletAddonConfig` resources into the
//! `ManifestWork`s and `ManagedClusterAddOn`s that install the add-on agents on
//! a managed cluster, and removes them again when the configuration or the
//! cluster goes away.
//!
//! ## Overview
//!
//! For every `KlusterletAddonConfig` the controller:
//!
//! - keeps a shared finalizer on the config and its `ManagedCluster`
//! - ensures the CRD bundle and operator bundle `ManifestWork`s
//! - creates `ManagedClusterAddOn` records for enabled components
//! - once the CRDs are available, ensures one `ManifestWork` per enabled component
//! - on deletion, removes component CRs, operator and CRDs in that order
//!
//! ## Modules
//!
//! - [`crd`] - resource types
//! - [`reconcilers`] - the lifecycle state machine and its I/O shell
//! - [`store`] - object store abstraction over the Kubernetes API
//! - [`manifests`] - `ManifestWork` payload rendering
//! - [`components`] - the add-on component registry
//! - [`predicates`] - event admission for dependent deletions
//! - [`context`] - shared controller context
//! - [`config`] - process configuration
//!
//! ## Example
//!
//! ```rust
//! use klusterlet_addon_controller::crd::{KlusterletAddonConfig, KlusterletAddonConfigSpec};
//! use klusterlet_addon_controller::reconcilers::lifecycle::is_paused;
//!
//! let config = KlusterletAddonConfig::new("cluster1", KlusterletAddonConfigSpec::default());
//! assert!(!is_paused(&config));
//! ```

pub mod components;
pub mod config;
pub mod constants;
pub mod context;
pub mod crd;
pub mod labels;
pub mod manifests;
pub mod metrics;
pub mod predicates;
pub mod reconcilers;
pub mod server;
pub mod store;
