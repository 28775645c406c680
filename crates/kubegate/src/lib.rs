//! kubegate - multi-cluster OIDC authentication gateway for Kubernetes.
//!
//! Users pick a cluster, complete an OpenID Connect authorization-code flow
//! against that cluster's identity provider, and download a kubeconfig wired
//! up for `kubectl`'s oidc auth provider.

pub mod api;
pub mod config;
pub mod kubeconfig;
pub mod oidc;
pub mod session;
pub mod templates;
