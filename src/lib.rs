use credentials::CredentialError;
use federation::client::{CallError, ConnectError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Kube Error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Kubeconfig error: {0}")]
    Kubeconfig(#[from] kube::config::KubeconfigError),

    #[error("Managed cluster enumeration error: {0}")]
    Enumerate(#[source] CallError),

    #[error("Hub {0} not found")]
    HubNotFound(String),

    #[error("Hub {hub} unreachable: {source}")]
    HubUnreachable {
        hub: String,
        #[source]
        source: CallError,
    },

    #[error("Credential error: {0}")]
    Credential(#[source] CredentialError),

    #[error("Remote client error: {0}")]
    Connect(#[from] ConnectError),

    #[error("Aggregation cancelled")]
    Cancelled,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub fn metric_label(&self) -> String {
        format!("{self:?}")
            .split(['(', ' ', '{'])
            .next()
            .unwrap_or_default()
            .to_lowercase()
    }

    pub(crate) fn enumerate(error: CallError) -> Self {
        if error.is_cancellation() {
            Error::Cancelled
        } else {
            Error::Enumerate(error)
        }
    }

    pub(crate) fn unreachable(hub: &str, error: CallError) -> Self {
        if error.is_cancellation() {
            Error::Cancelled
        } else {
            Error::HubUnreachable {
                hub: hub.to_string(),
                source: error,
            }
        }
    }
}

impl From<CredentialError> for Error {
    fn from(error: CredentialError) -> Self {
        match error {
            CredentialError::Lookup(e) if e.is_cancellation() => Error::Cancelled,
            e => Error::Credential(e),
        }
    }
}

/// Loosely-typed resource access
pub mod api;
/// Time-bounded result cache
pub mod cache;
pub mod config;
/// Web server state and diagnostics
pub mod controller;
pub use crate::controller::*;
pub mod convert;
pub mod credentials;
pub mod federation;
pub mod models;
pub mod predicates;
pub mod service;

/// Log and trace integrations
pub mod telemetry;

/// Metrics
mod metrics;
pub use metrics::Metrics;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_labels() {
        assert_eq!(Error::Cancelled.metric_label(), "cancelled");
        assert_eq!(Error::HubNotFound("hub-a".into()).metric_label(), "hubnotfound");
        assert_eq!(
            Error::enumerate(CallError::Unavailable("down".into())).metric_label(),
            "enumerate"
        );
        assert!(matches!(
            Error::unreachable("hub-a", CallError::DeadlineExceeded),
            Error::Cancelled
        ));
    }

    #[test]
    fn cancelled_lookups_cancel_the_pass() {
        let error: Error = CredentialError::Lookup(CallError::Cancelled).into();
        assert!(matches!(error, Error::Cancelled));

        let error: Error = CredentialError::NotFound {
            namespace: "hub-a".into(),
            name: "hub-a-admin-kubeconfig".into(),
        }
        .into();
        assert!(matches!(error, Error::Credential(_)));
    }
}
