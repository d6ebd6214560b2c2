//! Access credentials for remote clusters.
//!
//! A cluster's credential lives in the secret `<cluster>-admin-kubeconfig` in
//! namespace `<cluster>` under the `kubeconfig` key. Parsing selects the active
//! context and keeps exactly one authentication method.

use std::fmt;

use k8s_openapi::api::core::v1::Secret;
use kube::config::{AuthInfo, Kubeconfig};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::federation::client::{CallError, ClusterApi};

pub static KUBECONFIG_SECRET_SUFFIX: &str = "-admin-kubeconfig";
pub static KUBECONFIG_KEY: &str = "kubeconfig";
pub static CREATED_BY_LABEL: &str = "created-by";
pub static CREATED_BY_MONITOR: &str = "rhacm-monitor";

pub type CredentialResult<T> = std::result::Result<T, CredentialError>;

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("credential {namespace}/{name} not found")]
    NotFound { namespace: String, name: String },

    #[error("malformed kubeconfig for {cluster}: {reason}")]
    Malformed { cluster: String, reason: String },

    #[error("credential lookup failed: {0}")]
    Lookup(#[from] CallError),
}

pub fn kubeconfig_secret_name(cluster: &str) -> String {
    format!("{cluster}{KUBECONFIG_SECRET_SUFFIX}")
}

/// Whether a stored credential was registered through the monitor itself
pub fn is_monitor_managed(secret: &Secret) -> bool {
    secret
        .metadata
        .labels
        .as_ref()
        .and_then(|labels| labels.get(CREATED_BY_LABEL))
        .is_some_and(|v| v == CREATED_BY_MONITOR)
}

pub fn kubeconfig_data(secret: &Secret) -> Option<&[u8]> {
    secret
        .data
        .as_ref()?
        .get(KUBECONFIG_KEY)
        .map(|bytes| bytes.0.as_slice())
        .filter(|bytes| !bytes.is_empty())
}

/// Where a credential comes from
#[derive(Clone, Debug)]
pub enum CredentialSource {
    /// The conventionally named secret, looked up through a cluster API
    Secret { name: String },
    /// A blob supplied directly, e.g. for a hub that is being registered
    Raw { name: String, kubeconfig: Vec<u8> },
}

impl CredentialSource {
    pub fn secret(name: impl Into<String>) -> Self {
        Self::Secret { name: name.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CaSource {
    /// Base64 encoded PEM bundle
    Data(String),
    File(String),
}

#[derive(Clone, PartialEq, Eq)]
pub enum AuthMethod {
    ClientCertificate {
        certificate_data: String,
        key_data: String,
    },
    Token(String),
    TokenFile(String),
    Basic {
        username: String,
        password: Option<String>,
    },
}

impl AuthMethod {
    pub fn kind(&self) -> &'static str {
        match self {
            AuthMethod::ClientCertificate { .. } => "client-certificate",
            AuthMethod::Token(_) => "token",
            AuthMethod::TokenFile(_) => "token-file",
            AuthMethod::Basic { .. } => "basic",
        }
    }
}

impl fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMethod::TokenFile(path) => f.debug_tuple("TokenFile").field(path).finish(),
            AuthMethod::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .finish_non_exhaustive(),
            other => f.write_str(other.kind()),
        }
    }
}

/// Endpoint, trust material and authentication for one remote cluster
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteCredential {
    pub cluster: String,
    pub server: String,
    pub ca: Option<CaSource>,
    pub tls_server_name: Option<String>,
    pub insecure_skip_tls_verify: bool,
    /// `None` means the client falls back to anonymous access
    pub auth: Option<AuthMethod>,
}

fn non_empty(value: &Option<String>) -> Option<&String> {
    value.as_ref().filter(|v| !v.is_empty())
}

fn non_empty_secret(value: &Option<SecretString>) -> Option<String> {
    value
        .as_ref()
        .map(|v| v.expose_secret().to_string())
        .filter(|v| !v.is_empty())
}

/// Highest-priority authentication method configured for a user
fn auth_method(user: &AuthInfo) -> Option<AuthMethod> {
    if let (Some(cert), Some(key)) = (
        non_empty(&user.client_certificate_data),
        non_empty_secret(&user.client_key_data),
    ) {
        return Some(AuthMethod::ClientCertificate {
            certificate_data: cert.clone(),
            key_data: key,
        });
    }
    if let Some(token) = non_empty_secret(&user.token) {
        return Some(AuthMethod::Token(token));
    }
    if let Some(file) = non_empty(&user.token_file) {
        return Some(AuthMethod::TokenFile(file.clone()));
    }
    non_empty(&user.username).map(|username| AuthMethod::Basic {
        username: username.clone(),
        password: non_empty_secret(&user.password),
    })
}

/// First document of a possibly multi-document blob that declares contexts
fn load_documents(cluster: &str, data: &[u8]) -> CredentialResult<Kubeconfig> {
    let malformed = |reason: String| CredentialError::Malformed {
        cluster: cluster.to_string(),
        reason,
    };

    for document in serde_yaml::Deserializer::from_slice(data) {
        let config = Kubeconfig::deserialize(document).map_err(|e| malformed(e.to_string()))?;
        if !config.contexts.is_empty() {
            return Ok(config);
        }
    }

    Err(malformed("no context found".to_string()))
}

/// Parse a kubeconfig blob (YAML or JSON) into a credential for `cluster`.
pub fn parse_kubeconfig(cluster: &str, data: &[u8]) -> CredentialResult<RemoteCredential> {
    let malformed = |reason: String| CredentialError::Malformed {
        cluster: cluster.to_string(),
        reason,
    };
    let config = load_documents(cluster, data)?;

    let context = match non_empty(&config.current_context) {
        Some(current) => config
            .contexts
            .iter()
            .find(|c| &c.name == current)
            .ok_or_else(|| malformed(format!("context {current} not found")))?,
        None => config
            .contexts
            .first()
            .ok_or_else(|| malformed("no context found".to_string()))?,
    };
    let context = context
        .context
        .as_ref()
        .ok_or_else(|| malformed(format!("context {} is empty", context.name)))?;

    let entry = config
        .clusters
        .iter()
        .find(|c| c.name == context.cluster)
        .and_then(|c| c.cluster.as_ref())
        .ok_or_else(|| malformed(format!("cluster {} not found", context.cluster)))?;
    let server = non_empty(&entry.server)
        .cloned()
        .ok_or_else(|| malformed(format!("cluster {} has no server", context.cluster)))?;

    let user = match non_empty(&context.user) {
        Some(user) => config
            .auth_infos
            .iter()
            .find(|u| &u.name == user)
            .ok_or_else(|| malformed(format!("user {user} not found")))?
            .auth_info
            .as_ref(),
        None => None,
    };

    let auth = user.and_then(auth_method);
    match &auth {
        Some(method) => debug!(cluster, auth = method.kind(), "resolved credential"),
        None => warn!(
            cluster,
            "kubeconfig has no usable authentication method, falling back to anonymous access"
        ),
    }

    let ca = non_empty(&entry.certificate_authority_data)
        .map(|data| CaSource::Data(data.clone()))
        .or_else(|| non_empty(&entry.certificate_authority).map(|f| CaSource::File(f.clone())));

    Ok(RemoteCredential {
        cluster: cluster.to_string(),
        server,
        ca,
        tls_server_name: non_empty(&entry.tls_server_name).cloned(),
        insecure_skip_tls_verify: entry.insecure_skip_tls_verify.unwrap_or(false),
        auth,
    })
}

/// Look up the stored credential for `name` through `api`.
///
/// Returns `Ok(None)` when no secret exists, so callers can tell an absent
/// credential from a failing lookup.
pub async fn stored_credential(api: &dyn ClusterApi, name: &str) -> CredentialResult<Option<Secret>> {
    Ok(api.get_secret(name, &kubeconfig_secret_name(name)).await?)
}

pub async fn resolve(api: &dyn ClusterApi, source: &CredentialSource) -> CredentialResult<RemoteCredential> {
    match source {
        CredentialSource::Raw { name, kubeconfig } => parse_kubeconfig(name, kubeconfig),
        CredentialSource::Secret { name } => {
            let not_found = || CredentialError::NotFound {
                namespace: name.clone(),
                name: kubeconfig_secret_name(name),
            };
            let secret = stored_credential(api, name).await?.ok_or_else(not_found)?;
            let data = kubeconfig_data(&secret).ok_or_else(not_found)?;
            parse_kubeconfig(name, data)
        }
    }
}
