use thiserror::Error;

pub type MembersResult<T> = std::result::Result<T, MembersError>;

#[derive(Error, Debug)]
pub enum MembersError {
    #[error("Cluster members query error: {0}")]
    Remote(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type ReconcileResult<T> = std::result::Result<T, ReconcileError>;

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("CloudHSM lookup error: {0}")]
    Load(#[source] kube::Error),

    #[error("failed to resolve cluster members: {0}")]
    Resolve(#[from] MembersError),

    #[error("Owner reference error: CloudHSM `{0}` has no uid")]
    OwnerReference(String),

    #[error("ConfigMap lookup error: {0}")]
    Lookup(#[source] kube::Error),

    #[error("ConfigMap create error: {0}")]
    Create(#[source] kube::Error),

    #[error("ConfigMap update error: {0}")]
    Update(#[source] kube::Error),

    #[error("Diagnostics error: {0}")]
    Event(#[source] kube::Error),
}

pub mod cloudhsm;
pub mod members;
pub mod store;
