use std::fmt::{self, Display};

use async_trait::async_trait;
use aws_sdk_cloudhsmv2::operation::describe_clusters::DescribeClustersOutput;
use tracing::{debug, instrument};

#[cfg(test)]
use mockall::automock;

use super::{MembersError, MembersResult};

/// Lifecycle state reported by the provider for a single HSM.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HsmState {
    Active,
    CreateInProgress,
    Degraded,
    DeleteInProgress,
    Deleted,
    /// A state this controller does not know about yet.
    Unknown(String),
}

impl From<&str> for HsmState {
    fn from(state: &str) -> Self {
        match state {
            "ACTIVE" => Self::Active,
            "CREATE_IN_PROGRESS" => Self::CreateInProgress,
            "DEGRADED" => Self::Degraded,
            "DELETE_IN_PROGRESS" => Self::DeleteInProgress,
            "DELETED" => Self::Deleted,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl Display for HsmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Active => "ACTIVE",
            Self::CreateInProgress => "CREATE_IN_PROGRESS",
            Self::Degraded => "DEGRADED",
            Self::DeleteInProgress => "DELETE_IN_PROGRESS",
            Self::Deleted => "DELETED",
            Self::Unknown(state) => state,
        })
    }
}

/// One member of an HSM cluster, as returned by the provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HsmMember {
    /// Network endpoint of the HSM
    pub address: String,
    pub state: HsmState,
}

impl HsmMember {
    pub fn new(address: impl Into<String>, state: HsmState) -> Self {
        Self {
            address: address.into(),
            state,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == HsmState::Active
    }
}

/// Remote query returning the current members of an HSM cluster.
///
/// Members are returned in provider order, in a single page.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterMembersApi: Send + Sync {
    async fn list_cluster_members(&self, cluster_id: &str) -> MembersResult<Vec<HsmMember>>;
}

/// AWS CloudHSM v2 backed membership query.
#[derive(Clone, Debug)]
pub struct CloudHsmApi {
    client: aws_sdk_cloudhsmv2::Client,
}

impl CloudHsmApi {
    pub fn new(client: aws_sdk_cloudhsmv2::Client) -> Self {
        Self { client }
    }

    /// Build the client from the default AWS config chain (env, profile, IMDS).
    pub async fn from_env() -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(aws_sdk_cloudhsmv2::Client::new(&config))
    }
}

#[async_trait]
impl ClusterMembersApi for CloudHsmApi {
    async fn list_cluster_members(&self, cluster_id: &str) -> MembersResult<Vec<HsmMember>> {
        let output = self
            .client
            .describe_clusters()
            .filters("clusterIds", vec![cluster_id.to_string()])
            .send()
            .await
            .map_err(aws_sdk_cloudhsmv2::Error::from)
            .map_err(|e| MembersError::Remote(Box::new(e)))?;

        Ok(members_from(&output))
    }
}

/// Flattens `clusters[*].hsms[*]` of a `DescribeClusters` response in response order.
fn members_from(output: &DescribeClustersOutput) -> Vec<HsmMember> {
    output
        .clusters()
        .iter()
        .flat_map(|cluster| cluster.hsms())
        .filter_map(|hsm| {
            let state = hsm
                .state()
                .map(|s| HsmState::from(s.as_str()))
                .unwrap_or_else(|| HsmState::Unknown(String::new()));
            match hsm.eni_ip() {
                Some(address) => Some(HsmMember::new(address, state)),
                // Dropped even when active, an empty endpoint would end up in `hsm_ips`
                None => {
                    debug!(hsm_id = hsm.hsm_id(), %state, "Skipping HSM without address");
                    None
                }
            }
        })
        .collect()
}

/// Resolves the reachable endpoints of an HSM cluster.
///
/// The underlying API handle is injected on construction and shared read-only
/// between calls.
#[derive(Clone, Debug)]
pub struct MemberResolver<M> {
    api: M,
}

impl<M: ClusterMembersApi> MemberResolver<M> {
    pub fn new(api: M) -> Self {
        Self { api }
    }

    /// Addresses of the active cluster members, in the order the provider
    /// returned them. Members in any other state are left out.
    #[instrument(skip(self))]
    pub async fn list_active_addresses(&self, cluster_id: &str) -> MembersResult<Vec<String>> {
        let members = self.api.list_cluster_members(cluster_id).await?;
        let total = members.len();

        let addresses: Vec<String> = members
            .into_iter()
            .filter(HsmMember::is_active)
            .map(|m| m.address)
            .collect();

        debug!(total, active = addresses.len(), "Resolved cluster members");
        Ok(addresses)
    }
}
