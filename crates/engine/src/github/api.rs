// GitHub REST client for the branch existence probe.

use std::time::Duration;

use url::Url;

use super::context::{Credential, RepoSlug};
use crate::git::probe::{BranchProbe, ProbeError};

const USER_AGENT: &str = concat!("versioner/", env!("CARGO_PKG_VERSION"));
const API_VERSION: &str = "2022-11-28";

/// `GET /repos/{owner}/{repo}/branches/{branch}`: 200 means exists, 404 means absent.
#[derive(Debug, Clone)]
pub struct GitHubBranchProbe {
    client: reqwest::Client,
    api_url: Url,
    repository: RepoSlug,
    credential: Credential,
}

impl GitHubBranchProbe {
    pub fn new(
        api_url: &str,
        repository: RepoSlug,
        credential: Credential,
    ) -> Result<Self, ProbeError> {
        let api_url = Url::parse(api_url).map_err(|e| ProbeError::InvalidUrl(e.to_string()))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ProbeError::Http(e.to_string()))?;
        Ok(Self { client, api_url, repository, credential })
    }

    fn branch_url(&self, branch: &str) -> Result<Url, ProbeError> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| ProbeError::InvalidUrl(format!("{} cannot be a base", self.api_url)))?
            .pop_if_empty()
            .extend([
                "repos",
                self.repository.owner.as_str(),
                self.repository.name.as_str(),
                "branches",
            ])
            .extend(branch.split('/'));
        Ok(url)
    }
}

impl BranchProbe for GitHubBranchProbe {
    async fn branch_exists(&self, branch: &str) -> Result<bool, ProbeError> {
        let url = self.branch_url(branch)?;
        let mut request = self
            .client
            .get(url)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION);
        if !self.credential.is_empty() {
            request = request.bearer_auth(self.credential.expose());
        }

        let response = request.send().await.map_err(|e| ProbeError::Http(e.to_string()))?;
        match response.status() {
            reqwest::StatusCode::OK => Ok(true),
            reqwest::StatusCode::NOT_FOUND => Ok(false),
            status => Err(ProbeError::UnexpectedStatus(status.as_u16())),
        }
    }
}
