//! Thin HTTP client for a running node.

use anyhow::{bail, Context};
use serde_json::Value;

use liquid_rpc::handlers::{DelegateRequest, FinalizeRequest, ProposeRequest, VoteRequest};

#[derive(clap::Subcommand, Clone, Debug, PartialEq)]
pub enum ClientAction {
    /// List proposals in creation order.
    List,
    /// Submit a proposal.
    Propose { proposer_id: u32, statement: String },
    /// Vote directly: 1 for yes, 0 for no.
    Vote {
        proposal_id: String,
        voter_id: u32,
        #[arg(value_parser = clap::value_parser!(u8).range(0..=1))]
        choice: u8,
    },
    /// Hand your vote on a proposal to another participant.
    Delegate {
        proposal_id: String,
        voter_id: u32,
        delegate_id: u32,
    },
    /// Close a proposal and print the tally.
    Finalize { proposal_id: String, finalizer_id: u32 },
}

pub struct NodeClient {
    http: reqwest::Client,
    base: String,
}

impl NodeClient {
    pub fn new(base: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: base.trim_end_matches('/').to_string(),
        }
    }

    pub async fn run(&self, action: ClientAction) -> anyhow::Result<Value> {
        match action {
            ClientAction::List => self.get("/proposals").await,
            ClientAction::Propose {
                proposer_id,
                statement,
            } => {
                self.post(
                    "/propose",
                    &ProposeRequest {
                        proposer_id,
                        statement,
                    },
                )
                .await
            }
            ClientAction::Vote {
                proposal_id,
                voter_id,
                choice,
            } => {
                self.post(
                    "/vote",
                    &VoteRequest {
                        proposal_id,
                        voter_id,
                        is_yes: choice == 1,
                    },
                )
                .await
            }
            ClientAction::Delegate {
                proposal_id,
                voter_id,
                delegate_id,
            } => {
                self.post(
                    "/delegate",
                    &DelegateRequest {
                        proposal_id,
                        voter_id,
                        delegate_id,
                    },
                )
                .await
            }
            ClientAction::Finalize {
                proposal_id,
                finalizer_id,
            } => {
                self.post(
                    "/finalize",
                    &FinalizeRequest {
                        proposal_id,
                        finalizer_id,
                    },
                )
                .await
            }
        }
    }

    async fn get(&self, path: &str) -> anyhow::Result<Value> {
        let url = format!("{}{path}", self.base);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;
        Self::read(response).await
    }

    async fn post<T: serde::Serialize>(&self, path: &str, body: &T) -> anyhow::Result<Value> {
        let url = format!("{}{path}", self.base);
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("POST {url}"))?;
        Self::read(response).await
    }

    async fn read(response: reqwest::Response) -> anyhow::Result<Value> {
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .context("node returned a non-JSON body")?;
        if !status.is_success() {
            let message = body["message"].as_str().unwrap_or("request failed");
            bail!("{status}: {message}");
        }
        Ok(body)
    }
}
