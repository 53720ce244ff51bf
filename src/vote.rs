use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

pub const SCORES: [u8; 3] = [1, 2, 3];

const VOTE_PATH: &str = "/api/vote/";
const UNVOTE_PATH: &str = "/api/unvote/";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRequest {
    pub battle_name: String,
    pub entry_id: String,
    pub score: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnvoteRequest {
    pub battle_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Vote(VoteRequest),
    Unvote(UnvoteRequest),
}

/// One listener's scores for one battle. A score value belongs to at most one
/// entry and an entry holds at most one score.
#[derive(Debug, Clone, Default)]
pub struct Ballot {
    battle: String,
    scores: HashMap<String, u8>,
}

impl Ballot {
    pub fn new(battle: &str) -> Self {
        Self {
            battle: battle.to_string(),
            scores: HashMap::new(),
        }
    }

    pub fn score_for(&self, entry_id: &str) -> Option<u8> {
        self.scores.get(entry_id).copied()
    }

    pub fn is_marked(&self, entry_id: &str, score: u8) -> bool {
        self.score_for(entry_id) == Some(score)
    }

    pub fn cast(&mut self, entry_id: &str, score: u8) -> Result<Submission> {
        anyhow::ensure!(SCORES.contains(&score), "invalid score {score}");
        self.scores.retain(|_, existing| *existing != score);
        self.scores.insert(entry_id.to_string(), score);
        Ok(Submission::Vote(VoteRequest {
            battle_name: self.battle.clone(),
            entry_id: entry_id.to_string(),
            score,
        }))
    }

    pub fn retract(&mut self) -> Submission {
        self.scores.clear();
        Submission::Unvote(UnvoteRequest {
            battle_name: self.battle.clone(),
        })
    }
}

pub trait VoteClient: Send + Sync {
    fn submit(&self, submission: &Submission) -> Result<()>;
}

pub struct HttpVoteClient {
    base_url: String,
    http: reqwest::blocking::Client,
}

impl HttpVoteClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<()> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .with_context(|| format!("failed to reach {url}"))?;
        let status = response.status();
        anyhow::ensure!(status.is_success(), "{url} answered {status}");
        Ok(())
    }
}

impl VoteClient for HttpVoteClient {
    fn submit(&self, submission: &Submission) -> Result<()> {
        match submission {
            Submission::Vote(request) => self.post(VOTE_PATH, request),
            Submission::Unvote(request) => self.post(UNVOTE_PATH, request),
        }
    }
}

/// Sends in the background; the outcome is only logged.
pub fn submit_detached(client: Arc<dyn VoteClient>, submission: Submission) {
    thread::spawn(move || match client.submit(&submission) {
        Ok(()) => debug!(?submission, "vote submitted"),
        Err(err) => warn!("vote submission failed: {err:#}"),
    });
}
