use serde::{Deserialize, Serialize};

use crate::config;

/// Maintenance terms recognized by the offline fallback. A complaint is
/// admissible iff at least one of these appears in it (case-insensitive).
const FALLBACK_KEYWORDS: &[&str] = &[
    "rem", "ban", "oli", "mesin", "servis", "lampu", "busi", "aki", "karbu",
    "cvt", "kampas", "rantai", "bensin", "stater", "starter", "gas", "spion",
    "jok",
];

/// Advisory estimate used when the inference endpoint supplied none or the
/// fallback classified the complaint.
const FALLBACK_MINS: u32 = 30;

/// Outcome of complaint triage. Always usable: the gate degrades to the
/// keyword heuristic instead of failing.
#[derive(Clone, Debug)]
pub struct Verdict {
    pub admissible: bool,

    /// Short diagnosis, or the rejection reason when inadmissible.
    pub summary: String,

    pub estimated_mins: u32,
}

/// Admissibility classifier for free-text complaints, backed by an external
/// inference endpoint.
pub struct Gate {
    http: reqwest::Client,
    config: Option<config::Inference>,
}

#[derive(Serialize)]
struct Request<'a> {
    issue: &'a str,
}

#[derive(Deserialize)]
struct Response {
    valid: bool,
    summary: String,
    mins: Option<u32>,
}

impl Gate {
    pub fn new(config: Option<config::Inference>) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Classifies a complaint. Any primary-path error (unconfigured
    /// endpoint, network failure, non-2xx, unparsable body) activates the
    /// keyword fallback, so check-in never observes a triage error.
    pub async fn classify(&self, issue: &str) -> Verdict {
        let Some(config) = &self.config else {
            return fallback(issue);
        };

        match self.request(config, issue).await {
            Ok(verdict) => verdict,
            Err(e) => {
                tracing::warn!("triage call failed, using fallback: {e}");
                fallback(issue)
            }
        }
    }

    async fn request(
        &self,
        config: &config::Inference,
        issue: &str,
    ) -> Result<Verdict, reqwest::Error> {
        let response = self
            .http
            .post(&config.chat_url)
            .bearer_auth(&config.api_key)
            .timeout(config.timeout)
            .json(&Request { issue })
            .send()
            .await?
            .error_for_status()?
            .json::<Response>()
            .await?;

        Ok(Verdict {
            admissible: response.valid,
            summary: response.summary,
            estimated_mins: response.mins.unwrap_or(FALLBACK_MINS),
        })
    }
}

fn fallback(issue: &str) -> Verdict {
    let issue = issue.to_lowercase();
    let admissible = FALLBACK_KEYWORDS.iter().any(|word| issue.contains(word));
    let summary = if admissible {
        "Validasi manual (server sibuk)"
    } else {
        "Gunakan kata kunci seputar motor"
    };
    Verdict {
        admissible,
        summary: summary.to_string(),
        estimated_mins: FALLBACK_MINS,
    }
}
