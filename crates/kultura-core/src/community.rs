//! Community contribution ledger: submissions, expert validation, and the
//! fixed token-reward table.

use crate::error::StoreError;
use crate::model::{now_ms, Contribution, ContributionStatus, ContributionType, Review};
use serde::{Deserialize, Serialize};
use sled::Db;
use std::collections::HashMap;
use std::path::Path;

const CONTRIBUTIONS_TREE: &str = "contributions";
const EXPERTS_TREE: &str = "experts";

/// Receipt returned to the contributor on submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitReceipt {
    pub contribution_id: String,
    pub status: ContributionStatus,
    pub estimated_reward: u64,
    pub message: String,
}

/// Aggregate contribution statistics for the impact dashboard.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContributionStats {
    pub total_contributions: usize,
    pub by_status: HashMap<String, usize>,
    pub by_type: HashMap<String, usize>,
    pub by_culture: HashMap<String, usize>,
    pub total_rewards_distributed: u64,
    pub total_experts: usize,
    pub cultures_with_experts: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ExpertRecord {
    expert_address: String,
    culture: String,
    credentials: serde_json::Value,
    registered_at_ms: i64,
    reviews_completed: u64,
    reputation_score: u32,
}

/// Sled-backed ledger. Contributions are keyed by id; experts by
/// `{culture}/{address}` so one scan lists a culture's validators.
pub struct CommunityLedger {
    db: Db,
}

impl CommunityLedger {
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// Records a new pending contribution and returns its receipt with the
    /// estimated reward from the fixed table.
    pub fn submit(
        &self,
        contributor_address: &str,
        contribution_type: ContributionType,
        culture: &str,
        data: serde_json::Value,
    ) -> Result<SubmitReceipt, StoreError> {
        if contributor_address.trim().is_empty() {
            return Err(StoreError::Invalid("contributor_address is required".into()));
        }
        let contribution_id = format!("contrib-{}", uuid::Uuid::new_v4());
        let now = now_ms();
        let contribution = Contribution {
            contribution_id: contribution_id.clone(),
            contributor_address: contributor_address.to_string(),
            contribution_type,
            data,
            culture: culture.to_string(),
            status: ContributionStatus::Pending,
            created_at_ms: now,
            updated_at_ms: now,
            reviews: vec![],
            token_reward: 0,
        };
        self.put_contribution(&contribution)?;

        tracing::info!(
            contribution_id = %contribution_id,
            contributor = %contributor_address,
            "new contribution submitted"
        );

        Ok(SubmitReceipt {
            contribution_id,
            status: ContributionStatus::Pending,
            estimated_reward: contribution_type.reward(),
            message: "Contribution submitted successfully. Awaiting expert review.".into(),
        })
    }

    /// Registers a cultural expert validator for a culture.
    pub fn register_expert(
        &self,
        expert_address: &str,
        culture: &str,
        credentials: serde_json::Value,
    ) -> Result<(), StoreError> {
        if expert_address.trim().is_empty() {
            return Err(StoreError::Invalid("expert_address is required".into()));
        }
        let record = ExpertRecord {
            expert_address: expert_address.to_string(),
            culture: culture.to_string(),
            credentials,
            registered_at_ms: now_ms(),
            reviews_completed: 0,
            reputation_score: 100,
        };
        let tree = self.db.open_tree(EXPERTS_TREE)?;
        tree.insert(
            expert_key(culture, expert_address),
            serde_json::to_vec(&record)?,
        )?;
        tracing::info!(expert = %expert_address, culture = %culture, "expert registered");
        Ok(())
    }

    /// Applies an expert review. The reviewer must be registered for the
    /// contribution's culture. Approval pays the fixed reward; rejection
    /// becomes `needs_revision` when changes were suggested.
    pub fn submit_review(
        &self,
        contribution_id: &str,
        expert_address: &str,
        approved: bool,
        feedback: &str,
        suggested_changes: Option<serde_json::Value>,
    ) -> Result<Contribution, StoreError> {
        let mut contribution = self
            .get_contribution(contribution_id)?
            .ok_or_else(|| StoreError::NotFound(format!("contribution {contribution_id}")))?;

        let experts = self.db.open_tree(EXPERTS_TREE)?;
        let key = expert_key(&contribution.culture, expert_address);
        let Some(bytes) = experts.get(&key)? else {
            return Err(StoreError::Invalid(format!(
                "{} is not a registered expert for {} culture",
                expert_address, contribution.culture
            )));
        };

        contribution.reviews.push(Review {
            expert_address: expert_address.to_string(),
            approved,
            feedback: feedback.to_string(),
            suggested_changes: suggested_changes.clone(),
            reviewed_at_ms: now_ms(),
        });
        contribution.updated_at_ms = now_ms();
        if approved {
            contribution.status = ContributionStatus::Approved;
            contribution.token_reward = contribution.contribution_type.reward();
        } else if suggested_changes.is_some() {
            contribution.status = ContributionStatus::NeedsRevision;
        } else {
            contribution.status = ContributionStatus::Rejected;
        }
        self.put_contribution(&contribution)?;

        let mut expert: ExpertRecord = serde_json::from_slice(&bytes)?;
        expert.reviews_completed += 1;
        experts.insert(&key, serde_json::to_vec(&expert)?)?;

        tracing::info!(
            contribution_id = %contribution_id,
            expert = %expert_address,
            approved,
            "review submitted"
        );
        Ok(contribution)
    }

    pub fn get_contribution(&self, id: &str) -> Result<Option<Contribution>, StoreError> {
        let tree = self.db.open_tree(CONTRIBUTIONS_TREE)?;
        match tree.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Pending contributions, optionally filtered by culture.
    pub fn pending(&self, culture: Option<&str>) -> Result<Vec<Contribution>, StoreError> {
        Ok(self
            .all_contributions()?
            .into_iter()
            .filter(|c| c.status == ContributionStatus::Pending)
            .filter(|c| culture.map_or(true, |wanted| c.culture == wanted))
            .collect())
    }

    pub fn stats(&self) -> Result<ContributionStats, StoreError> {
        let mut stats = ContributionStats::default();
        for c in self.all_contributions()? {
            stats.total_contributions += 1;
            *stats
                .by_status
                .entry(c.status.as_str().to_string())
                .or_default() += 1;
            *stats
                .by_type
                .entry(c.contribution_type.as_str().to_string())
                .or_default() += 1;
            *stats.by_culture.entry(c.culture).or_default() += 1;
            stats.total_rewards_distributed += c.token_reward;
        }

        let experts = self.db.open_tree(EXPERTS_TREE)?;
        let mut cultures = std::collections::HashSet::new();
        for entry in experts.iter() {
            let (_, bytes) = entry?;
            let record: ExpertRecord = serde_json::from_slice(&bytes)?;
            cultures.insert(record.culture);
            stats.total_experts += 1;
        }
        stats.cultures_with_experts = cultures.len();
        Ok(stats)
    }

    fn all_contributions(&self) -> Result<Vec<Contribution>, StoreError> {
        let tree = self.db.open_tree(CONTRIBUTIONS_TREE)?;
        let mut out = Vec::with_capacity(tree.len());
        for entry in tree.iter() {
            let (_, bytes) = entry?;
            out.push(serde_json::from_slice(&bytes)?);
        }
        Ok(out)
    }

    fn put_contribution(&self, contribution: &Contribution) -> Result<(), StoreError> {
        let tree = self.db.open_tree(CONTRIBUTIONS_TREE)?;
        tree.insert(
            contribution.contribution_id.as_bytes(),
            serde_json::to_vec(contribution)?,
        )?;
        Ok(())
    }
}

fn expert_key(culture: &str, address: &str) -> Vec<u8> {
    format!("{culture}/{address}").into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> (tempfile::TempDir, CommunityLedger) {
        let dir = tempfile::tempdir().unwrap();
        let ledger = CommunityLedger::open_path(dir.path()).unwrap();
        (dir, ledger)
    }

    #[test]
    fn submit_returns_estimated_reward_from_table() {
        let (_dir, ledger) = ledger();
        let receipt = ledger
            .submit(
                "fetch1qxyz",
                ContributionType::NewArtifact,
                "Yoruba",
                serde_json::json!({ "title": "Gelede mask" }),
            )
            .unwrap();
        assert_eq!(receipt.estimated_reward, 100);
        assert_eq!(receipt.status, ContributionStatus::Pending);
        assert!(ledger
            .get_contribution(&receipt.contribution_id)
            .unwrap()
            .is_some());
    }

    #[test]
    fn empty_contributor_address_is_rejected() {
        let (_dir, ledger) = ledger();
        let err = ledger
            .submit("  ", ContributionType::Translation, "Hausa", serde_json::json!({}))
            .unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
    }

    #[test]
    fn review_requires_registered_expert_for_culture() {
        let (_dir, ledger) = ledger();
        let receipt = ledger
            .submit(
                "fetch1abc",
                ContributionType::CulturalContext,
                "Zulu",
                serde_json::json!({ "title": "Reed Dance context" }),
            )
            .unwrap();

        let err = ledger
            .submit_review(&receipt.contribution_id, "fetch1nobody", true, "ok", None)
            .unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));

        ledger
            .register_expert("fetch1expert", "Zulu", serde_json::json!({ "degree": "PhD" }))
            .unwrap();
        let reviewed = ledger
            .submit_review(&receipt.contribution_id, "fetch1expert", true, "accurate", None)
            .unwrap();
        assert_eq!(reviewed.status, ContributionStatus::Approved);
        assert_eq!(reviewed.token_reward, 75);
    }

    #[test]
    fn rejection_without_changes_is_terminal() {
        let (_dir, ledger) = ledger();
        ledger
            .register_expert("fetch1expert", "Akan", serde_json::json!({}))
            .unwrap();
        let receipt = ledger
            .submit("fetch1abc", ContributionType::Verification, "Akan", serde_json::json!({}))
            .unwrap();

        let rejected = ledger
            .submit_review(&receipt.contribution_id, "fetch1expert", false, "unsourced", None)
            .unwrap();
        assert_eq!(rejected.status, ContributionStatus::Rejected);
        assert_eq!(rejected.token_reward, 0);

        let revise = ledger
            .submit(
                "fetch1abc",
                ContributionType::Verification,
                "Akan",
                serde_json::json!({}),
            )
            .and_then(|r| {
                ledger.submit_review(
                    &r.contribution_id,
                    "fetch1expert",
                    false,
                    "fix the dates",
                    Some(serde_json::json!({ "year": "1900" })),
                )
            })
            .unwrap();
        assert_eq!(revise.status, ContributionStatus::NeedsRevision);
    }

    #[test]
    fn pending_filters_by_culture_and_stats_aggregate() {
        let (_dir, ledger) = ledger();
        ledger
            .submit("fetch1a", ContributionType::NewArtifact, "Yoruba", serde_json::json!({}))
            .unwrap();
        ledger
            .submit("fetch1b", ContributionType::Translation, "Hausa", serde_json::json!({}))
            .unwrap();

        assert_eq!(ledger.pending(None).unwrap().len(), 2);
        assert_eq!(ledger.pending(Some("Yoruba")).unwrap().len(), 1);
        assert!(ledger.pending(Some("Edo")).unwrap().is_empty());

        let stats = ledger.stats().unwrap();
        assert_eq!(stats.total_contributions, 2);
        assert_eq!(stats.by_status.get("pending"), Some(&2));
        assert_eq!(stats.by_type.get("new_artifact"), Some(&1));
        assert_eq!(stats.total_rewards_distributed, 0);
    }
}
