//! Usage metrics and the impact summary for the dashboard.

use crate::community::ContributionStats;
use crate::error::StoreError;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sled::Db;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

const METRICS_TREE: &str = "metrics";
const SNAPSHOT_KEY: &str = "snapshot";

/// Countries counted toward global-south reach in the impact summary.
const GLOBAL_SOUTH: [&str; 18] = [
    "Nigeria", "Kenya", "Ghana", "South Africa", "Ethiopia", "Tanzania", "Uganda", "Senegal",
    "Cameroon", "India", "Bangladesh", "Pakistan", "Indonesia", "Philippines", "Vietnam",
    "Brazil", "Mexico", "Turkey",
];

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    queries_answered: u64,
    cultures_accessed: HashMap<String, u64>,
    languages_used: HashMap<String, u64>,
    daily_queries: HashMap<String, u64>,
    user_countries: HashMap<String, u64>,
}

/// Tracks query counters in memory (dashmap) and persists a snapshot to a
/// Sled tree on every update so restarts keep the numbers.
pub struct MetricsTracker {
    db: Db,
    queries_answered: AtomicU64,
    cultures_accessed: DashMap<String, u64>,
    languages_used: DashMap<String, u64>,
    daily_queries: DashMap<String, u64>,
    user_countries: DashMap<String, u64>,
}

impl MetricsTracker {
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Self::with_db(db)
    }

    /// Reuses an already-open Sled database.
    pub fn with_db(db: Db) -> Result<Self, StoreError> {
        let tracker = Self {
            db,
            queries_answered: AtomicU64::new(0),
            cultures_accessed: DashMap::new(),
            languages_used: DashMap::new(),
            daily_queries: DashMap::new(),
            user_countries: DashMap::new(),
        };
        tracker.load()?;
        Ok(tracker)
    }

    fn load(&self) -> Result<(), StoreError> {
        let tree = self.db.open_tree(METRICS_TREE)?;
        if let Some(bytes) = tree.get(SNAPSHOT_KEY)? {
            let snap: Snapshot = serde_json::from_slice(&bytes)?;
            self.queries_answered.store(snap.queries_answered, Ordering::Relaxed);
            for (k, v) in snap.cultures_accessed {
                self.cultures_accessed.insert(k, v);
            }
            for (k, v) in snap.languages_used {
                self.languages_used.insert(k, v);
            }
            for (k, v) in snap.daily_queries {
                self.daily_queries.insert(k, v);
            }
            for (k, v) in snap.user_countries {
                self.user_countries.insert(k, v);
            }
        }
        Ok(())
    }

    fn persist(&self) {
        let snap = Snapshot {
            queries_answered: self.queries_answered.load(Ordering::Relaxed),
            cultures_accessed: to_map(&self.cultures_accessed),
            languages_used: to_map(&self.languages_used),
            daily_queries: to_map(&self.daily_queries),
            user_countries: to_map(&self.user_countries),
        };
        let result = self
            .db
            .open_tree(METRICS_TREE)
            .and_then(|tree| {
                let bytes = serde_json::to_vec(&snap).unwrap_or_default();
                tree.insert(SNAPSHOT_KEY, bytes).map(|_| ())
            });
        if let Err(e) = result {
            tracing::warn!(error = %e, "failed to persist metrics snapshot");
        }
    }

    /// Records one answered query.
    pub fn track_query(&self, culture: Option<&str>, language: &str) {
        self.queries_answered.fetch_add(1, Ordering::Relaxed);
        if let Some(culture) = culture.filter(|c| !c.is_empty()) {
            *self.cultures_accessed.entry(culture.to_string()).or_insert(0) += 1;
        }
        let language = if language.is_empty() { "en" } else { language };
        *self.languages_used.entry(language.to_string()).or_insert(0) += 1;
        *self.daily_queries.entry(today_key()).or_insert(0) += 1;
        self.persist();
    }

    /// Records the caller's country (from IP geolocation upstream of us).
    pub fn track_country(&self, country: &str) {
        if country.is_empty() {
            return;
        }
        *self.user_countries.entry(country.to_string()).or_insert(0) += 1;
        self.persist();
    }

    /// Raw counters plus unique counts.
    pub fn metrics(&self) -> serde_json::Value {
        let cultures = to_map(&self.cultures_accessed);
        let languages = to_map(&self.languages_used);
        let countries = to_map(&self.user_countries);
        serde_json::json!({
            "total_queries": self.queries_answered.load(Ordering::Relaxed),
            "cultures_accessed": cultures,
            "languages_used": languages,
            "daily_queries": to_map(&self.daily_queries),
            "user_countries": countries,
            "unique_cultures": cultures.len(),
            "unique_languages": languages.len(),
            "unique_countries": countries.len(),
        })
    }

    /// Nested impact summary for the dashboard, folding in community stats.
    pub fn impact_summary(
        &self,
        total_cultures: usize,
        total_items: usize,
        community: &ContributionStats,
    ) -> serde_json::Value {
        let total_queries = self.queries_answered.load(Ordering::Relaxed);
        let cultures = to_map(&self.cultures_accessed);
        let languages = to_map(&self.languages_used);
        let countries = to_map(&self.user_countries);
        let daily = to_map(&self.daily_queries);

        let approved = community
            .by_status
            .get("approved")
            .copied()
            .unwrap_or(0);
        let access_coverage = if total_cultures > 0 {
            format!("{:.1}%", cultures.len() as f64 / total_cultures as f64 * 100.0)
        } else {
            "0%".to_string()
        };

        let global_south_count = countries
            .keys()
            .filter(|c| GLOBAL_SOUTH.contains(&c.as_str()))
            .count();
        let global_south_pct = if countries.is_empty() {
            0.0
        } else {
            global_south_count as f64 / countries.len() as f64 * 100.0
        };

        serde_json::json!({
            "cultural_preservation": {
                "total_cultures_preserved": total_cultures,
                "total_cultural_items": total_items,
                "cultures_accessed": cultures.len(),
                "access_coverage": access_coverage,
                "knowledge_graph_nodes": total_items + approved,
                "knowledge_graph_growth": format!("+{} from community", approved),
            },
            "community_impact": {
                "total_queries_answered": total_queries,
                "unique_countries_reached": countries.len(),
                "languages_supported": languages.len(),
                "user_countries": countries,
                "global_south_reach": {
                    "countries": global_south_count,
                    "percentage": format!("{:.1}%", global_south_pct),
                },
            },
            "community_engagement": {
                "total_contributions": community.total_contributions,
                "approved_contributions": approved,
                "cultural_experts": community.total_experts,
                "tokens_distributed": community.total_rewards_distributed,
            },
            "growth": {
                "daily_queries": daily,
                "trending": trend(&daily),
                "average_daily_queries": total_queries as f64 / daily.len().max(1) as f64,
            },
        })
    }
}

fn to_map(map: &DashMap<String, u64>) -> HashMap<String, u64> {
    map.iter().map(|e| (e.key().clone(), *e.value())).collect()
}

/// UTC day bucket, `YYYY-MM-DD`.
fn today_key() -> String {
    chrono::Utc::now().format("%Y-%m-%d").to_string()
}

/// Classifies the query trend from recent vs. older daily counts.
fn trend(daily: &HashMap<String, u64>) -> &'static str {
    if daily.len() < 2 {
        return "stable";
    }
    let mut dates: Vec<&String> = daily.keys().collect();
    dates.sort();
    // With fewer than 3 days only the latest day counts as recent, so the
    // baseline day is never part of both windows.
    let recent: u64 = if dates.len() >= 3 {
        dates.iter().rev().take(3).map(|d| daily[*d]).sum()
    } else {
        daily[dates[dates.len() - 1]]
    };
    let older: u64 = if dates.len() >= 6 {
        dates[dates.len() - 6..dates.len() - 3]
            .iter()
            .map(|d| daily[*d])
            .sum()
    } else {
        daily[dates[0]]
    };
    if older == 0 {
        return "growing";
    }
    let change = (recent as f64 - older as f64) / older as f64;
    if change > 0.2 {
        "growing"
    } else if change < -0.2 {
        "declining"
    } else {
        "stable"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_query_increments_counters() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = MetricsTracker::open_path(dir.path()).unwrap();
        tracker.track_query(Some("Yoruba"), "en");
        tracker.track_query(Some("Yoruba"), "fr");
        tracker.track_query(None, "en");

        let m = tracker.metrics();
        assert_eq!(m["total_queries"], 3);
        assert_eq!(m["cultures_accessed"]["Yoruba"], 2);
        assert_eq!(m["unique_languages"], 2);
    }

    #[test]
    fn snapshot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let tracker = MetricsTracker::open_path(dir.path()).unwrap();
            tracker.track_query(Some("Zulu"), "en");
        }
        let tracker = MetricsTracker::open_path(dir.path()).unwrap();
        assert_eq!(tracker.metrics()["total_queries"], 1);
        assert_eq!(tracker.metrics()["cultures_accessed"]["Zulu"], 1);
    }

    #[test]
    fn impact_summary_reports_coverage_and_rewards() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = MetricsTracker::open_path(dir.path()).unwrap();
        tracker.track_query(Some("Yoruba"), "en");
        tracker.track_country("Nigeria");

        let mut community = ContributionStats::default();
        community.total_contributions = 4;
        community.by_status.insert("approved".into(), 2);
        community.total_rewards_distributed = 150;

        let impact = tracker.impact_summary(16, 160, &community);
        assert_eq!(impact["cultural_preservation"]["knowledge_graph_nodes"], 162);
        assert_eq!(impact["community_engagement"]["tokens_distributed"], 150);
        assert_eq!(
            impact["community_impact"]["global_south_reach"]["countries"],
            1
        );
        assert_eq!(impact["growth"]["trending"], "stable");
    }

    #[test]
    fn two_day_trend_compares_only_the_latest_day_against_the_first() {
        let mut daily = HashMap::new();
        daily.insert("2026-08-29".to_string(), 5);
        daily.insert("2026-08-30".to_string(), 1);
        assert_eq!(trend(&daily), "declining");

        let mut daily = HashMap::new();
        daily.insert("2026-08-29".to_string(), 1);
        daily.insert("2026-08-30".to_string(), 5);
        assert_eq!(trend(&daily), "growing");
    }

    #[test]
    fn trend_grows_when_recent_outpaces_older() {
        let mut daily = HashMap::new();
        daily.insert("2026-08-25".to_string(), 1);
        daily.insert("2026-08-29".to_string(), 5);
        daily.insert("2026-08-30".to_string(), 6);
        assert_eq!(trend(&daily), "growing");
        assert_eq!(trend(&HashMap::new()), "stable");
    }
}
