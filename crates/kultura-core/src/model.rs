//! Domain model shared across the KulturaMind crates.

use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Cultural item category. String forms match the seed-data keys
/// (`festivals`, `art_forms`, ...) minus the plural.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Festival,
    ArtForm,
    Tradition,
    Language,
    Proverb,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Festival,
        Category::ArtForm,
        Category::Tradition,
        Category::Language,
        Category::Proverb,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Festival => "festival",
            Category::ArtForm => "art_form",
            Category::Tradition => "tradition",
            Category::Language => "language",
            Category::Proverb => "proverb",
        }
    }

    /// Pluralized key used by the seed file and the Sled tree names.
    pub fn tree_name(&self) -> &'static str {
        match self {
            Category::Festival => "festivals",
            Category::ArtForm => "art_forms",
            Category::Tradition => "traditions",
            Category::Language => "languages",
            Category::Proverb => "proverbs",
        }
    }

    pub fn from_tree_name(name: &str) -> Option<Category> {
        Category::ALL.iter().copied().find(|c| c.tree_name() == name)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable cultural reference item (festival, art form, tradition, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CulturalItem {
    pub id: String,
    pub name: String,
    pub culture: String,
    pub category: Category,
    pub description: String,
    #[serde(default)]
    pub significance: String,
    #[serde(default)]
    pub sources: Vec<String>,
}

/// Static artifact record rendered on the frontend map.
/// `cultural_context` serializes as `culturalContext` for frontend compatibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: String,
    pub name: String,
    pub location: String,
    /// (longitude, latitude)
    pub coordinates: [f64; 2],
    pub era: String,
    pub year: String,
    pub description: String,
    pub significance: String,
    #[serde(rename = "culturalContext", default)]
    pub cultural_context: String,
    pub culture: String,
}

/// Metadata carried with every retrieval document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub culture: String,
    #[serde(default)]
    pub category: String,
}

/// Retrieval unit shared by search results and LLM context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
    #[serde(rename = "type")]
    pub doc_type: String,
    #[serde(default)]
    pub metadata: DocumentMeta,
    #[serde(default)]
    pub score: f32,
}

impl Document {
    pub fn from_item(item: &CulturalItem) -> Self {
        Document {
            id: item.id.clone(),
            text: if item.description.is_empty() {
                item.name.clone()
            } else {
                item.description.clone()
            },
            doc_type: item.category.as_str().to_string(),
            metadata: DocumentMeta {
                name: item.name.clone(),
                culture: item.culture.clone(),
                category: item.category.as_str().to_string(),
            },
            score: 0.0,
        }
    }
}

/// Community contribution type. Determines the token reward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributionType {
    NewArtifact,
    ArtifactUpdate,
    CulturalContext,
    Translation,
    Verification,
    ExpertReview,
}

impl ContributionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContributionType::NewArtifact => "new_artifact",
            ContributionType::ArtifactUpdate => "artifact_update",
            ContributionType::CulturalContext => "cultural_context",
            ContributionType::Translation => "translation",
            ContributionType::Verification => "verification",
            ContributionType::ExpertReview => "expert_review",
        }
    }

    pub fn parse(s: &str) -> Option<ContributionType> {
        match s {
            "new_artifact" => Some(ContributionType::NewArtifact),
            "artifact_update" => Some(ContributionType::ArtifactUpdate),
            "cultural_context" => Some(ContributionType::CulturalContext),
            "translation" => Some(ContributionType::Translation),
            "verification" => Some(ContributionType::Verification),
            "expert_review" => Some(ContributionType::ExpertReview),
            _ => None,
        }
    }

    /// Fixed token reward table.
    pub fn reward(&self) -> u64 {
        match self {
            ContributionType::NewArtifact => 100,
            ContributionType::ArtifactUpdate => 50,
            ContributionType::CulturalContext => 75,
            ContributionType::Translation => 60,
            ContributionType::Verification => 40,
            ContributionType::ExpertReview => 80,
        }
    }
}

/// Lifecycle of a contribution. `Approved` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributionStatus {
    Pending,
    UnderReview,
    Approved,
    Rejected,
    NeedsRevision,
}

impl ContributionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContributionStatus::Pending => "pending",
            ContributionStatus::UnderReview => "under_review",
            ContributionStatus::Approved => "approved",
            ContributionStatus::Rejected => "rejected",
            ContributionStatus::NeedsRevision => "needs_revision",
        }
    }
}

/// Expert review attached to a contribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub expert_address: String,
    pub approved: bool,
    pub feedback: String,
    #[serde(default)]
    pub suggested_changes: Option<serde_json::Value>,
    pub reviewed_at_ms: i64,
}

/// Community-submitted cultural data item awaiting expert approval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contribution {
    pub contribution_id: String,
    pub contributor_address: String,
    pub contribution_type: ContributionType,
    pub data: serde_json::Value,
    pub culture: String,
    pub status: ContributionStatus,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
    #[serde(default)]
    pub reviews: Vec<Review>,
    #[serde(default)]
    pub token_reward: u64,
}
