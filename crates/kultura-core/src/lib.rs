//! kultura-core: KulturaMind core library (domain model, config, knowledge
//! store, community contribution ledger, impact metrics).

mod community;
mod error;
mod knowledge;
mod metrics;
mod model;
mod shared;

pub use shared::KulturaConfig;

pub use model::{
    now_ms, Artifact, Category, Contribution, ContributionStatus, ContributionType, CulturalItem,
    Document, DocumentMeta, Review,
};

pub use error::StoreError;

pub use knowledge::KnowledgeStore;

pub use community::{CommunityLedger, ContributionStats, SubmitReceipt};

pub use metrics::MetricsTracker;
