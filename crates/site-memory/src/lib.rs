//! Site Memory (spec §4.4): learns reusable action patterns from
//! successful runs and reinjects them into future runs on the same
//! domain.

pub mod capturer;
pub mod card;
pub mod domain;
pub mod error;
pub mod injector;
pub mod merge;
pub mod store;

pub use capturer::{capture_patterns, ToolUsageRecord};
pub use card::{KnowledgeCard, Pattern, PatternType};
pub use domain::{extract_domain_from_task, normalize_domain};
pub use error::SiteMemoryError;
pub use injector::build_prompt_snippet;
pub use merge::merge_patterns;
pub use store::CardStore;
