//! Filesystem-backed Knowledge Card store (spec §4.4 "Knowledge Card
//! Store", §6 "Persistent state: per-domain JSON card files plus a
//! domain index; archived previous versions kept under a timestamped
//! subpath").
//!
//! Layout, rooted at `base_dir` (defaults to `~/.agentbrowse/site-memory`
//! when not overridden for tests):
//! ```text
//! site-memory/
//! ├── cards/{domain}.json
//! └── archive/{domain}/{version}-{timestamp}.json
//! ```

use crate::card::KnowledgeCard;
use crate::error::{Result, SiteMemoryError};
use std::path::{Path, PathBuf};

const CARDS_DIR: &str = "cards";
const ARCHIVE_DIR: &str = "archive";

pub struct CardStore {
    root: PathBuf,
}

impl CardStore {
    pub fn new(base_dir: Option<&Path>) -> Result<Self> {
        let root = match base_dir {
            Some(dir) => dir.to_path_buf(),
            None => dirs::data_dir()
                .ok_or_else(|| SiteMemoryError::InvalidDomain("no data directory".to_string()))?
                .join("agentbrowse")
                .join("site-memory"),
        };
        std::fs::create_dir_all(root.join(CARDS_DIR))?;
        std::fs::create_dir_all(root.join(ARCHIVE_DIR))?;
        Ok(Self { root })
    }

    fn validate_domain(domain: &str) -> Result<()> {
        if domain.is_empty()
            || !domain
                .chars()
                .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
        {
            return Err(SiteMemoryError::InvalidDomain(domain.to_string()));
        }
        Ok(())
    }

    fn card_path(&self, domain: &str) -> PathBuf {
        self.root.join(CARDS_DIR).join(format!("{domain}.json"))
    }

    fn archive_path(&self, domain: &str, version: u32) -> PathBuf {
        let timestamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%3f");
        self.root
            .join(ARCHIVE_DIR)
            .join(domain)
            .join(format!("{version}-{timestamp}.json"))
    }

    pub fn load(&self, domain: &str) -> Result<KnowledgeCard> {
        Self::validate_domain(domain)?;
        let path = self.card_path(domain);
        if !path.exists() {
            return Err(SiteMemoryError::DomainNotFound(domain.to_string()));
        }
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn load_or_new(&self, domain: &str) -> Result<KnowledgeCard> {
        match self.load(domain) {
            Ok(card) => Ok(card),
            Err(SiteMemoryError::DomainNotFound(_)) => Ok(KnowledgeCard::new(domain.to_string())),
            Err(e) => Err(e),
        }
    }

    /// Saves `card`, bumping its version and archiving whatever was
    /// there before under a timestamped path (spec §4.4 "Versioning").
    pub fn save(&self, mut card: KnowledgeCard) -> Result<KnowledgeCard> {
        Self::validate_domain(&card.domain)?;
        let path = self.card_path(&card.domain);

        if path.exists() {
            let previous_bytes = std::fs::read(&path)?;
            let previous: KnowledgeCard = serde_json::from_slice(&previous_bytes)?;
            let archive_path = self.archive_path(&card.domain, previous.version);
            if let Some(parent) = archive_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&archive_path, previous_bytes)?;
            card.version = previous.version + 1;
        } else {
            card.version = 1;
        }
        card.updated_at = chrono::Utc::now();

        let json = serde_json::to_vec_pretty(&card)?;
        std::fs::write(&path, json)?;
        log::debug!("saved site memory card for '{}' (v{})", card.domain, card.version);
        Ok(card)
    }

    /// Restores the most recent archived version of `domain`'s card as
    /// the current one, archiving the current version in turn.
    pub fn restore_previous(&self, domain: &str) -> Result<KnowledgeCard> {
        Self::validate_domain(domain)?;
        let archive_dir = self.root.join(ARCHIVE_DIR).join(domain);
        if !archive_dir.exists() {
            return Err(SiteMemoryError::DomainNotFound(domain.to_string()));
        }
        let mut entries: Vec<PathBuf> = std::fs::read_dir(&archive_dir)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .collect();
        entries.sort();
        let latest = entries
            .pop()
            .ok_or_else(|| SiteMemoryError::DomainNotFound(domain.to_string()))?;
        let bytes = std::fs::read(&latest)?;
        let restored: KnowledgeCard = serde_json::from_slice(&bytes)?;
        self.save(restored)
    }

    /// An index of every domain with a card on disk, each annotated with
    /// its top pattern snippets, for the pre-recall LLM prompt (spec §4.2
    /// "Pre-recall", §4.4 "listDomains()").
    pub fn list_domains(&self) -> Result<Vec<(String, Vec<String>)>> {
        let cards_dir = self.root.join(CARDS_DIR);
        let mut out = Vec::new();
        for entry in std::fs::read_dir(&cards_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = std::fs::read(&path)?;
            let card: KnowledgeCard = serde_json::from_slice(&bytes)?;
            out.push((card.domain.clone(), card.top_snippets(3)));
        }
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::{Pattern, PatternType};

    fn temp_store() -> (tempfile::TempDir, CardStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = CardStore::new(Some(dir.path())).unwrap();
        (dir, store)
    }

    #[test]
    fn load_missing_domain_errors() {
        let (_dir, store) = temp_store();
        assert!(matches!(
            store.load("example.com"),
            Err(SiteMemoryError::DomainNotFound(_))
        ));
    }

    #[test]
    fn save_then_load_round_trips() {
        let (_dir, store) = temp_store();
        let mut card = KnowledgeCard::new("example.com".to_string());
        card.patterns.push(Pattern::new(
            PatternType::Selector,
            "#login".to_string(),
            "login button".to_string(),
        ));
        store.save(card).unwrap();

        let loaded = store.load("example.com").unwrap();
        assert_eq!(loaded.patterns.len(), 1);
        assert_eq!(loaded.version, 1);
    }

    #[test]
    fn second_save_bumps_version_and_archives_first() {
        let (_dir, store) = temp_store();
        store.save(KnowledgeCard::new("example.com".to_string())).unwrap();
        let second = store.save(KnowledgeCard::new("example.com".to_string())).unwrap();
        assert_eq!(second.version, 2);

        let archived = std::fs::read_dir(store.root.join(ARCHIVE_DIR).join("example.com"))
            .unwrap()
            .count();
        assert_eq!(archived, 1);
    }

    #[test]
    fn invalid_domain_is_rejected() {
        let (_dir, store) = temp_store();
        assert!(matches!(
            store.save(KnowledgeCard::new("not a domain!".to_string())),
            Err(SiteMemoryError::InvalidDomain(_))
        ));
    }

    #[test]
    fn list_domains_includes_saved_cards() {
        let (_dir, store) = temp_store();
        store.save(KnowledgeCard::new("a.com".to_string())).unwrap();
        store.save(KnowledgeCard::new("b.com".to_string())).unwrap();
        let domains: Vec<String> = store.list_domains().unwrap().into_iter().map(|(d, _)| d).collect();
        assert_eq!(domains, vec!["a.com".to_string(), "b.com".to_string()]);
    }
}
