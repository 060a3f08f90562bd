//! Practice-question recommendation.
//!
//! Embeds a query and returns the nearest questions from the question index
//! together with their answer options. Where the options come from is set by
//! [`OptionsPolicy`]:
//!
//! - `Persisted`: the options stored next to each question at index time.
//! - `Reload`: the question table is re-read on every call and the options at
//!   the same row position are used, so option edits show up without a
//!   rebuild. A row whose question text no longer matches the indexed
//!   question is not trusted; the persisted options are used instead and a
//!   warning is logged.

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::config::OptionsPolicy;
use crate::embedding::{embed_query, EmbeddingProvider};
use crate::error::Result;
use crate::models::{QuestionRecord, Recommendation};
use crate::questions::{QuestionSchema, QuestionSource};
use crate::store::{IndexPaths, StoreHandle};

/// Default number of questions returned per query.
pub const DEFAULT_TOP_K: usize = 5;

pub struct RecommendationService {
    provider: Arc<dyn EmbeddingProvider>,
    store: StoreHandle<QuestionRecord>,
    policy: OptionsPolicy,
    source: Option<(Arc<dyn QuestionSource>, QuestionSchema)>,
}

impl RecommendationService {
    /// A service that serves persisted options.
    pub fn new(paths: IndexPaths, provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            store: StoreHandle::new(paths),
            policy: OptionsPolicy::Persisted,
            source: None,
        }
    }

    /// A service that re-reads options from `source` on every call.
    pub fn with_reload(
        paths: IndexPaths,
        provider: Arc<dyn EmbeddingProvider>,
        source: Arc<dyn QuestionSource>,
        schema: QuestionSchema,
    ) -> Self {
        Self {
            provider,
            store: StoreHandle::new(paths),
            policy: OptionsPolicy::Reload,
            source: Some((source, schema)),
        }
    }

    pub fn policy(&self) -> OptionsPolicy {
        self.policy
    }

    /// Up to `k` questions for `query`, nearest first.
    pub fn recommend(&self, query: &str, k: usize) -> Result<Vec<Recommendation>> {
        self.try_recommend(query, k).inspect_err(|e| {
            error!(error = %e, kind = ?e.kind(), "question recommendation failed");
        })
    }

    /// Forget the cached index; call after the question index is rebuilt.
    pub fn reload(&self) {
        self.store.reload();
    }

    fn try_recommend(&self, query: &str, k: usize) -> Result<Vec<Recommendation>> {
        let Some(store) = self.store.get()? else {
            warn!(
                dir = %self.store.paths().dir().display(),
                "question index not built yet, returning no recommendations"
            );
            return Ok(Vec::new());
        };

        let query_vec = embed_query(self.provider.as_ref(), query)?;
        let hits = store.search(&query_vec, k)?;

        let fresh = match (&self.policy, &self.source) {
            (OptionsPolicy::Reload, Some((source, schema))) => {
                let records = source.load()?.records(schema)?;
                debug!(source = %source.name(), rows = records.len(), "reloaded question table");
                Some(records)
            }
            _ => None,
        };

        let recommendations: Vec<Recommendation> = hits
            .into_iter()
            .map(|hit| {
                let persisted = hit.payload;
                let options = match fresh.as_ref() {
                    Some(records) => current_options(records, hit.position, persisted),
                    None => persisted.options.clone(),
                };
                Recommendation {
                    question: persisted.question.clone(),
                    options,
                    subject: persisted.subject.clone(),
                    distance: hit.distance,
                }
            })
            .collect();

        debug!(k, returned = recommendations.len(), "recommended questions");
        Ok(recommendations)
    }
}

/// Options for the row at `position` of a freshly read table, if that row is
/// still the question that was indexed there.
fn current_options(
    records: &[QuestionRecord],
    position: usize,
    persisted: &QuestionRecord,
) -> Vec<String> {
    match records.get(position) {
        Some(row) if row.question == persisted.question => row.options.clone(),
        Some(row) => {
            warn!(
                position,
                indexed = %persisted.question,
                current = %row.question,
                "question table changed since indexing, using indexed options"
            );
            persisted.options.clone()
        }
        None => {
            warn!(
                position,
                rows = records.len(),
                "question table has fewer rows than the index, using indexed options"
            );
            persisted.options.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashProvider;
    use crate::error::Error;
    use crate::indexer::QuestionIndexer;
    use crate::questions::{CsvQuestionSource, QuestionTable};
    use tempfile::TempDir;

    const BANK: &str = "\
Subject,Question,OptionA,OptionB
Biology,What is the powerhouse of the cell?,Nucleus,Mitochondria
Physics,What is the unit of force?,Newton,Joule
";

    struct Fixture {
        _tmp: TempDir,
        paths: IndexPaths,
        csv: std::path::PathBuf,
        provider: Arc<dyn EmbeddingProvider>,
    }

    fn fixture() -> Fixture {
        let tmp = TempDir::new().unwrap();
        let paths = IndexPaths::new(tmp.path().join("faiss_qa"), "qa_index.bin", "questions.json");
        let csv = tmp.path().join("questions.csv");
        std::fs::write(&csv, BANK).unwrap();
        let provider: Arc<dyn EmbeddingProvider> = Arc::new(HashProvider::new(256));

        let table = QuestionTable::from_csv_path(&csv).unwrap();
        QuestionIndexer::new(QuestionSchema::default(), Arc::clone(&provider), paths.clone())
            .index_questions(&table)
            .unwrap();
        Fixture {
            _tmp: tmp,
            paths,
            csv,
            provider,
        }
    }

    fn reload_service(f: &Fixture) -> RecommendationService {
        RecommendationService::with_reload(
            f.paths.clone(),
            Arc::clone(&f.provider),
            Arc::new(CsvQuestionSource::new(&f.csv)),
            QuestionSchema::default(),
        )
    }

    #[test]
    fn test_not_indexed_returns_empty() {
        let tmp = TempDir::new().unwrap();
        let service = RecommendationService::new(
            IndexPaths::new(tmp.path(), "qa_index.bin", "questions.json"),
            Arc::new(HashProvider::new(16)),
        );
        assert!(service.recommend("anything", DEFAULT_TOP_K).unwrap().is_empty());
    }

    #[test]
    fn test_persisted_options() {
        let f = fixture();
        let service = RecommendationService::new(f.paths.clone(), Arc::clone(&f.provider));
        let recs = service.recommend("unit of force", DEFAULT_TOP_K).unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].question, "What is the unit of force?");
        assert_eq!(recs[0].options, vec!["Newton", "Joule"]);
        assert_eq!(recs[0].subject.as_deref(), Some("Physics"));
        assert!(recs[0].distance <= recs[1].distance);
    }

    #[test]
    fn test_reload_picks_up_option_edits() {
        let f = fixture();
        std::fs::write(
            &f.csv,
            BANK.replace("Newton,Joule", "Newton,Pascal"),
        )
        .unwrap();

        let persisted = RecommendationService::new(f.paths.clone(), Arc::clone(&f.provider));
        let recs = persisted.recommend("unit of force", 1).unwrap();
        assert_eq!(recs[0].options, vec!["Newton", "Joule"]);

        let recs = reload_service(&f).recommend("unit of force", 1).unwrap();
        assert_eq!(recs[0].options, vec!["Newton", "Pascal"]);
    }

    #[test]
    fn test_reload_rejects_reordered_table() {
        let f = fixture();
        std::fs::write(
            &f.csv,
            "Subject,Question,OptionA,OptionB\n\
             Physics,What is the unit of force?,Newton,Joule\n\
             Biology,What is the powerhouse of the cell?,Nucleus,Mitochondria\n",
        )
        .unwrap();

        let recs = reload_service(&f).recommend("unit of force", 1).unwrap();
        assert_eq!(recs[0].question, "What is the unit of force?");
        assert_eq!(recs[0].options, vec!["Newton", "Joule"]);
    }

    #[test]
    fn test_reload_table_failure_propagates() {
        let f = fixture();
        std::fs::remove_file(&f.csv).unwrap();
        assert!(matches!(
            reload_service(&f).recommend("unit of force", 1),
            Err(Error::Io { .. })
        ));
    }
}
