//! Index builders.
//!
//! [`ContentIndexer`] turns a corpus of documents into the passage index;
//! [`QuestionIndexer`] turns the question bank into the question index.
//! Both embed everything in one pass through the shared provider, build a
//! [`VectorStore`] whose payloads line up with the vectors row for row, and
//! persist it atomically. A rebuild replaces the previous index wholesale.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::chunk::TextChunker;
use crate::embedding::{embed_texts, EmbeddingProvider};
use crate::error::{Error, Result};
use crate::models::{Chunk, Document};
use crate::questions::{QuestionSchema, QuestionTable};
use crate::store::{IndexPaths, VectorStore};

/// Summary of one index build.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexReport {
    /// Input items: documents for the passage index, table rows for the
    /// question index.
    pub inputs: usize,
    /// Inputs that contributed nothing (no text, no question).
    pub skipped: usize,
    /// Vectors written.
    pub indexed: usize,
    pub dims: usize,
    pub model: String,
    pub build_id: Uuid,
}

/// Builds the passage index from documents.
pub struct ContentIndexer {
    chunker: TextChunker,
    provider: Arc<dyn EmbeddingProvider>,
    paths: IndexPaths,
}

impl ContentIndexer {
    pub fn new(chunker: TextChunker, provider: Arc<dyn EmbeddingProvider>, paths: IndexPaths) -> Self {
        Self {
            chunker,
            provider,
            paths,
        }
    }

    pub fn paths(&self) -> &IndexPaths {
        &self.paths
    }

    /// Chunk, embed and persist `documents` as the passage index.
    ///
    /// # Errors
    ///
    /// [`Error::EmptyCorpus`] if there are no documents or none of them
    /// yields a chunk; nothing is written in that case.
    pub fn index_corpus(&self, documents: &[Document]) -> Result<IndexReport> {
        if documents.is_empty() {
            return Err(Error::EmptyCorpus);
        }

        let mut chunks: Vec<Chunk> = Vec::new();
        let mut skipped = 0usize;
        for doc in documents {
            let doc_chunks = self.chunker.chunk_document(doc);
            if doc_chunks.is_empty() {
                warn!(
                    source = doc.source.as_deref().unwrap_or("<inline>"),
                    "document produced no chunks"
                );
                skipped += 1;
            }
            chunks.extend(doc_chunks);
        }
        if chunks.is_empty() {
            return Err(Error::EmptyCorpus);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embed_texts(self.provider.as_ref(), &texts)?;

        let mut store = VectorStore::build(self.provider.dims(), &vectors, chunks)?;
        let manifest = store.persist(&self.paths, self.provider.model_name())?;

        info!(
            documents = documents.len(),
            chunks = manifest.count,
            skipped,
            "indexed corpus"
        );
        Ok(IndexReport {
            inputs: documents.len(),
            skipped,
            indexed: manifest.count,
            dims: manifest.dims,
            model: manifest.model,
            build_id: manifest.build_id,
        })
    }
}

/// Builds the question index from the question bank.
pub struct QuestionIndexer {
    schema: QuestionSchema,
    provider: Arc<dyn EmbeddingProvider>,
    paths: IndexPaths,
}

impl QuestionIndexer {
    pub fn new(schema: QuestionSchema, provider: Arc<dyn EmbeddingProvider>, paths: IndexPaths) -> Self {
        Self {
            schema,
            provider,
            paths,
        }
    }

    pub fn paths(&self) -> &IndexPaths {
        &self.paths
    }

    /// Embed the question text of every valid row and persist the question
    /// index. Options and subject ride along in the payload, unembedded.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingColumn`] if the question column is absent.
    /// - [`Error::EmptyQuestionBank`] if no row has question text.
    pub fn index_questions(&self, table: &QuestionTable) -> Result<IndexReport> {
        let records = table.records(&self.schema)?;
        if records.is_empty() {
            return Err(Error::EmptyQuestionBank);
        }
        let skipped = table.len() - records.len();

        let texts: Vec<String> = records.iter().map(|r| r.question.clone()).collect();
        let vectors = embed_texts(self.provider.as_ref(), &texts)?;

        let mut store = VectorStore::build(self.provider.dims(), &vectors, records)?;
        let manifest = store.persist(&self.paths, self.provider.model_name())?;

        info!(
            rows = table.len(),
            questions = manifest.count,
            skipped,
            "indexed questions"
        );
        Ok(IndexReport {
            inputs: table.len(),
            skipped,
            indexed: manifest.count,
            dims: manifest.dims,
            model: manifest.model,
            build_id: manifest.build_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::Gpt2WordTokenizer;
    use crate::embedding::HashProvider;
    use crate::models::QuestionRecord;
    use tempfile::TempDir;

    fn provider() -> Arc<dyn EmbeddingProvider> {
        Arc::new(HashProvider::new(64))
    }

    fn chunker(size: usize, overlap: usize) -> TextChunker {
        TextChunker::new(Box::new(Gpt2WordTokenizer::new().unwrap()), size, overlap).unwrap()
    }

    #[test]
    fn test_index_corpus_flattens_in_order() {
        let tmp = TempDir::new().unwrap();
        let paths = IndexPaths::new(tmp.path(), "index.bin", "texts.json");
        let indexer = ContentIndexer::new(chunker(4, 1), provider(), paths.clone());

        let docs = vec![
            Document::with_source("a.txt", "one two three four five six"),
            Document::with_source("b.txt", "seven"),
        ];
        let report = indexer.index_corpus(&docs).unwrap();
        assert_eq!(report.inputs, 2);
        assert_eq!(report.skipped, 0);

        let store: VectorStore<Chunk> = VectorStore::load(&paths).unwrap();
        let texts: Vec<&str> = store.payloads().iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["one two three four", "four five six", "seven"]);
        assert_eq!(store.payloads()[1].source.as_deref(), Some("a.txt"));
        assert_eq!(store.payloads()[1].chunk_index, 1);
        assert_eq!(report.indexed, 3);
    }

    #[test]
    fn test_empty_corpus_rejected() {
        let tmp = TempDir::new().unwrap();
        let paths = IndexPaths::new(tmp.path(), "index.bin", "texts.json");
        let indexer = ContentIndexer::new(chunker(8, 2), provider(), paths.clone());

        assert!(matches!(indexer.index_corpus(&[]), Err(Error::EmptyCorpus)));
        assert!(matches!(
            indexer.index_corpus(&[Document::new("   \n\t ")]),
            Err(Error::EmptyCorpus)
        ));
        assert!(!paths.exists());
    }

    #[test]
    fn test_index_questions_keeps_options() {
        let tmp = TempDir::new().unwrap();
        let paths = IndexPaths::new(tmp.path(), "qa_index.bin", "questions.json");
        let indexer = QuestionIndexer::new(QuestionSchema::default(), provider(), paths.clone());

        let table = QuestionTable::from_reader(
            "Question,OptionA,OptionB\nWhat is the powerhouse of the cell?,Nucleus,Mitochondria\n,x,y\n"
                .as_bytes(),
        )
        .unwrap();
        let report = indexer.index_questions(&table).unwrap();
        assert_eq!(report.inputs, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.indexed, 1);

        let store: VectorStore<QuestionRecord> = VectorStore::load(&paths).unwrap();
        assert_eq!(store.payloads()[0].options, vec!["Nucleus", "Mitochondria"]);
    }

    #[test]
    fn test_index_questions_errors() {
        let tmp = TempDir::new().unwrap();
        let paths = IndexPaths::new(tmp.path(), "qa_index.bin", "questions.json");
        let indexer = QuestionIndexer::new(QuestionSchema::default(), provider(), paths);

        let no_column = QuestionTable::from_reader("Prompt\nhello\n".as_bytes()).unwrap();
        assert!(matches!(
            indexer.index_questions(&no_column),
            Err(Error::MissingColumn { .. })
        ));

        let blank = QuestionTable::from_reader("Question,OptionA\n,a\n  ,b\n".as_bytes()).unwrap();
        assert!(matches!(
            indexer.index_questions(&blank),
            Err(Error::EmptyQuestionBank)
        ));
    }
}
