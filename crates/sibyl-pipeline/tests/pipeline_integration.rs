//! End-to-end pipeline tests: ingest through a durable step log, then query
//! the same index. Uses the mock provider and the in-memory vector store so
//! the whole flow runs without external services.

use std::io::Write as _;
use std::sync::Arc;

use sibyl_llm::{LlmProvider as _, MockProvider};
use sibyl_store::{InMemoryVectorStore, VectorStore};

use sibyl_pipeline::document::{SplitterConfig, TextSplitter};
use sibyl_pipeline::runner::{RetryPolicy, SqliteStepLog, StepLog, StepRunner};
use sibyl_pipeline::{
    IngestRequest, IngestionPipeline, NO_CONTEXT_ANSWER, QueryPipeline, QueryRequest,
};

fn write_doc(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    path
}

fn splitter() -> TextSplitter {
    TextSplitter::new(SplitterConfig {
        chunk_size: 40,
        chunk_overlap: 8,
    })
    .unwrap()
}

#[tokio::test]
async fn ingest_then_query_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let doc = write_doc(
        &dir,
        "manual.txt",
        "The sibyl daemon listens on port 7700 by default. \
         Configuration lives in sibyl.toml next to the binary. \
         Set SIBYL_LOG to control verbosity.",
    );

    let provider = Arc::new(MockProvider::with_responses(vec![
        "It listens on port 7700.".into(),
    ]));
    let store: Arc<InMemoryVectorStore> = Arc::new(InMemoryVectorStore::new(provider.dimensions));
    let log: Arc<dyn StepLog> = Arc::new(SqliteStepLog::new(":memory:").await.unwrap());

    let ingest = IngestionPipeline::new(splitter(), Arc::clone(&provider), Arc::clone(&store) as _);
    let result = ingest
        .run(
            &StepRunner::new(Arc::clone(&log), "ingest-1"),
            &IngestRequest::new(&doc),
        )
        .await
        .unwrap();
    assert!(result.ingested > 1);
    assert_eq!(store.len(), result.ingested);

    let query = QueryPipeline::new(Arc::clone(&provider), Arc::clone(&store) as _);
    let answer = query
        .run(
            &StepRunner::new(Arc::clone(&log), "query-1"),
            &QueryRequest::new("what port does the daemon use?").with_top_k(3),
        )
        .await
        .unwrap();

    assert_eq!(answer.answer, "It listens on port 7700.");
    assert_eq!(answer.num_contexts, 3);
    // One source entry per retrieved chunk, aligned with the contexts.
    assert_eq!(answer.sources, vec!["manual.txt".to_owned(); 3]);
}

#[tokio::test]
async fn reingestion_under_a_new_run_does_not_duplicate() {
    let dir = tempfile::tempdir().unwrap();
    let doc = write_doc(&dir, "notes.txt", "repeatable content that spans several chunks here");

    let provider = Arc::new(MockProvider::default());
    let store: Arc<InMemoryVectorStore> = Arc::new(InMemoryVectorStore::new(provider.dimensions));
    let log: Arc<dyn StepLog> = Arc::new(SqliteStepLog::new(":memory:").await.unwrap());
    let ingest = IngestionPipeline::new(splitter(), Arc::clone(&provider), Arc::clone(&store) as _);

    let first = ingest
        .run(
            &StepRunner::new(Arc::clone(&log), "run-1"),
            &IngestRequest::new(&doc),
        )
        .await
        .unwrap();
    let second = ingest
        .run(
            &StepRunner::new(Arc::clone(&log), "run-2"),
            &IngestRequest::new(&doc),
        )
        .await
        .unwrap();

    assert_eq!(first.ingested, second.ingested);
    assert_eq!(store.len(), first.ingested);
    // run-2 executed both steps again, so the provider saw two embed batches.
    assert_eq!(provider.embed_calls(), 2);
}

#[tokio::test]
async fn crash_resume_replays_completed_steps_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let doc = write_doc(&dir, "report.txt", "durable content that must only be chunked once");
    let db_path = dir.path().join("steps.db");
    let db = db_path.to_string_lossy().into_owned();

    let store: Arc<InMemoryVectorStore> = Arc::new(InMemoryVectorStore::new(8));

    // First process: embedding is down, the run dies after load-and-chunk.
    {
        let provider = Arc::new(MockProvider::failing_embed());
        let log: Arc<dyn StepLog> = Arc::new(SqliteStepLog::new(&db).await.unwrap());
        let ingest =
            IngestionPipeline::new(splitter(), Arc::clone(&provider), Arc::clone(&store) as _);
        let runner =
            StepRunner::new(log, "ingest-42").with_retry_policy(RetryPolicy::none());
        assert!(ingest.run(&runner, &IngestRequest::new(&doc)).await.is_err());
        assert!(store.is_empty());
    }

    // Second process, same run id, fresh step log handle over the same file:
    // step 1 replays from disk, only step 2 executes.
    let provider = Arc::new(MockProvider::default());
    let log: Arc<dyn StepLog> = Arc::new(SqliteStepLog::new(&db).await.unwrap());
    let ingest = IngestionPipeline::new(splitter(), Arc::clone(&provider), Arc::clone(&store) as _);
    let result = ingest
        .run(
            &StepRunner::new(log, "ingest-42"),
            &IngestRequest::new(&doc),
        )
        .await
        .unwrap();

    assert!(result.ingested > 0);
    assert_eq!(store.len(), result.ingested);
    assert_eq!(provider.embed_calls(), 1);
}

#[tokio::test]
async fn querying_an_empty_index_never_calls_the_chat_model() {
    let provider = Arc::new(MockProvider::default());
    let store: Arc<InMemoryVectorStore> = Arc::new(InMemoryVectorStore::new(provider.dimensions));
    let log: Arc<dyn StepLog> = Arc::new(SqliteStepLog::new(":memory:").await.unwrap());
    let query = QueryPipeline::new(Arc::clone(&provider), store);

    let answer = query
        .run(
            &StepRunner::new(log, "query-empty"),
            &QueryRequest::new("anything at all?"),
        )
        .await
        .unwrap();

    assert_eq!(answer.answer, NO_CONTEXT_ANSWER);
    assert_eq!(provider.chat_calls(), 0);
}

#[tokio::test]
async fn chunk_ids_are_stable_across_ingestions() {
    let dir = tempfile::tempdir().unwrap();
    let doc = write_doc(&dir, "stable.txt", "identical input text for both ingestion rounds");

    let provider = Arc::new(MockProvider::default());
    let store: Arc<InMemoryVectorStore> = Arc::new(InMemoryVectorStore::new(provider.dimensions));
    let log: Arc<dyn StepLog> = Arc::new(SqliteStepLog::new(":memory:").await.unwrap());
    let ingest = IngestionPipeline::new(splitter(), Arc::clone(&provider), Arc::clone(&store) as _);

    ingest
        .run(
            &StepRunner::new(Arc::clone(&log), "round-1"),
            &IngestRequest::new(&doc),
        )
        .await
        .unwrap();
    let after_first = store.len();

    ingest
        .run(
            &StepRunner::new(Arc::clone(&log), "round-2"),
            &IngestRequest::new(&doc),
        )
        .await
        .unwrap();

    // Same source and indices derive the same point IDs, so the second round
    // overwrote rather than appended.
    assert_eq!(store.len(), after_first);
    assert_eq!(store.count_by_source("stable.txt").await.unwrap(), after_first as u64);
}

#[tokio::test]
async fn modified_content_at_the_same_source_overwrites() {
    let dir = tempfile::tempdir().unwrap();
    // Same length, so both revisions chunk into the same indices.
    let original = "release 1 shipped the parser and the lexer to early users";
    let revised = "release 2 shipped the planner and a cache, now for anyone";
    assert_eq!(original.len(), revised.len());
    let doc = write_doc(&dir, "changelog.txt", original);

    let provider = Arc::new(MockProvider::default());
    let store: Arc<InMemoryVectorStore> = Arc::new(InMemoryVectorStore::new(provider.dimensions));
    let log: Arc<dyn StepLog> = Arc::new(SqliteStepLog::new(":memory:").await.unwrap());
    let ingest = IngestionPipeline::new(splitter(), Arc::clone(&provider), Arc::clone(&store) as _);

    ingest
        .run(
            &StepRunner::new(Arc::clone(&log), "round-1"),
            &IngestRequest::new(&doc),
        )
        .await
        .unwrap();
    let after_first = store.len();

    std::fs::write(&doc, revised).unwrap();
    ingest
        .run(
            &StepRunner::new(Arc::clone(&log), "round-2"),
            &IngestRequest::new(&doc),
        )
        .await
        .unwrap();

    // Vectors at unchanged indices were overwritten in place.
    assert_eq!(store.len(), after_first);

    // Every stored chunk now comes from the revised text.
    let revised_vector = provider
        .embed(&[revised.to_owned()])
        .await
        .unwrap()
        .pop()
        .unwrap();
    let hits = store
        .search(revised_vector, store.len() as u64)
        .await
        .unwrap();
    assert_eq!(hits.len(), after_first);
    for hit in &hits {
        assert!(
            revised.contains(&hit.payload.text),
            "stale chunk survived: {:?}",
            hit.payload.text
        );
    }
}
