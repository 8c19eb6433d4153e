//! Integration tests for the classification engine.
//!
//! These exercise ingestion, the embedding batch, and matching end to end
//! with the offline hashing embedder, so no model server is required.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use tariff_match::api;
use tariff_match::classify::{classify, QueryInput, RequestContext};
use tariff_match::config::{Config, EmbeddingConfig};
use tariff_match::error::is_fatal;
use tariff_match::llm::hashing::HashingEmbedder;
use tariff_match::llm::EmbedderHandle;
use tariff_match::models::{BatchRequest, ClassifyRequest, SuggestionStatus};
use tariff_match::pipeline::{run_batch, BatchOptions};
use tariff_match::search::hybrid::{MatchOptions, Matcher, SearchStrategy};
use tariff_match::state::AppState;

const DIM: usize = 256;

const PERFUMERY_CORPUS: &str = "ITC(HS) Code Item Description Export Policy\n\
    Chapter 33 Essential oils and resinoids; perfumery, cosmetic or toilet preparations\n\
    Attar 33019015 Attar of flowers, natural, alcoholic 18%\n\
    Perfume 33030010 Perfumes and toilet waters, containing spirit 28%\n\
    Shaving 33071010 Pre-shave, shaving or after-shave preparations 18%\n\
    Chapter 34 Soap, organic surface-active agents\n\
    Soap 34011110 Toilet soap, medicated 18%\n\
    Chapter 84 Machinery and mechanical appliances\n\
    Laptop 84713010 Personal computer, portable, weighing not more than ten kg 18%\n\
    Pepper 09041100 Pepper of the genus Piper, neither crushed nor ground 5%\n";

fn test_state(dir: &tempfile::TempDir) -> AppState {
    let config = Config {
        data_dir: dir.path().to_path_buf(),
        embedding: EmbeddingConfig {
            provider: "hashing".to_string(),
            dimension: DIM,
            ..EmbeddingConfig::default()
        },
        ..Config::default()
    };
    let embedder = Arc::new(HashingEmbedder::new(DIM).unwrap());
    AppState::with_embedder(config, EmbedderHandle::preloaded(embedder)).unwrap()
}

/// `count` records with letter-only labels and unique 8 digit codes.
fn generated_corpus(count: usize) -> String {
    (0..count)
        .map(|i| {
            let label = format!(
                "{}{}",
                (b'a' + (i / 26) as u8) as char,
                (b'a' + (i % 26) as u8) as char
            );
            format!("Blend {label} 3301{i:04} Essential oil blend, natural, variety {label}\n")
        })
        .collect()
}

fn ctx() -> RequestContext {
    RequestContext {
        source_entity_id: Some("product-1".to_string()),
        created_by: "integration".to_string(),
    }
}

#[tokio::test]
async fn test_partial_ingestion_then_resume_processes_everything_once() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);
    let embedder = HashingEmbedder::new(DIM).unwrap();

    let summary = state
        .reload_catalogue(&generated_corpus(30), "generated")
        .await
        .unwrap();
    assert_eq!(summary.inserted, 30);

    let partial = BatchOptions {
        page_size: 10,
        limit: Some(12),
    };
    let first = run_batch(&state.catalogue, &state.embeddings, &embedder, &partial)
        .await
        .unwrap();
    assert_eq!(first.processed, 12);
    assert_eq!(first.remaining, 18);

    let resume = BatchOptions {
        page_size: 10,
        limit: None,
    };
    let second = run_batch(&state.catalogue, &state.embeddings, &embedder, &resume)
        .await
        .unwrap();
    assert_eq!(second.processed, 18);
    assert_eq!(second.remaining, 0);

    assert_eq!(state.embeddings.entry_count(), 30);
    assert_eq!(state.embeddings.status_counts().processed, 30);

    let third = run_batch(&state.catalogue, &state.embeddings, &embedder, &resume)
        .await
        .unwrap();
    assert_eq!(third.processed, 0);
    assert_eq!(third.errors, 0);
}

#[tokio::test]
async fn test_reload_skips_duplicate_codes_and_wipes_embeddings() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);
    let embedder = HashingEmbedder::new(DIM).unwrap();

    state
        .reload_catalogue(PERFUMERY_CORPUS, "itc-2024")
        .await
        .unwrap();
    run_batch(
        &state.catalogue,
        &state.embeddings,
        &embedder,
        &BatchOptions::default(),
    )
    .await
    .unwrap();
    assert_eq!(state.embeddings.status_counts().processed, 6);

    let duplicated = format!("{PERFUMERY_CORPUS}Attar 33019015 Attar of roses, natural 18%\n");
    let summary = state
        .reload_catalogue(&duplicated, "itc-2025")
        .await
        .unwrap();
    assert_eq!(summary.inserted, 6);
    assert_eq!(summary.skipped_duplicates, 1);

    // Chapter headings do not leak into the record before them.
    let shaving = &state.catalogue.find_by_code("33071010")[0];
    assert_eq!(shaving.tax_rate, Some(18.0));
    assert!(!shaving.description.contains("Chapter"));
    let soap = &state.catalogue.find_by_code("34011110")[0];
    assert_eq!(soap.description, "Toilet soap, medicated");
    assert_eq!(state.catalogue.find_by_code("33019015").len(), 1);
    assert_eq!(state.embeddings.entry_count(), 0);
    assert_eq!(
        state.catalogue.find_by_code("33019015")[0].sources,
        vec!["itc-2025".to_string()]
    );
}

#[tokio::test]
async fn test_merge_keeps_embeddings_and_tags_existing_records() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);
    let embedder = HashingEmbedder::new(DIM).unwrap();

    state
        .reload_catalogue(PERFUMERY_CORPUS, "itc-2024")
        .await
        .unwrap();
    run_batch(
        &state.catalogue,
        &state.embeddings,
        &embedder,
        &BatchOptions::default(),
    )
    .await
    .unwrap();

    let addendum = "Attar 33019015 Attar of flowers, natural, alcoholic 18%\n\
        Rose 33019031 Rose oil, natural 18%\n";
    let summary = state.merge_catalogue(addendum, "itc-2025").await.unwrap();
    assert_eq!(summary.inserted, 1);
    assert_eq!(summary.retagged, 1);
    assert_eq!(state.catalogue.len(), 7);
    assert_eq!(
        state.catalogue.find_by_code("33019015")[0].sources,
        vec!["itc-2024".to_string(), "itc-2025".to_string()]
    );

    // Only the new record needs a vector.
    let report = run_batch(
        &state.catalogue,
        &state.embeddings,
        &embedder,
        &BatchOptions::default(),
    )
    .await
    .unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(state.embeddings.entry_count(), 7);
}

#[tokio::test]
async fn test_attar_query_surfaces_attar_record() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);
    let embedder = HashingEmbedder::new(DIM).unwrap();

    state
        .reload_catalogue(PERFUMERY_CORPUS, "itc-2024")
        .await
        .unwrap();
    run_batch(
        &state.catalogue,
        &state.embeddings,
        &embedder,
        &BatchOptions::default(),
    )
    .await
    .unwrap();

    let result = classify(
        &state.matcher,
        &embedder,
        &state.audit,
        &QueryInput::FreeText("attar perfume oil".to_string()),
        &ctx(),
        &MatchOptions::default(),
        2_000,
    )
    .await
    .unwrap();

    assert_eq!(result.strategy, SearchStrategy::Hybrid);
    assert!(result.candidates.len() <= 5);
    let attar = result
        .candidates
        .iter()
        .find(|(c, _)| c.record.primary_code == "33019015")
        .expect("attar record in top 5");
    assert!(attar.0.similarity >= 0.40);

    // Ranked by similarity, ties by code
    for pair in result.candidates.windows(2) {
        let (a, b) = (&pair[0].0, &pair[1].0);
        assert!(
            a.similarity > b.similarity
                || (a.similarity == b.similarity && a.record.primary_code <= b.record.primary_code)
        );
    }
    assert!(result.candidates.iter().all(|(c, _)| c.similarity >= 0.15));

    // Exactly one audit entry, for the top candidate
    assert_eq!(state.audit.len(), 1);
    let logged = &state.audit.list(1)[0];
    assert_eq!(
        logged.suggested_primary_code,
        result.candidates[0].0.record.primary_code
    );
}

#[tokio::test]
async fn test_vector_only_fallback_returns_matches() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);
    let embedder = HashingEmbedder::new(DIM).unwrap();

    state
        .reload_catalogue(PERFUMERY_CORPUS, "itc-2024")
        .await
        .unwrap();
    run_batch(
        &state.catalogue,
        &state.embeddings,
        &embedder,
        &BatchOptions::default(),
    )
    .await
    .unwrap();

    // No lexical source: the probe must pick vector-only.
    let matcher = Matcher::new(
        Arc::clone(&state.catalogue),
        Arc::clone(&state.embeddings),
        None,
    );
    assert_eq!(matcher.probe(), SearchStrategy::VectorOnly);

    let query = embedder.embed_text("attar perfume oil");
    let outcome = matcher
        .find_matches("attar perfume oil", &query, &MatchOptions::default())
        .unwrap();
    assert_eq!(outcome.strategy, SearchStrategy::VectorOnly);
    assert!(!outcome.candidates.is_empty());
    assert!(outcome
        .candidates
        .iter()
        .any(|c| c.record.primary_code == "33019015"));
}

#[tokio::test]
async fn test_model_dimension_change_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);

    state
        .reload_catalogue(PERFUMERY_CORPUS, "itc-2024")
        .await
        .unwrap();
    run_batch(
        &state.catalogue,
        &state.embeddings,
        &HashingEmbedder::new(DIM).unwrap(),
        &BatchOptions::default(),
    )
    .await
    .unwrap();

    let smaller = HashingEmbedder::new(64).unwrap();
    let err = run_batch(
        &state.catalogue,
        &state.embeddings,
        &smaller,
        &BatchOptions::default(),
    )
    .await
    .unwrap_err();
    assert!(is_fatal(&err));

    let err = state
        .matcher
        .find_matches("attar", &smaller.embed_text("attar"), &MatchOptions::default())
        .unwrap_err();
    assert!(is_fatal(&err));
}

#[tokio::test]
async fn test_http_handlers_batch_then_classify() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);
    state
        .reload_catalogue(PERFUMERY_CORPUS, "itc-2024")
        .await
        .unwrap();

    let Json(report) = api::embeddings::trigger_batch(
        State(state.clone()),
        Some(Json(BatchRequest { limit: None })),
    )
    .await
    .unwrap();
    assert_eq!(report.processed, 6);
    assert_eq!(report.remaining, 0);

    // A bare POST carries no body.
    let Json(again) = api::embeddings::trigger_batch(State(state.clone()), None)
        .await
        .unwrap();
    assert_eq!(again.processed, 0);

    let req: ClassifyRequest = serde_json::from_value(serde_json::json!({
        "source_entity_id": "sku-991",
        "attributes": {
            "name": "Rose attar",
            "category": "Fragrances",
            "description": "Natural attar of rose flowers",
            "tags": ["natural"],
            "attributes": {"volume": "10 ml"}
        }
    }))
    .unwrap();
    let Json(response) = api::classify::classify_product(State(state.clone()), Json(req))
        .await
        .unwrap();
    assert!(response.count > 0);
    assert_eq!(response.count, response.candidates.len());
    assert!(response.suggestion_id.is_some());
    assert!(response.message.is_none());

    // A query that clears no threshold is an empty result with guidance.
    let req: ClassifyRequest = serde_json::from_value(serde_json::json!({
        "text": "zzqx",
        "threshold": 0.99
    }))
    .unwrap();
    let Json(empty) = api::classify::classify_product(State(state.clone()), Json(req))
        .await
        .unwrap();
    assert_eq!(empty.count, 0);
    assert!(empty.candidates.is_empty());
    assert!(empty.message.is_some());
    assert!(empty.suggestion_id.is_none());

    let Json(chapters) = api::chapters::list_chapters(State(state.clone())).await;
    let keys: Vec<(&str, usize)> = chapters
        .iter()
        .map(|c| (c.chapter_key.as_str(), c.count))
        .collect();
    assert_eq!(keys, vec![("09", 1), ("33", 3), ("34", 1), ("84", 1)]);
}

#[tokio::test]
async fn test_http_handlers_batch_conflicts_while_locked() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);
    state
        .reload_catalogue(PERFUMERY_CORPUS, "itc-2024")
        .await
        .unwrap();

    {
        let _held = state.batch_lock.lock().await;
        let err = api::embeddings::trigger_batch(State(state.clone()), None)
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::CONFLICT);
        assert_eq!(state.embeddings.entry_count(), 0);
    }

    let Json(report) = api::embeddings::trigger_batch(State(state.clone()), None)
        .await
        .unwrap();
    assert_eq!(report.processed, 6);
}

#[tokio::test]
async fn test_http_handlers_suggestion_status_update() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);
    state
        .reload_catalogue(PERFUMERY_CORPUS, "itc-2024")
        .await
        .unwrap();
    api::embeddings::trigger_batch(State(state.clone()), None)
        .await
        .unwrap();

    let req: ClassifyRequest =
        serde_json::from_value(serde_json::json!({ "text": "attar of flowers" })).unwrap();
    let Json(response) = api::classify::classify_product(State(state.clone()), Json(req))
        .await
        .unwrap();
    let id = response.suggestion_id.unwrap();

    let update = |status: &str| -> api::suggestions::StatusUpdate {
        serde_json::from_value(serde_json::json!({ "status": status })).unwrap()
    };

    let err = api::suggestions::update_suggestion(
        State(state.clone()),
        Path(id),
        Json(update("suggested")),
    )
    .await
    .unwrap_err();
    assert_eq!(err.0, StatusCode::BAD_REQUEST);

    let err = api::suggestions::update_suggestion(
        State(state.clone()),
        Path(uuid::Uuid::new_v4()),
        Json(update("accepted")),
    )
    .await
    .unwrap_err();
    assert_eq!(err.0, StatusCode::NOT_FOUND);

    let Json(entry) = api::suggestions::update_suggestion(
        State(state.clone()),
        Path(id),
        Json(update("overridden")),
    )
    .await
    .unwrap();
    assert_eq!(entry.status, SuggestionStatus::Overridden);
    assert_eq!(state.audit.list(1)[0].status, SuggestionStatus::Overridden);
}

#[tokio::test]
async fn test_failed_reload_leaves_no_stale_vectors() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);
    let embedder = HashingEmbedder::new(DIM).unwrap();

    state
        .reload_catalogue(PERFUMERY_CORPUS, "itc-2024")
        .await
        .unwrap();
    run_batch(
        &state.catalogue,
        &state.embeddings,
        &embedder,
        &BatchOptions::default(),
    )
    .await
    .unwrap();

    // A non-empty directory at the catalogue path makes its write fail.
    let path = state.config.catalogue_path();
    std::fs::remove_file(&path).unwrap();
    std::fs::create_dir(&path).unwrap();
    std::fs::write(path.join("blocker"), "x").unwrap();

    assert!(state
        .reload_catalogue(&generated_corpus(3), "generated")
        .await
        .is_err());
    assert_eq!(state.catalogue.len(), 6);
    assert_eq!(state.embeddings.entry_count(), 0);
    assert_eq!(state.embeddings.stored_dimension(), None);
}
