//! End-to-end scenarios for the question-answering engine.

use std::fs;
use std::sync::Arc;

use quake_rag::{
    Answer, EventRecord, FlatIndex, MockLanguageModel, Outcome, QuakeRag, RagConfig, RagError,
    RawEvent, REFUSAL, VectorIndex,
};

fn record(id: &str, magnitude: &str, location: &str) -> EventRecord {
    EventRecord::try_from(RawEvent {
        event_id: id.into(),
        time: "2025-01-12T03:14:07.570000".into(),
        latitude: "42.8817".into(),
        longitude: "11.7373".into(),
        depth_km: "8.6".into(),
        magnitude: magnitude.into(),
        mag_type: "ML".into(),
        location: location.into(),
        event_type: "earthquake".into(),
        author: Some("SURVEY-INGV".into()),
        catalog: None,
    })
    .unwrap()
}

fn catalog() -> Vec<EventRecord> {
    vec![
        record("41670001", "2.3", "3 km E Norcia (PG)"),
        record("41670002", "1.1", "Costa Calabra nord-orientale (Cosenza)"),
        record("41671442", "0.9", "4 km SW Radicofani (SI)"),
        record("41670003", "3.4", "Campi Flegrei"),
        record("41670004", "1.7", "5 km NE Amatrice (RI)"),
        record("41670005", "0.6", "Stretto di Messina"),
        record("41670006", "2.0", "2 km W Visso (MC)"),
        record("41670007", "1.5", "Mar Tirreno Meridionale (MARE)"),
        record("41670008", "1.2", "3 km S Montereale (AQ)"),
        record("41670009", "2.8", "Costa Marchigiana Pesarese (Pesaro-Urbino)"),
    ]
}

fn engine(model: Arc<MockLanguageModel>) -> QuakeRag {
    engine_with(RagConfig::default(), model)
}

fn engine_with(config: RagConfig, model: Arc<MockLanguageModel>) -> QuakeRag {
    QuakeRag::builder().config(config).language_model(model).build().unwrap()
}

#[tokio::test]
async fn radicofani_record_is_the_top_hit() {
    let model = Arc::new(MockLanguageModel::replying("Evento 41671442, magnitudo 0.9 ML."));
    let engine = engine(model.clone());
    engine.build(&catalog()).await.unwrap();

    let hits = engine.retrieve("terremoti vicino Radicofani", 8).await.unwrap();
    assert_eq!(hits.len(), 8);
    assert_eq!(hits[0].chunk.record_id, "41671442");
    assert_eq!(hits[0].chunk.metadata["magnitude"], "0.9");
    assert_eq!(hits[0].chunk.metadata["location"], "4 km SW Radicofani (SI)");

    let answer = engine.ask_with_k("terremoti vicino Radicofani", 8).await.unwrap();
    assert_eq!(answer.outcome, Outcome::Grounded);
    assert_eq!(answer.answer, "Evento 41671442, magnitudo 0.9 ML.");
    assert_eq!(answer.cited_record_ids[0], "41671442");
    assert_eq!(answer.retrieved[0].record_id, "41671442");
    assert_eq!(answer.retrieved.len(), 8);

    let calls = model.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].settings.temperature, 0.0);
    assert_eq!(calls[0].prompt.question, "terremoti vicino Radicofani");
    assert!(calls[0].prompt.system.contains("Location: 4 km SW Radicofani (SI)"));
}

#[tokio::test]
async fn empty_corpus_refuses_without_calling_the_model() {
    let model = Arc::new(MockLanguageModel::replying("should never be used"));
    let engine = engine(model.clone());
    engine.build(&[]).await.unwrap();

    let answer = engine.ask("Qual è stato il terremoto più forte?").await.unwrap();
    assert_eq!(
        answer,
        Answer {
            answer: REFUSAL.to_string(),
            cited_record_ids: Vec::new(),
            retrieved: Vec::new(),
            outcome: Outcome::Refused,
        }
    );
    assert_eq!(model.call_count(), 0);
}

#[tokio::test]
async fn blank_question_refuses() {
    let model = Arc::new(MockLanguageModel::default());
    let engine = engine(model.clone());
    engine.build(&catalog()).await.unwrap();

    let answer = engine.ask(" \t\n ").await.unwrap();
    assert!(answer.is_refusal());
    assert_eq!(model.call_count(), 0);
}

#[tokio::test]
async fn rebuilding_gives_identical_results() {
    let engine = engine(Arc::new(MockLanguageModel::default()));
    let query = "magnitudo 2.3 Norcia";

    engine.build(&catalog()).await.unwrap();
    let first = engine.retrieve(query, 8).await.unwrap();
    engine.build(&catalog()).await.unwrap();
    let second = engine.retrieve(query, 8).await.unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn relevance_floor_turns_weak_results_into_refusal() {
    let model = Arc::new(MockLanguageModel::default());
    let config = RagConfig::builder().relevance_floor(0.99).build().unwrap();
    let engine = engine_with(config, model.clone());
    engine.build(&catalog()).await.unwrap();

    let answer = engine.ask("terremoti vicino Radicofani").await.unwrap();
    assert!(answer.is_refusal());
    assert!(answer.cited_record_ids.is_empty());
    // The hits are still reported for inspection.
    assert_eq!(answer.retrieved.len(), 8);
    assert_eq!(model.call_count(), 0);
}

#[tokio::test]
async fn model_failure_is_an_error_not_a_refusal() {
    let model = Arc::new(MockLanguageModel::failing("upstream timed out"));
    let engine = engine(model.clone());
    engine.build(&catalog()).await.unwrap();

    let result = engine.ask("terremoti vicino Radicofani").await;
    assert!(matches!(result, Err(RagError::LanguageModel { .. })));
    assert_eq!(model.call_count(), 1);
}

#[tokio::test]
async fn small_budget_keeps_the_best_chunks_only() {
    let model = Arc::new(MockLanguageModel::default());
    let config = RagConfig::builder().context_budget_chars(700).build().unwrap();
    let engine = engine_with(config, model.clone());
    engine.build(&catalog()).await.unwrap();

    let answer = engine.ask("terremoti vicino Radicofani").await.unwrap();
    assert_eq!(answer.outcome, Outcome::Grounded);
    assert!(answer.cited_record_ids.len() < answer.retrieved.len());
    assert_eq!(answer.cited_record_ids[0], "41671442");

    let prompt = &model.calls()[0].prompt;
    assert!(prompt.truncated);
    assert_eq!(prompt.cited_record_ids, answer.cited_record_ids);
}

#[tokio::test]
async fn duplicate_ids_keep_the_first_record() {
    let engine = engine(Arc::new(MockLanguageModel::default()));
    let mut records = catalog();
    records.push(record("41671442", "5.0", "Altrove"));

    let report = engine.build(&records).await.unwrap();
    assert_eq!(report.records, 10);
    assert_eq!(report.duplicates, 1);

    let hits = engine.retrieve("Radicofani", 10).await.unwrap();
    let radicofani: Vec<_> = hits.iter().filter(|h| h.chunk.record_id == "41671442").collect();
    assert_eq!(radicofani.len(), 1);
    assert_eq!(radicofani[0].chunk.metadata["magnitude"], "0.9");
}

#[tokio::test]
async fn added_records_become_retrievable() {
    let engine = engine(Arc::new(MockLanguageModel::default()));
    engine.build(&catalog()).await.unwrap();

    let report = engine
        .add_records(&[record("41680000", "1.9", "Isola di Stromboli"), record("41671442", "9.9", "x")])
        .await
        .unwrap();
    assert_eq!(report.records, 1);
    assert_eq!(report.duplicates, 1);
    assert_eq!(engine.index().len().await, 11);

    let hits = engine.retrieve("Stromboli", 1).await.unwrap();
    assert_eq!(hits[0].chunk.record_id, "41680000");
}

#[tokio::test]
async fn long_documents_are_split_into_overlapping_chunks() {
    let config = RagConfig::builder().chunk_size(120).chunk_overlap(20).build().unwrap();
    let engine = engine_with(config, Arc::new(MockLanguageModel::default()));

    let report = engine.build(&[record("41671442", "0.9", "4 km SW Radicofani (SI)")]).await.unwrap();
    assert!(report.chunks > 1);

    let hits = engine.retrieve("Radicofani", 10).await.unwrap();
    assert_eq!(hits.len(), report.chunks);
    assert!(hits.iter().all(|h| h.chunk.record_id == "41671442"));
}

#[tokio::test]
async fn custom_index_is_used() {
    let index = Arc::new(FlatIndex::default());
    let engine = QuakeRag::builder()
        .language_model(Arc::new(MockLanguageModel::default()))
        .index(index.clone())
        .build()
        .unwrap();
    engine.build(&catalog()).await.unwrap();
    assert_eq!(index.len().await, 10);
}

#[tokio::test]
async fn ingests_a_catalog_directory() {
    let temp = tempfile::tempdir().unwrap();
    fs::write(
        temp.path().join("ingv.txt"),
        "#EventID|Time|Latitude|Longitude|Depth/Km|Author|Catalog|Contributor|ContributorID|MagType|Magnitude|MagAuthor|EventLocationName|EventType\n\
         41671442|2025-01-12T03:14:07.570000|42.8817|11.7373|8.6|SURVEY-INGV||||ML|0.9|--|4 km SW Radicofani (SI)|earthquake\n\
         41670001|2025-01-12T05:00:00.000000|42.79|13.09|9.1|SURVEY-INGV||||ML|2.3|--|3 km E Norcia (PG)|earthquake\n\
         broken|row\n",
    )
    .unwrap();

    let model = Arc::new(MockLanguageModel::replying("ok"));
    let engine = engine(model);
    let report = engine.ingest_dir(temp.path()).await.unwrap();
    assert_eq!(report.records.len(), 2);
    assert_eq!(report.rejected_count(), 1);

    let answer = engine.ask("terremoti vicino Radicofani").await.unwrap();
    assert_eq!(answer.retrieved[0].record_id, "41671442");
}
