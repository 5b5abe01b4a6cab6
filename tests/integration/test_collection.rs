//! Text-level behaviour of a collection backed by the deterministic mock
//! embedder.

use std::sync::Arc;

use embedstore::{
    CategorySpec, Database, Embedder, FastEmbedder, MockEmbedder, ScoringSite, Settings,
    VectorCollection, VectorDimension, VectorError, VectorId,
};

fn collection_on(db: Database, embedder: MockEmbedder) -> VectorCollection {
    let spec = CategorySpec::new("texts", embedder.dimensions());
    VectorCollection::new(db, Arc::new(embedder), spec).unwrap()
}

fn collection() -> VectorCollection {
    collection_on(Database::open_in_memory().unwrap(), MockEmbedder::new())
}

#[test]
fn test_store_same_text_twice_returns_same_id() {
    let collection = collection();

    let first = collection.store("the quick brown fox").unwrap();
    let second = collection.store("the quick brown fox").unwrap();

    assert_eq!(first, second);
    assert_eq!(collection.count().unwrap(), 1);
}

#[test]
fn test_store_distinct_texts() {
    let collection = collection();

    let a = collection.store("parse json from a string").unwrap();
    let b = collection.store("render an html template").unwrap();

    assert_ne!(a, b);
    assert_eq!(collection.count().unwrap(), 2);
}

#[test]
fn test_store_many_skips_duplicate_check() {
    let collection = collection();

    let ids = collection.store_many(&["same text", "same text"]).unwrap();
    assert_eq!(ids.len(), 2);
    assert_ne!(ids[0], ids[1]);
    assert_eq!(collection.count().unwrap(), 2);
}

#[test]
fn test_search_finds_exact_text_first() {
    let collection = collection();
    let ids = collection
        .store_many(&[
            "connect to the database",
            "retry failed requests with backoff",
            "compute the factorial of a number",
            "parse command line arguments",
        ])
        .unwrap();

    let matches = collection.search("compute the factorial of a number", 3).unwrap();

    assert_eq!(matches.len(), 3);
    assert_eq!(matches[0].id, ids[2]);
    assert!((matches[0].similarity - 1.0).abs() < 1e-5);
}

#[test]
fn test_search_default_uses_configured_limit() {
    let collection = collection().with_default_limit(2);
    collection.store_many(&["a1", "b2", "c3", "d4"]).unwrap();

    assert_eq!(collection.search_default("a1").unwrap().len(), 2);
}

#[test]
fn test_search_by_id() {
    let collection = collection();
    let ids = collection
        .store_many(&["alpha beta", "gamma delta", "epsilon zeta"])
        .unwrap();

    let matches = collection.search_by_id(ids[1], 2).unwrap();
    assert_eq!(matches[0].id, ids[1]);
    assert!((matches[0].similarity - 1.0).abs() < 1e-5);

    let missing = VectorId::new(12_345).unwrap();
    let err = collection.search_by_id(missing, 2).unwrap_err();
    assert!(matches!(err, VectorError::NotFound(12_345)));
}

#[test]
fn test_id_of_text() {
    let collection = collection();
    let id = collection.store("remember this sentence").unwrap();

    assert_eq!(collection.id_of_text("remember this sentence").unwrap(), Some(id));
    assert_eq!(collection.id_of_text("something never stored").unwrap(), None);
}

#[test]
fn test_id_of_text_on_empty_category() {
    let collection = collection();
    assert_eq!(collection.id_of_text("anything").unwrap(), None);
}

#[test]
fn test_similarity() {
    let collection = collection();

    let same = collection.similarity("red apple pie", "red apple pie").unwrap();
    assert!((same - 1.0).abs() < 1e-5);

    // Word order does not matter for mean-pooled text
    let reordered = collection.similarity("red apple pie", "pie apple red").unwrap();
    assert!((reordered - 1.0).abs() < 1e-5);

    let overlapping = collection.similarity("red apple pie", "red apple tart").unwrap();
    let disjoint = collection.similarity("red apple pie", "blue steel bridge").unwrap();
    assert!(overlapping > 0.4, "overlapping: {overlapping}");
    assert!(disjoint < overlapping);
    assert!(disjoint.abs() < 0.3, "disjoint: {disjoint}");
}

#[test]
fn test_similarity_of_empty_text_fails() {
    let collection = collection();
    let err = collection.similarity("", "not empty").unwrap_err();
    assert!(matches!(err, VectorError::ZeroMagnitude));
}

#[test]
fn test_similarity_to_id() {
    let collection = collection();
    let id = collection.store("stored sentence here").unwrap();

    let same = collection.similarity_to_id("stored sentence here", id).unwrap();
    assert!((same - 1.0).abs() < 1e-5);

    let missing = VectorId::new(77).unwrap();
    assert!(matches!(
        collection.similarity_to_id("stored sentence here", missing),
        Err(VectorError::NotFound(77))
    ));
}

#[test]
fn test_update_replaces_text() {
    let collection = collection();
    let id = collection.store("original wording").unwrap();
    collection.store("unrelated filler").unwrap();

    collection.update(id, "completely new wording").unwrap();

    assert_eq!(collection.id_of_text("completely new wording").unwrap(), Some(id));
    assert_eq!(collection.id_of_text("original wording").unwrap(), None);
    assert_eq!(collection.count().unwrap(), 2);
}

#[test]
fn test_delete_by_id() {
    let collection = collection();
    let id = collection.store("short lived").unwrap();

    assert!(collection.delete_by_id(id).unwrap());
    assert!(!collection.delete_by_id(id).unwrap());
    assert_eq!(collection.count().unwrap(), 0);
    assert!(collection.get_by_ids(&[id]).unwrap().is_empty());
}

#[test]
fn test_model_upgrade_hides_outdated_vectors() {
    let db = Database::open_in_memory().unwrap();
    let old_model = collection_on(db.clone(), MockEmbedder::new());
    let old_id = old_model.store("written by the old model").unwrap();

    let new_model = collection_on(db, MockEmbedder::new().with_model_tag("mock-model-v2"));

    // The record is still there
    assert_eq!(new_model.count().unwrap(), 1);
    // but reads through the new model skip it
    assert!(new_model.get_by_ids(&[old_id]).unwrap().is_empty());
    assert!(new_model.search("written by the old model", 5).unwrap().is_empty());
    assert_eq!(new_model.id_of_text("written by the old model").unwrap(), None);

    // Storing it again under the new model creates a fresh record
    let new_id = new_model.store("written by the old model").unwrap();
    assert_ne!(new_id, old_id);
    assert_eq!(new_model.count().unwrap(), 2);
}

#[test]
fn test_lookups_by_id_ignore_outdated_records() {
    let db = Database::open_in_memory().unwrap();
    let old_model = collection_on(db.clone(), MockEmbedder::new());
    let old_id = old_model.store("embedded by the old model").unwrap();

    let new_model = collection_on(db, MockEmbedder::new().with_model_tag("mock-model-v2"));

    assert!(matches!(
        new_model.search_by_id(old_id, 3),
        Err(VectorError::NotFound(_))
    ));
    assert!(matches!(
        new_model.similarity_to_id("embedded by the old model", old_id),
        Err(VectorError::NotFound(_))
    ));

    // The old model still sees its own record
    assert_eq!(old_model.search_by_id(old_id, 3).unwrap()[0].id, old_id);
    let same = old_model
        .similarity_to_id("embedded by the old model", old_id)
        .unwrap();
    assert!((same - 1.0).abs() < 1e-5);
}

#[test]
fn test_long_words_are_chunked() {
    let embedder = MockEmbedder::with_dimension(VectorDimension::new(64).unwrap())
        .with_max_input_length(4);
    let collection = collection_on(Database::open_in_memory().unwrap(), embedder);

    let id = collection.store("supercalifragilistic word").unwrap();
    let matches = collection.search("supercalifragilistic word", 1).unwrap();
    assert_eq!(matches[0].id, id);
}

#[test]
fn test_client_scoring_gives_same_results() {
    let db = Database::open_in_memory().unwrap();
    let in_db = collection_on(db.clone(), MockEmbedder::new());
    let in_client = in_db
        .with_category("texts")
        .unwrap()
        .with_scoring(ScoringSite::Client);

    in_db
        .store_many(&["one fish", "two fish", "red fish", "blue fish"])
        .unwrap();

    let a = in_db.search("fish", 4).unwrap();
    let b = in_client.search("fish", 4).unwrap();
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(&b) {
        assert_eq!(x.id, y.id);
        assert!((x.similarity - y.similarity).abs() < 1e-5);
    }
}

#[test]
fn test_from_settings() {
    let mut settings = Settings::default();
    settings.category.name = "configured".to_string();
    settings.category.table_suffix = "_v3".to_string();
    settings.search.scoring = ScoringSite::Client;
    settings.search.default_limit = 4;

    let db = Database::open_in_memory().unwrap();
    let collection =
        VectorCollection::from_settings(db, Arc::new(MockEmbedder::new()), &settings).unwrap();

    assert_eq!(collection.spec().table_name().unwrap(), "vectors_configured_v3");
    assert_eq!(collection.table().scoring(), ScoringSite::Client);
    assert_eq!(collection.default_limit(), 4);
}

#[test]
fn test_from_settings_rejects_wrong_dimension() {
    let mut settings = Settings::default();
    settings.category.dimension = Some(768);

    let db = Database::open_in_memory().unwrap();
    let err = VectorCollection::from_settings(db, Arc::new(MockEmbedder::new()), &settings)
        .unwrap_err();
    assert_eq!(err.status_code(), "DIMENSION_MISMATCH");
}

#[test]
#[ignore = "Downloads 86MB model - run with --ignored for embedding tests"]
fn test_fastembed_collection_ranks_related_text_first() {
    let embedder = Arc::new(FastEmbedder::new().unwrap());
    let spec = CategorySpec::new("real_model", embedder.dimensions());
    let collection =
        VectorCollection::new(Database::open_in_memory().unwrap(), embedder, spec).unwrap();

    let ids = collection
        .store_many(&[
            "Parse JSON data from a string",
            "Calculate the factorial of a number",
            "Connect to a PostgreSQL database",
        ])
        .unwrap();

    let matches = collection.search("deserialize a JSON document", 3).unwrap();
    assert_eq!(matches[0].id, ids[0]);
}
