//! Two-phase search behaviour: Hamming coarse filter, then exact rerank.

use embedstore::{CategorySpec, Database, ModelTag, ScoringSite, VectorDimension, VectorTable};

fn table_with(dim: usize, scoring: ScoringSite) -> VectorTable {
    let db = Database::open_in_memory().unwrap();
    let spec = CategorySpec::new("search", VectorDimension::new(dim).unwrap());
    let table = VectorTable::new(db, spec).unwrap().with_scoring(scoring);
    table.initialize(true).unwrap();
    table
}

/// Deterministic, varied vectors without a random number generator.
fn sample_vectors(count: usize, dim: usize) -> Vec<Vec<f32>> {
    (0..count)
        .map(|i| {
            (0..dim)
                .map(|j| ((i * 31 + j * 17 + i * j * 7) % 13) as f32 - 6.0 + 0.25)
                .collect()
        })
        .collect()
}

#[test]
fn test_orthogonal_unit_vectors_rank_in_order() {
    for scoring in [ScoringSite::Database, ScoringSite::Client] {
        let table = table_with(4, scoring);
        let x = table.upsert(&[1.0, 0.0, 0.0, 0.0], None).unwrap();
        let y = table.upsert(&[0.0, 1.0, 0.0, 0.0], None).unwrap();

        let hits = table.search(&[1.0, 0.0, 0.0, 0.0], 2, false).unwrap();

        assert_eq!(hits.len(), 2, "{scoring:?}");
        assert_eq!(hits[0].id, x);
        assert!((hits[0].similarity - 1.0).abs() < 1e-6);
        assert_eq!(hits[1].id, y);
        assert!(hits[1].similarity.abs() < 1e-6);
    }
}

#[test]
fn test_stored_vector_finds_itself() {
    let table = table_with(8, ScoringSite::Database);
    let vectors = sample_vectors(12, 8);
    let ids = table.batch_insert(&vectors).unwrap();

    for (id, vector) in ids.iter().zip(&vectors) {
        let hits = table.search(vector, 3, false).unwrap();
        assert_eq!(hits[0].id, *id);
        assert!((hits[0].similarity - 1.0).abs() < 1e-5);
        assert_eq!(&hits[0].vector, vector);
    }
}

#[test]
fn test_scoring_sites_agree() {
    let vectors = sample_vectors(40, 16);
    let query: Vec<f32> = (0..16).map(|j| (j as f32 * 0.7).sin()).collect();

    let in_db = table_with(16, ScoringSite::Database);
    let in_client = table_with(16, ScoringSite::Client);
    in_db.batch_insert(&vectors).unwrap();
    in_client.batch_insert(&vectors).unwrap();

    let db_hits = in_db.search(&query, 10, false).unwrap();
    let client_hits = in_client.search(&query, 10, false).unwrap();

    assert_eq!(db_hits.len(), client_hits.len());
    for (a, b) in db_hits.iter().zip(&client_hits) {
        assert_eq!(a.id, b.id);
        assert!((a.similarity - b.similarity).abs() < 1e-5);
    }
}

#[test]
fn test_results_are_sorted_and_bounded() {
    let table = table_with(8, ScoringSite::Database);
    table.batch_insert(&sample_vectors(25, 8)).unwrap();

    let hits = table.search(&[1.0, -1.0, 0.5, 0.0, 2.0, -0.5, 1.0, 1.0], 7, false).unwrap();

    assert_eq!(hits.len(), 7);
    for pair in hits.windows(2) {
        assert!(pair[0].similarity >= pair[1].similarity);
    }
}

#[test]
fn test_limit_larger_than_table() {
    let table = table_with(4, ScoringSite::Client);
    table.batch_insert(&sample_vectors(3, 4)).unwrap();

    let hits = table.search(&[1.0, 1.0, 1.0, 1.0], 50, false).unwrap();
    assert_eq!(hits.len(), 3);
}

#[test]
fn test_ties_break_by_ascending_id() {
    for scoring in [ScoringSite::Database, ScoringSite::Client] {
        let table = table_with(3, scoring);
        let first = table.upsert(&[0.2, 0.4, 0.6], None).unwrap();
        let second = table.upsert(&[0.2, 0.4, 0.6], None).unwrap();

        let hits = table.search(&[1.0, 2.0, 3.0], 2, false).unwrap();
        assert_eq!(hits[0].id, first, "{scoring:?}");
        assert_eq!(hits[1].id, second);
        assert_eq!(hits[0].similarity, hits[1].similarity);
    }
}

#[test]
fn test_coarse_filter_bounds_the_rerank() {
    let table = table_with(4, ScoringSite::Database);

    // Closest by angle, but every minor sign differs from the query
    let by_angle = table.upsert(&[1.0, -0.01, -0.01, -0.01], None).unwrap();
    // Same signs as the query, but nearly orthogonal to it
    let by_signs = table.upsert(&[0.01, 1.0, 1.0, 1.0], None).unwrap();

    let query = [1.0, 0.01, 0.01, 0.01];

    // With one candidate only the Hamming-nearest record is reranked
    let hits = table.search(&query, 1, false).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, by_signs);

    // With both candidates the exact rerank restores the true order
    let hits = table.search(&query, 2, false).unwrap();
    assert_eq!(hits[0].id, by_angle);
    assert_eq!(hits[1].id, by_signs);
}

#[test]
fn test_search_respects_model_tag() {
    let mut table = table_with(4, ScoringSite::Database);

    table.set_model_tag(Some(ModelTag::new("model-a")));
    let old = table.upsert(&[1.0, 0.0, 0.0, 0.0], None).unwrap();

    table.set_model_tag(Some(ModelTag::new("model-b")));
    let new = table.upsert(&[0.9, 0.1, 0.0, 0.0], None).unwrap();

    let hits = table.search(&[1.0, 0.0, 0.0, 0.0], 5, false).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, new);

    let hits = table.search(&[1.0, 0.0, 0.0, 0.0], 5, true).unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].id, old);
}

#[test]
fn test_zero_query_scores_zero() {
    let table = table_with(3, ScoringSite::Database);
    table.upsert(&[1.0, 2.0, 3.0], None).unwrap();

    let hits = table.search(&[0.0, 0.0, 0.0], 1, false).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].similarity, 0.0);
}
