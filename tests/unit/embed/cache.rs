use super::*;

use std::cell::Cell;

fn tmp_root(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "sweepviz_cache_{tag}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ))
}

fn dataset(name: &str, rows: usize, dims: usize) -> Dataset {
    let data = (0..rows * dims).map(|i| (i % 17) as f64 * 0.25).collect();
    let samples = Matrix::from_row_major(rows, dims, data).unwrap();
    let labels = (0..rows).map(|i| (i % 2) as f64).collect();
    Dataset::new(name, samples, labels).unwrap()
}

/// Deterministic stand-in reducer: first three columns scaled.
fn reduce3(samples: &Matrix) -> SweepResult<Matrix> {
    let mut data = Vec::with_capacity(samples.rows() * 3);
    for row in samples.iter_rows() {
        data.extend(row[..3].iter().map(|v| v * 0.1 + 1.0 / 3.0));
    }
    Matrix::from_row_major(samples.rows(), 3, data)
}

#[test]
fn second_call_hits_without_computing() {
    let root = tmp_root("hit");
    let cache = EmbeddingCache::new(DataLayout::new(&root));
    let ds = dataset("blobs", 20, 6);
    let key = EmbeddingKey::new("blobs", 32, 3, "euclidean").unwrap();

    let calls = Cell::new(0);
    let first = cache
        .get_or_compute_with_outcome(&key, &ds, |m| {
            calls.set(calls.get() + 1);
            reduce3(m)
        })
        .unwrap();
    assert_eq!(first.outcome, CacheOutcome::Miss);
    assert!(cache.path_for(&key).is_file());

    let second = cache
        .get_or_compute_with_outcome(&key, &ds, |_| -> SweepResult<Matrix> {
            panic!("compute must not run on a hit")
        })
        .unwrap();
    assert_eq!(second.outcome, CacheOutcome::Hit);
    assert_eq!(calls.get(), 1);
    // Bit-exact: the artifact round-trips every f64.
    assert_eq!(first.embedding, second.embedding);
    assert_eq!(second.embedding.labels(), ds.labels());

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn different_keys_get_different_artifacts() {
    let root = tmp_root("keys");
    let cache = EmbeddingCache::new(DataLayout::new(&root));
    let ds = dataset("blobs", 10, 5);
    let a = EmbeddingKey::new("blobs", 32, 3, "euclidean").unwrap();
    let b = EmbeddingKey::new("blobs", 32, 3, "cosine").unwrap();

    cache.get_or_compute(&a, &ds, reduce3).unwrap();
    let outcome = cache
        .get_or_compute_with_outcome(&b, &ds, reduce3)
        .unwrap()
        .outcome;
    assert_eq!(outcome, CacheOutcome::Miss);
    assert_ne!(cache.path_for(&a), cache.path_for(&b));

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn low_dimensional_source_passes_through_without_writing() {
    let root = tmp_root("pass");
    let cache = EmbeddingCache::new(DataLayout::new(&root));
    let key = EmbeddingKey::new("flat", 32, 3, "euclidean").unwrap();

    for dims in [2, 3] {
        let ds = dataset("flat", 8, dims);
        let cached = cache
            .get_or_compute_with_outcome(&key, &ds, |_| -> SweepResult<Matrix> {
                panic!("compute must not run on pass-through")
            })
            .unwrap();
        assert_eq!(cached.outcome, CacheOutcome::PassThrough);
        assert_eq!(cached.embedding.coords(), ds.samples());
    }
    assert!(!cache.path_for(&key).exists());

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn truncated_artifact_is_corruption_not_a_miss() {
    let root = tmp_root("trunc");
    let cache = EmbeddingCache::new(DataLayout::new(&root));
    let ds = dataset("blobs", 12, 6);
    let key = EmbeddingKey::new("blobs", 32, 3, "euclidean").unwrap();
    cache.get_or_compute(&key, &ds, reduce3).unwrap();

    let path = cache.path_for(&key);
    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

    let err = cache
        .get_or_compute(&key, &ds, |_| -> SweepResult<Matrix> {
            panic!("corruption must not trigger a recompute")
        })
        .unwrap_err();
    assert!(err.is_cache_corruption(), "{err}");

    assert!(cache.purge(&key).unwrap());
    assert!(!cache.purge(&key).unwrap());
    let outcome = cache
        .get_or_compute_with_outcome(&key, &ds, reduce3)
        .unwrap()
        .outcome;
    assert_eq!(outcome, CacheOutcome::Miss);

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn tampered_values_fail_the_checksum() {
    let root = tmp_root("tamper");
    let cache = EmbeddingCache::new(DataLayout::new(&root));
    let ds = dataset("blobs", 6, 4);
    let key = EmbeddingKey::new("blobs", 32, 3, "euclidean").unwrap();
    cache.get_or_compute(&key, &ds, reduce3).unwrap();

    let path = cache.path_for(&key);
    let mut doc: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    doc["data"][0] = serde_json::json!(1234.5);
    std::fs::write(&path, serde_json::to_vec(&doc).unwrap()).unwrap();

    let err = cache.get_or_compute(&key, &ds, reduce3).unwrap_err();
    assert!(err.to_string().contains("checksum mismatch"), "{err}");

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn reducer_failures_and_bad_shapes_are_not_cached() {
    let root = tmp_root("fail");
    let cache = EmbeddingCache::new(DataLayout::new(&root));
    let ds = dataset("blobs", 6, 4);
    let key = EmbeddingKey::new("blobs", 32, 3, "euclidean").unwrap();

    let err = cache
        .get_or_compute(&key, &ds, |_| Err(SweepError::reduce("no convergence")))
        .unwrap_err();
    assert!(matches!(err, SweepError::Reduce(_)));

    let err = cache
        .get_or_compute(&key, &ds, |m| m.leading_columns(2))
        .unwrap_err();
    assert!(matches!(err, SweepError::Reduce(_)));
    assert!(!cache.path_for(&key).exists());

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn key_must_name_the_supplied_dataset() {
    let cache = EmbeddingCache::new(DataLayout::new(tmp_root("mismatch")));
    let ds = dataset("blobs", 6, 4);
    let key = EmbeddingKey::new("other", 32, 3, "euclidean").unwrap();
    assert!(matches!(
        cache.get_or_compute(&key, &ds, reduce3),
        Err(SweepError::Validation(_))
    ));
}
