//! Integration tests over the bundled sample recipes.

use recipe_ref::core::error::ConfigError;
use recipe_ref::core::pipeline::{Pipeline, PipelineOptions};
use recipe_ref::core::registry::{self, TypeRegistry};
use recipe_ref::core::types::ConfigNode;
use std::path::{Path, PathBuf};

fn recipe(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("recipes").join(name)
}

const NO_OVERRIDES: &[PathBuf] = &[];

#[test]
fn test_rc011_librispeech_builds() {
    let config = Pipeline::default()
        .run_files(&recipe("librispeech_test.yaml"), NO_OVERRIDES)
        .unwrap();
    assert_eq!(config.sections().len(), 1);
    assert_eq!(config.split_count(), 3);

    let splits: Vec<_> = config.section("test").unwrap().keys().cloned().collect();
    assert_eq!(splits, vec!["dev-clean", "dev-other", "test-clean"]);

    let dev = config.split("test", "dev-other").unwrap();
    assert_eq!(dev.data_len, "datasets/librispeech/data/wav/dev-other/idx2wav_len");
    let groups = dev.group_info.as_ref().unwrap();
    assert_eq!(groups["speaker"], "datasets/librispeech/data/wav/dev-other/idx2spk");

    let block = config.split("test", "test-clean").unwrap();
    assert_eq!(block.iterator_type, "block.BlockIterator");
    assert!(block.iterator_conf.contains_key("batch_len"));
}

#[test]
fn test_rc011_ljspeech_override() {
    let config = Pipeline::default()
        .run_files(
            &recipe("librispeech_test.yaml"),
            &[recipe("ljspeech_override.yaml")],
        )
        .unwrap();
    assert_eq!(config.split_count(), 3);

    let dev = config.split("test", "dev-clean").unwrap();
    assert_eq!(dev.dataset_conf.main_data["feat"], "datasets/ljspeech/data/wav22050/dev-clean/idx2wav");
    assert!(dev.group_info.is_some());

    let swapped = config.split("test", "test-clean").unwrap();
    assert_eq!(swapped.iterator_type, "abs.Iterator");
    assert!(swapped.group_info.is_none());
    assert!(swapped.iterator_conf.is_empty());
    assert_eq!(swapped.data_len, "datasets/ljspeech/data/wav22050/test/idx2wav_len");
}

#[test]
fn test_rc011_resolved_tree_is_literal() {
    let tree = Pipeline::default()
        .resolve_files(&recipe("librispeech_test.yaml"), NO_OVERRIDES)
        .unwrap();
    assert_eq!(tree.reference_count(), 0);
    assert_eq!(
        tree.get("data_root").and_then(ConfigNode::as_str),
        Some("datasets/librispeech/data")
    );
}

#[test]
fn test_rc011_override_order_matters() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first.yaml");
    let second = dir.path().join("second.yaml");
    std::fs::write(&first, "dataset: first\n").unwrap();
    std::fs::write(&second, "dataset: second\n").unwrap();
    let base = recipe("librispeech_test.yaml");

    let forward = Pipeline::default()
        .resolve_files(&base, &[&first, &second])
        .unwrap();
    let backward = Pipeline::default()
        .resolve_files(&base, &[&second, &first])
        .unwrap();
    assert_eq!(
        forward.get("data_root").and_then(ConfigNode::as_str),
        Some("datasets/second/data")
    );
    assert_eq!(
        backward.get("data_root").and_then(ConfigNode::as_str),
        Some("datasets/first/data")
    );
}

#[test]
fn test_rc011_restricted_registry_rejects_block_iterator() {
    let mut reg = TypeRegistry::new();
    reg.register("abs.Iterator", registry::IteratorKind::Abstract)
        .register_dataset("speech_text.SpeechTextDataset");
    let err = Pipeline::new(&reg, PipelineOptions::default())
        .run_files(&recipe("librispeech_test.yaml"), NO_OVERRIDES)
        .unwrap_err();
    assert_eq!(
        err,
        ConfigError::UnknownType {
            path: "test.test-clean.type".into(),
            type_name: "block.BlockIterator".into()
        }
    );
}

#[test]
fn test_rc011_syntax_error_names_file() {
    let dir = tempfile::tempdir().unwrap();
    let broken = dir.path().join("broken.yaml");
    std::fs::write(&broken, "a: 1\na: 2\n").unwrap();
    let err = Pipeline::default()
        .run_files(&recipe("librispeech_test.yaml"), &[&broken])
        .unwrap_err();
    match err {
        ConfigError::Syntax { path, .. } => assert!(path.contains("broken.yaml"), "{}", path),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_rc011_units_run_concurrently() {
    let handles: Vec<_> = (0..4)
        .map(|_| {
            std::thread::spawn(|| {
                Pipeline::default()
                    .run_files(&recipe("librispeech_test.yaml"), NO_OVERRIDES)
                    .map(|c| c.split_count())
            })
        })
        .collect();
    for h in handles {
        assert_eq!(h.join().unwrap(), Ok(3));
    }
}
