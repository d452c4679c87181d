//! Integration tests for the directory walk.
//!
//! Each test builds a throwaway dataset tree in a temp directory and indexes
//! it into a `MemoryStore`.

use entity_index::config::{Config, PathPattern};
use entity_index::error::IndexError;
use entity_index::layout::{
    AcceptAll, IndexOptions, LayoutConfig, PatternValidator, Validator, index_derivatives,
    index_layout,
};
use entity_index::store::MemoryStore;
use entity_index::types::{FileRecord, IndexSummary};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Create a temp dataset root. The root is canonicalized so expected paths
/// compare equal to indexed ones.
fn setup_dir() -> (TempDir, PathBuf) {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let root = temp.path().canonicalize().expect("Failed to canonicalize root");
    (temp, root)
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn touch(root: &Path, rel: &str) {
    write(root, rel, "");
}

fn layout(yaml: &str) -> LayoutConfig {
    LayoutConfig::parse(yaml, Path::new("test.yaml")).expect("Failed to parse layout config")
}

fn walk_only(configs: Vec<LayoutConfig>) -> IndexOptions {
    IndexOptions {
        layout_configs: configs,
        index_metadata: false,
        ..Default::default()
    }
}

fn run(
    root: &Path,
    options: &IndexOptions,
    validator: &dyn Validator,
) -> (IndexSummary, MemoryStore) {
    let mut store = MemoryStore::new();
    let summary = index_layout(root, options, validator, &mut store).expect("Indexing failed");
    (summary, store)
}

fn file<'a>(store: &'a MemoryStore, root: &Path, rel: &str) -> &'a FileRecord {
    let path = root.join(rel);
    store
        .files()
        .iter()
        .find(|f| f.path == path)
        .unwrap_or_else(|| panic!("{rel} was not indexed"))
}

fn indexed(store: &MemoryStore, root: &Path) -> Vec<String> {
    store
        .files()
        .iter()
        .map(|f| {
            f.path
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .into_owned()
        })
        .collect()
}

mod extraction_tests {
    use super::*;

    const SUBJECT_FIRST: &str = r#"
name: subject-first
entities:
  - name: subject
    pattern: 'sub-([a-z0-9]+)'
    mandatory: true
  - name: kind
    pattern: '_([a-z]+)\.txt$'
"#;

    const KIND_FIRST: &str = r#"
name: kind-first
entities:
  - name: kind
    pattern: '_([a-z]+)\.txt$'
  - name: subject
    pattern: 'sub-([a-z0-9]+)'
    mandatory: true
"#;

    #[test]
    fn missing_mandatory_entity_stops_extraction() {
        let (_temp, root) = setup_dir();
        touch(&root, "notes_readme.txt");
        touch(&root, "sub-01_readme.txt");

        let (summary, store) = run(&root, &walk_only(vec![layout(SUBJECT_FIRST)]), &AcceptAll);

        // The file is still recorded, just without tags
        let notes = file(&store, &root, "notes_readme.txt");
        assert!(notes.entities.is_empty());
        assert!(store.tags_for(&notes.path).is_empty());

        let subject = file(&store, &root, "sub-01_readme.txt");
        assert_eq!(subject.entities.get("subject"), Some(&json!("01")));
        assert_eq!(subject.entities.get("kind"), Some(&json!("readme")));

        assert_eq!(summary.files, 2);
        assert_eq!(summary.filename_tags, 2);
    }

    #[test]
    fn entity_order_decides_what_is_extracted() {
        let (_temp, root) = setup_dir();
        touch(&root, "notes_readme.txt");

        let (_, store) = run(&root, &walk_only(vec![layout(KIND_FIRST)]), &AcceptAll);

        let notes = file(&store, &root, "notes_readme.txt");
        assert_eq!(notes.entities.get("kind"), Some(&json!("readme")));
        assert!(notes.entities.get("subject").is_none());
    }

    #[test]
    fn builtin_bids_config_extracts_typed_values() {
        let (_temp, root) = setup_dir();
        touch(&root, "sub-01/func/sub-01_task-rest_run-02_bold.nii.gz");

        let bids = LayoutConfig::resolve("bids").unwrap();
        let (_, store) = run(&root, &walk_only(vec![bids]), &AcceptAll);

        let bold = file(&store, &root, "sub-01/func/sub-01_task-rest_run-02_bold.nii.gz");
        let expected = json!({
            "subject": "01",
            "task": "rest",
            "run": 2,
            "datatype": "func",
            "suffix": "bold",
            "extension": "nii.gz",
        });
        assert_eq!(&json!(bold.entities), &expected);
        assert_eq!(store.tags_for(&bold.path).len(), 6);
    }

    #[test]
    fn uncoercible_value_aborts_the_run() {
        let (_temp, root) = setup_dir();
        touch(&root, "x_run-ab.txt");

        let config = layout(
            r#"
name: typed
entities:
  - name: run
    pattern: 'run-([a-z0-9]+)'
    dtype: int
"#,
        );
        let mut store = MemoryStore::new();
        let result = index_layout(&root, &walk_only(vec![config]), &AcceptAll, &mut store);
        match result {
            Err(IndexError::Coercion { entity, value, dtype }) => {
                assert_eq!(entity, "run");
                assert_eq!(value, "ab");
                assert_eq!(dtype, "int");
            }
            other => panic!("expected coercion error, got {other:?}"),
        }
    }
}

mod layering_tests {
    use super::*;

    const BASE: &str = r#"
name: base
entities:
  - name: kind
    pattern: '_([a-z]+)\.txt$'
"#;

    #[test]
    fn nested_config_applies_to_its_subtree_only() {
        let (_temp, root) = setup_dir();
        write(
            &root,
            "a/layout_config.json",
            r#"{"name": "nested", "entities": [{"name": "flavor", "pattern": "flavor-([a-z]+)"}]}"#,
        );
        touch(&root, "a/flavor-sweet_note.txt");
        touch(&root, "a/deep/flavor-bitter_note.txt");
        touch(&root, "b/flavor-sour_note.txt");

        let (summary, store) = run(&root, &walk_only(vec![layout(BASE)]), &AcceptAll);

        assert_eq!(
            indexed(&store, &root),
            vec![
                "a/flavor-sweet_note.txt",
                "a/deep/flavor-bitter_note.txt",
                "b/flavor-sour_note.txt",
            ]
        );

        let sweet = file(&store, &root, "a/flavor-sweet_note.txt");
        assert_eq!(sweet.entities.get("flavor"), Some(&json!("sweet")));
        assert_eq!(sweet.entities.get("kind"), Some(&json!("note")));

        let bitter = file(&store, &root, "a/deep/flavor-bitter_note.txt");
        assert_eq!(bitter.entities.get("flavor"), Some(&json!("bitter")));

        // The sibling subtree never sees the nested config
        let sour = file(&store, &root, "b/flavor-sour_note.txt");
        assert!(sour.entities.get("flavor").is_none());
        assert_eq!(sour.entities.get("kind"), Some(&json!("note")));

        let flavor = store.entity("flavor").expect("nested entity not stored");
        assert_eq!(flavor.config.as_deref(), Some("nested"));
        assert!(!flavor.is_metadata);
        assert_eq!(summary.directories, 4);
    }

    #[test]
    fn nested_definition_overrides_by_name() {
        let (_temp, root) = setup_dir();
        write(
            &root,
            "a/layout_config.json",
            r#"{"name": "nested", "entities": [{"name": "kind", "pattern": "^([a-z]+)_", "scope": "filename"}]}"#,
        );
        touch(&root, "alpha_beta.txt");
        touch(&root, "a/alpha_beta.txt");

        let (_, store) = run(&root, &walk_only(vec![layout(BASE)]), &AcceptAll);

        assert_eq!(
            file(&store, &root, "alpha_beta.txt").entities.get("kind"),
            Some(&json!("beta"))
        );
        assert_eq!(
            file(&store, &root, "a/alpha_beta.txt").entities.get("kind"),
            Some(&json!("alpha"))
        );
        assert_eq!(store.entity("kind").unwrap().config.as_deref(), Some("nested"));
    }

    #[test]
    fn malformed_directory_config_is_an_error() {
        let (_temp, root) = setup_dir();
        write(&root, "a/layout_config.json", "{not json");
        touch(&root, "a/x.txt");

        let mut store = MemoryStore::new();
        let result = index_layout(&root, &walk_only(vec![]), &AcceptAll, &mut store);
        assert!(matches!(result, Err(IndexError::Config { .. })));
    }

    #[test]
    fn files_commit_before_descending() {
        let (_temp, root) = setup_dir();
        touch(&root, "top.txt");
        touch(&root, "a/one.txt");
        touch(&root, "a/b/two.txt");

        let (_, store) = run(&root, &walk_only(vec![]), &AcceptAll);
        assert_eq!(indexed(&store, &root), vec!["top.txt", "a/one.txt", "a/b/two.txt"]);
        assert_eq!(store.commits(), 3);
    }
}

mod derivatives_tests {
    use super::*;

    #[test]
    fn derivatives_are_indexed_as_separate_roots() {
        let (_temp, root) = setup_dir();
        touch(&root, "sub-01/anat/sub-01_T1w.nii.gz");
        touch(&root, "sub-01/derivatives/notes.txt");
        touch(&root, "derivatives/prep/sub-01/anat/sub-01_desc-brain_T1w.nii.gz");

        let bids = LayoutConfig::resolve("bids").unwrap();
        let options = walk_only(vec![bids]);

        // Only <root>/derivatives is reserved; a nested one is ordinary
        let (summary, store) = run(&root, &options, &AcceptAll);
        assert_eq!(
            indexed(&store, &root),
            vec!["sub-01/anat/sub-01_T1w.nii.gz", "sub-01/derivatives/notes.txt"]
        );
        assert_eq!(summary.files, 2);

        let mut store = MemoryStore::new();
        let summaries =
            index_derivatives(&root, &options, |_| Ok(AcceptAll), &mut store).unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].root, root.join("derivatives/prep"));
        assert_eq!(summaries[0].files, 1);

        let derived = &store.files()[0];
        assert_eq!(derived.entities.get("subject"), Some(&json!("01")));
        assert_eq!(derived.entities.get("suffix"), Some(&json!("T1w")));
    }

    #[test]
    fn no_derivatives_directory_means_no_roots() {
        let (_temp, root) = setup_dir();
        touch(&root, "x.txt");

        let mut store = MemoryStore::new();
        let summaries =
            index_derivatives(&root, &walk_only(vec![]), |_| Ok(AcceptAll), &mut store).unwrap();
        assert!(summaries.is_empty());
    }
}

mod validity_tests {
    use super::*;

    fn validator(root: &Path, force_index: Vec<PathPattern>) -> PatternValidator {
        let mut config = Config::default();
        config.index.force_index = force_index;
        config.validator(root).expect("Failed to build validator")
    }

    #[test]
    fn ignored_directories_are_pruned() {
        let (_temp, root) = setup_dir();
        touch(&root, "code/run.py");
        touch(&root, ".git/HEAD");
        touch(&root, "sub-01/x.txt");
        touch(&root, "sub-01/.cache/y.txt");
        touch(&root, "sub-01/.hidden");

        let validator = validator(&root, vec![]);
        let (summary, store) = run(&root, &walk_only(vec![]), &validator);

        assert_eq!(indexed(&store, &root), vec!["sub-01/x.txt"]);
        // root and sub-01 only
        assert_eq!(summary.directories, 2);
    }

    #[test]
    fn force_index_reaches_inside_ignored_directories() {
        let (_temp, root) = setup_dir();
        touch(&root, "code/drop.py");
        touch(&root, "code/keep/a.py");
        touch(&root, "code/zzz/b.py");
        touch(&root, "sourcedata/raw.txt");
        touch(&root, "sub-01/x.txt");

        let validator = validator(&root, vec![PathPattern::Path("code/keep".into())]);
        let (_, store) = run(&root, &walk_only(vec![]), &validator);

        // Ignored directories are descended because a force pattern exists,
        // but only the forced subtree bypasses the file checks.
        assert_eq!(indexed(&store, &root), vec!["code/keep/a.py", "sub-01/x.txt"]);
    }

    #[test]
    fn regex_force_pattern() {
        let (_temp, root) = setup_dir();
        touch(&root, "sourcedata/raw.txt");
        touch(&root, "sourcedata/sub-01/raw.txt");

        let validator = validator(
            &root,
            vec![PathPattern::Regex {
                regex: "^/sourcedata$".to_string(),
            }],
        );
        let (_, store) = run(&root, &walk_only(vec![]), &validator);

        assert_eq!(
            indexed(&store, &root),
            vec!["sourcedata/raw.txt", "sourcedata/sub-01/raw.txt"]
        );
    }

    #[test]
    fn force_index_matches_individual_files() {
        let (_temp, root) = setup_dir();
        touch(&root, "code/drop.py");
        touch(&root, "code/keep.py");
        touch(&root, "sub-01/x.txt");

        for pattern in [
            PathPattern::Path("code/keep.py".into()),
            PathPattern::parse(r"re:^/code/keep\.py$"),
        ] {
            let validator = validator(&root, vec![pattern.clone()]);
            assert!(!validator.is_valid_dir(&root.join("code")));

            let (_, store) = run(&root, &walk_only(vec![]), &validator);
            assert_eq!(
                indexed(&store, &root),
                vec!["code/keep.py", "sub-01/x.txt"],
                "{pattern:?}"
            );
        }
    }

    #[test]
    fn missing_root_is_an_io_error() {
        let (_temp, root) = setup_dir();
        let mut store = MemoryStore::new();
        let result = index_layout(
            &root.join("absent"),
            &walk_only(vec![]),
            &AcceptAll,
            &mut store,
        );
        assert!(matches!(result, Err(IndexError::Io { .. })));
    }
}
