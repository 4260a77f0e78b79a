//! Structural operations: create, rename, remove, walks and translation

use super::common::{memory_file, scenario_schema, translation};
use tabletree::{ArrayData, File, KindFilter, NodeClass, StoreConfig, TranslationMap, TreeError};

fn sample_tree() -> File {
    let mut file = File::in_memory(TranslationMap::new()).unwrap();
    file.create_group("/", "a", "").unwrap();
    file.create_group("/a", "b", "").unwrap();
    file.create_table("/a/b", "t", scenario_schema(), "").unwrap();
    file.create_group("/", "c", "").unwrap();
    file.create_array("/c", "arr", &ArrayData::from_vec(vec![1, 2, 3]).unwrap(), "")
        .unwrap();
    file
}

fn paths<'a>(nodes: impl Iterator<Item = tabletree::NodeRef<'a>>) -> Vec<String> {
    nodes.map(|n| n.path()).collect()
}

#[test]
fn test_rename_keeps_identity() {
    let mut file = sample_tree();
    let id = file.get_node("/a").unwrap().id();
    file.rename_node("/a", "z").unwrap();

    assert_eq!(file.get_node("/z").unwrap().id(), id);
    assert!(matches!(file.get_node("/a"), Err(TreeError::NotFound(_))));
    assert_eq!(file.get_node("/z/b/t").unwrap().path(), "/z/b/t");

    assert!(matches!(
        file.rename_node("/z", "c"),
        Err(TreeError::NameConflict { .. })
    ));
    assert!(matches!(
        file.rename_node("/", "root"),
        Err(TreeError::InvalidName(_))
    ));
}

#[test]
fn test_non_recursive_remove_leaves_tree_unchanged() {
    let mut file = sample_tree();
    let before = file.to_string();
    assert!(matches!(
        file.remove_node("/a", false),
        Err(TreeError::NotEmpty(_))
    ));
    assert_eq!(file.to_string(), before);
    assert!(matches!(
        file.remove_node("/", true),
        Err(TreeError::InvalidName(_))
    ));
}

#[test]
fn test_recursive_remove_frees_blobs() {
    let (mut file, store) = memory_file(StoreConfig::default());
    let baseline = store.blob_count();
    file.create_group("/", "a", "").unwrap();
    file.create_group("/a", "b", "").unwrap();
    file.create_table("/a/b", "t", scenario_schema(), "").unwrap();
    file.create_array("/a", "arr", &ArrayData::from_vec(vec![1.5, 2.5]).unwrap(), "")
        .unwrap();
    assert_eq!(store.blob_count(), baseline + 2);

    file.remove_node("/a", true).unwrap();
    for path in ["/a", "/a/b", "/a/b/t", "/a/arr"] {
        assert!(matches!(file.get_node(path), Err(TreeError::NotFound(_))));
    }
    assert_eq!(store.blob_count(), baseline);
    assert_eq!(paths(file.walk_nodes("/", KindFilter::Any).unwrap()), vec!["/"]);
}

#[test]
fn test_walks_are_depth_first_and_restartable() {
    let file = sample_tree();
    let groups = paths(file.walk_groups("/").unwrap());
    assert_eq!(groups, vec!["/", "/a", "/a/b", "/c"]);
    assert_eq!(paths(file.walk_groups("/").unwrap()), groups);

    assert_eq!(
        paths(file.walk_nodes("/", KindFilter::Leaf).unwrap()),
        vec!["/a/b/t", "/c/arr"]
    );
    assert_eq!(
        paths(file.walk_nodes("/a", KindFilter::Any).unwrap()),
        vec!["/a", "/a/b", "/a/b/t"]
    );
}

#[test]
fn test_list_nodes_filters_direct_children() {
    let file = sample_tree();
    let top: Vec<NodeClass> = file
        .list_nodes("/", KindFilter::Any)
        .unwrap()
        .iter()
        .map(|n| n.class())
        .collect();
    assert_eq!(top, vec![NodeClass::Group, NodeClass::Group]);
    assert!(file.list_nodes("/c", KindFilter::Table).unwrap().is_empty());
    assert_eq!(file.list_nodes("/c", KindFilter::Array).unwrap().len(), 1);
    assert!(matches!(
        file.list_nodes("/c/arr", KindFilter::Any),
        Err(TreeError::NotAGroup(_))
    ));
}

#[test]
fn test_create_preconditions() {
    let mut file = sample_tree();
    assert!(matches!(
        file.create_group("/", "a", ""),
        Err(TreeError::NameConflict { .. })
    ));
    assert!(matches!(
        file.create_group("/c/arr", "x", ""),
        Err(TreeError::NotAGroup(_))
    ));
    assert!(matches!(
        file.create_group("/", "", ""),
        Err(TreeError::InvalidName(_))
    ));
    assert!(matches!(
        ArrayData::from_nested(vec![vec![1], vec![2, 3]]),
        Err(TreeError::ShapeError(_))
    ));
}

#[test]
fn test_translation_applies_at_the_boundary() {
    let mut file = File::in_memory(translation()).unwrap();
    file.create_group("/", "detector", "").unwrap();
    file.create_table("/detector", "table", scenario_schema(), "")
        .unwrap();

    let node = file.get_node("/detector/table").unwrap();
    assert_eq!(node.path(), "/detector/table");
    assert_eq!(node.name(), "table");
    assert_eq!(
        file.translation().stored_path(&node.path()).unwrap(),
        "/for/ 11 "
    );
    // stored names are not addressable directly
    assert!(matches!(
        file.get_node("/for"),
        Err(TreeError::InvalidTranslation(_))
    ));
    assert!(matches!(
        file.create_group("/", "for", ""),
        Err(TreeError::InvalidTranslation(_))
    ));
    let listed: Vec<String> = file
        .list_nodes("/detector", KindFilter::Table)
        .unwrap()
        .iter()
        .map(|n| n.name().to_string())
        .collect();
    assert_eq!(listed, vec!["table"]);
}

#[test]
fn test_child_lookup_uses_display_names() {
    let mut file = File::in_memory(translation()).unwrap();
    file.create_group("/", "detector", "").unwrap();
    file.create_table("/detector", "table", scenario_schema(), "")
        .unwrap();

    let root = file.root();
    assert!(root.child("for").is_none());
    let detector = root.child("detector").unwrap();
    assert_eq!(detector.path(), "/detector");
    assert!(detector.child(" 11 ").is_none());
    assert_eq!(detector.child("table").unwrap().path(), "/detector/table");
}
