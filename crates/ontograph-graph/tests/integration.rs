//! Integration tests for ontograph-graph against a live Neo4j instance (no plugins needed).
//!
//! Run with: cargo test --package ontograph-graph --test integration -- --ignored
//!
//! Skipped automatically if Neo4j is not available.

use std::time::{SystemTime, UNIX_EPOCH};

use ontograph_core::{Label, LabelSet, NodeRef, PropertyMap, RelType};
use ontograph_graph::{GraphClient, GraphConfig, GraphStore, Statement};

async fn connect_or_skip() -> Option<GraphClient> {
    let config = GraphConfig::default();
    match GraphClient::connect(&config).await {
        Ok(client) => Some(client),
        Err(e) => {
            eprintln!("Skipping integration test (Neo4j not available): {e}");
            None
        }
    }
}

/// Per-test name prefix so concurrent runs never share nodes.
fn unique_prefix(test: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("it_{test}_{nanos}_")
}

async fn cleanup(client: &GraphClient, prefix: &str) {
    let stmt = Statement::new("MATCH (n) WHERE n.name STARTS WITH $prefix DETACH DELETE n")
        .param("prefix", prefix);
    let _ = client.run(&stmt).await;
}

fn props(pairs: &[(&str, serde_json::Value)]) -> PropertyMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[tokio::test]
#[ignore = "requires live Neo4j"]
async fn test_merge_node_and_read_back() {
    let Some(client) = connect_or_skip().await else {
        return;
    };
    let prefix = unique_prefix("merge_node");
    let name = format!("{prefix}t1");

    let labels = LabelSet::new(Label::instance()).with(Label::new("Table").unwrap());
    let stats = client
        .merge_node(&labels, &name, &props(&[("rows", serde_json::json!(12))]))
        .await
        .unwrap();
    assert_eq!(stats.nodes_created, 1);

    let again = client
        .merge_node(&labels, &name, &PropertyMap::new())
        .await
        .unwrap();
    assert!(again.skipped);

    let found = GraphStore::find_nodes(&client, &name, Some(&Label::instance()))
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert!(found[0].has_label("Table"));
    assert_eq!(found[0].properties["rows"], serde_json::json!(12));

    cleanup(&client, &prefix).await;
}

#[tokio::test]
#[ignore = "requires live Neo4j"]
async fn test_merge_relationship_is_idempotent() {
    let Some(client) = connect_or_skip().await else {
        return;
    };
    let prefix = unique_prefix("merge_rel");
    let a = NodeRef::instance(format!("{prefix}a"));
    let b = NodeRef::instance(format!("{prefix}b"));
    for node in [&a, &b] {
        client
            .merge_node(&LabelSet::new(Label::instance()), &node.name, &PropertyMap::new())
            .await
            .unwrap();
    }

    let rel = RelType::new("LINKS_TO").unwrap();
    let first = client
        .merge_relationship(&a, &b, &rel, &PropertyMap::new())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.relationships_created, 1);

    let second = client
        .merge_relationship(&a, &b, &rel, &PropertyMap::new())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second.relationships_created, 0);
    assert!(second.skipped);

    let hood = client.node_relationships(&a).await.unwrap().unwrap();
    assert_eq!(hood.outgoing.len(), 1);
    assert_eq!(hood.outgoing[0].edge.target, b.name);

    cleanup(&client, &prefix).await;
}

#[tokio::test]
#[ignore = "requires live Neo4j"]
async fn test_missing_endpoint_returns_none() {
    let Some(client) = connect_or_skip().await else {
        return;
    };
    let prefix = unique_prefix("missing_endpoint");
    let a = NodeRef::instance(format!("{prefix}a"));
    client
        .merge_node(&LabelSet::new(Label::instance()), &a.name, &PropertyMap::new())
        .await
        .unwrap();

    let result = client
        .merge_relationship(
            &a,
            &NodeRef::instance(format!("{prefix}ghost")),
            &RelType::new("LINKS_TO").unwrap(),
            &PropertyMap::new(),
        )
        .await
        .unwrap();
    assert!(result.is_none());

    cleanup(&client, &prefix).await;
}

#[tokio::test]
#[ignore = "requires live Neo4j"]
async fn test_detach_delete_reports_counts() {
    let Some(client) = connect_or_skip().await else {
        return;
    };
    let prefix = unique_prefix("detach_delete");
    let names: Vec<String> = ["a", "b"].iter().map(|n| format!("{prefix}{n}")).collect();
    for name in &names {
        client
            .merge_node(&LabelSet::new(Label::instance()), name, &PropertyMap::new())
            .await
            .unwrap();
    }
    client
        .merge_relationship(
            &NodeRef::instance(names[0].clone()),
            &NodeRef::instance(names[1].clone()),
            &RelType::new("LINKS_TO").unwrap(),
            &PropertyMap::new(),
        )
        .await
        .unwrap();

    let stats = client
        .detach_delete(&Label::instance(), &names)
        .await
        .unwrap();
    assert_eq!(stats.nodes_deleted, 2);
    assert_eq!(stats.relationships_deleted, 1);

    cleanup(&client, &prefix).await;
}

#[tokio::test]
#[ignore = "requires live Neo4j"]
async fn test_typed_properties_survive_native_binding() {
    let Some(client) = connect_or_skip().await else {
        return;
    };
    let prefix = unique_prefix("typed_props");
    let (a, b) = (format!("{prefix}a"), format!("{prefix}b"));
    let labels = LabelSet::new(Label::instance());
    let values = props(&[
        ("rows", serde_json::json!(12)),
        ("ratio", serde_json::json!(0.25)),
        ("active", serde_json::json!(true)),
        ("tags", serde_json::json!(["x", "y"])),
        ("meta", serde_json::json!({"owner": "etl"})),
    ]);
    client.merge_node(&labels, &a, &values).await.unwrap();
    client.merge_node(&labels, &b, &PropertyMap::new()).await.unwrap();

    let rel = RelType::new("LINKS").unwrap();
    client
        .merge_relationship(
            &NodeRef::instance(&a),
            &NodeRef::instance(&b),
            &rel,
            &props(&[("weight", serde_json::json!(1.5))]),
        )
        .await
        .unwrap();

    let hood = GraphStore::node_relationships(&client, &NodeRef::instance(&a))
        .await
        .unwrap()
        .unwrap();
    let stored = &hood.node.properties;
    assert_eq!(stored["rows"], serde_json::json!(12));
    assert_eq!(stored["ratio"], serde_json::json!(0.25));
    assert_eq!(stored["active"], serde_json::json!(true));
    assert_eq!(stored["tags"], serde_json::json!(["x", "y"]));
    assert_eq!(stored["meta"], serde_json::json!(r#"{"owner":"etl"}"#));
    assert_eq!(hood.outgoing[0].edge.properties["weight"], serde_json::json!(1.5));

    cleanup(&client, &prefix).await;
    client.close();
}
