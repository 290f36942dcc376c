//! Aggregator publishing against a local capture server

mod common;

use edgeup_control::{AggregatorClient, Pipeline, PublishOutcome};
use edgeup_proto::{RuntimeConfig, SubscriptionArtifact};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

mod identity {
    use async_trait::async_trait;
    use edgeup_control::{IdentityLookup, LinkError, NetworkIdentity};

    pub struct Fixed;

    #[async_trait]
    impl IdentityLookup for Fixed {
        async fn lookup(&self) -> Result<NetworkIdentity, LinkError> {
            Ok(NetworkIdentity {
                country: "SG".to_string(),
                as_organization: "Example Transit".to_string(),
            })
        }
    }
}

fn write_artifact(temp: &TempDir, text: &str) -> std::path::PathBuf {
    let path = temp.path().join("sub.txt");
    SubscriptionArtifact::new(text).persist(&path).unwrap();
    path
}

#[tokio::test]
async fn test_delete_submits_only_node_lines() {
    let (base, captured) = common::spawn_capture_server().await;
    let temp = TempDir::new().unwrap();
    let path = write_artifact(
        &temp,
        "vless://a@edge:443?x#n\nnot a node\ntrojan://b@edge:443?y#n\n",
    );

    let client = AggregatorClient::new(reqwest::Client::new(), base);
    let outcome = client.delete_stale_nodes(&path).await.unwrap();

    assert_eq!(outcome, PublishOutcome::NodesDeleted(2));
    let requests = captured.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].0, "/api/delete-nodes");
    assert_eq!(
        requests[0].1,
        json!({"nodes": ["vless://a@edge:443?x#n", "trojan://b@edge:443?y#n"]})
    );
}

#[tokio::test]
async fn test_publish_prefers_subscription_url() {
    let (base, captured) = common::spawn_capture_server().await;
    let temp = TempDir::new().unwrap();
    let path = write_artifact(&temp, "vless://a@edge:443#n\n");
    let config = RuntimeConfig {
        upload_url: Some(base.clone()),
        project_url: Some("https://app.example.com".to_string()),
        ..Default::default()
    };

    let client = AggregatorClient::new(reqwest::Client::new(), base);
    let outcome = client.publish(&config, &path).await.unwrap();

    assert_eq!(
        outcome,
        PublishOutcome::SubscriptionUploaded("https://app.example.com/sub".to_string())
    );
    let requests = captured.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].0, "/api/add-subscriptions");
    assert_eq!(
        requests[0].1,
        json!({"subscription": ["https://app.example.com/sub"]})
    );
}

#[tokio::test]
async fn test_publish_uploads_nodes_without_project_url() {
    let (base, captured) = common::spawn_capture_server().await;
    let temp = TempDir::new().unwrap();
    let path = write_artifact(&temp, "\nvless://a#n\n\nvmess://b\n\ntrojan://c#n\n\n");
    let config = RuntimeConfig {
        upload_url: Some(base.clone()),
        ..Default::default()
    };

    let client = AggregatorClient::new(reqwest::Client::new(), base);
    let outcome = client.publish(&config, &path).await.unwrap();

    assert_eq!(outcome, PublishOutcome::NodesUploaded(3));
    let requests = captured.lock().unwrap();
    assert_eq!(requests[0].0, "/api/add-nodes");
    assert_eq!(
        requests[0].1,
        json!({"nodes": ["vless://a#n", "vmess://b", "trojan://c#n"]})
    );
}

#[tokio::test]
async fn test_pipeline_deletes_then_publishes_fresh_nodes() {
    let (base, captured) = common::spawn_capture_server().await;
    let temp = TempDir::new().unwrap();
    write_artifact(&temp, "vless://stale@edge:443#old\n");

    let config = RuntimeConfig {
        file_path: temp.path().to_path_buf(),
        upload_url: Some(base),
        argo_domain: Some("edge.example.com".to_string()),
        argo_auth: Some("k".repeat(130)),
        ..Default::default()
    };
    let pipeline = Pipeline::new(Arc::new(config), Arc::new(identity::Fixed));

    pipeline.prepare().await;
    let domain = pipeline.publish_links().await.unwrap();
    assert_eq!(domain.hostname, "edge.example.com");

    let requests = captured.lock().unwrap();
    let paths: Vec<&str> = requests.iter().map(|(p, _)| p.as_str()).collect();
    assert_eq!(paths, vec!["/api/delete-nodes", "/api/add-nodes"]);
    assert_eq!(requests[0].1, json!({"nodes": ["vless://stale@edge:443#old"]}));

    let fresh = requests[1].1["nodes"].as_array().unwrap();
    assert_eq!(fresh.len(), 3);
    assert!(fresh[0].as_str().unwrap().contains("edge.example.com"));
}

#[tokio::test]
async fn test_unreachable_aggregator_is_not_fatal() {
    let temp = TempDir::new().unwrap();
    let config = RuntimeConfig {
        file_path: temp.path().to_path_buf(),
        upload_url: Some("http://127.0.0.1:9".to_string()),
        argo_domain: Some("edge.example.com".to_string()),
        argo_auth: Some("k".repeat(130)),
        ..Default::default()
    };
    let pipeline = Pipeline::new(Arc::new(config), Arc::new(identity::Fixed));

    pipeline.prepare().await;
    assert!(pipeline.publish_links().await.is_ok());
    assert!(temp.path().join("sub.txt").exists());
}
