use edgeup_proto::RuntimeConfig;
use serde::Serialize;
use tracing::{error, info};

#[derive(Serialize)]
struct KeepaliveBody<'a> {
    url: &'a str,
}

/// Register the project URL with the keep-alive service
///
/// Returns whether a registration was accepted. Skipped unless auto access
/// is enabled and a project URL is configured.
pub async fn register_keepalive(config: &RuntimeConfig, http: &reqwest::Client) -> bool {
    let project_url = match (config.auto_access, config.project_url.as_deref()) {
        (true, Some(url)) => url,
        _ => {
            info!("Skipping adding automatic access task");
            return false;
        }
    };

    let result = http
        .post(&config.keepalive_url)
        .json(&KeepaliveBody { url: project_url })
        .send()
        .await
        .and_then(|resp| resp.error_for_status());

    match result {
        Ok(_) => {
            info!("Automatic access task added successfully");
            true
        }
        Err(e) => {
            error!("Failed to add automatic access task: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_skipped_without_auto_access() {
        let config = RuntimeConfig {
            project_url: Some("https://app.example.com".to_string()),
            keepalive_url: "http://127.0.0.1:9/add-url".to_string(),
            ..Default::default()
        };
        assert!(!register_keepalive(&config, &reqwest::Client::new()).await);
    }

    #[tokio::test]
    async fn test_skipped_without_project_url() {
        let config = RuntimeConfig {
            auto_access: true,
            keepalive_url: "http://127.0.0.1:9/add-url".to_string(),
            ..Default::default()
        };
        assert!(!register_keepalive(&config, &reqwest::Client::new()).await);
    }
}
