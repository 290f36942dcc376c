//! Pull-mode monitoring agent document

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfigDocument {
    pub client_secret: String,
    pub debug: bool,
    pub disable_auto_update: bool,
    pub disable_command_execute: bool,
    pub disable_force_update: bool,
    pub disable_nat: bool,
    pub disable_send_query: bool,
    pub gpu: bool,
    pub insecure_tls: bool,
    pub ip_report_period: u32,
    pub report_delay: u32,
    pub server: String,
    pub skip_connection_count: bool,
    pub skip_procs_count: bool,
    pub temperature: bool,
    pub tls: bool,
    pub use_gitee_to_upgrade: bool,
    pub use_ipv6_country_code: bool,
    pub uuid: String,
}

impl AgentConfigDocument {
    pub fn new(key: &str, server: &str, uuid: &str) -> Self {
        Self {
            client_secret: key.to_string(),
            debug: false,
            disable_auto_update: true,
            disable_command_execute: false,
            disable_force_update: true,
            disable_nat: false,
            disable_send_query: false,
            gpu: false,
            insecure_tls: false,
            ip_report_period: 1800,
            report_delay: 1,
            server: server.to_string(),
            skip_connection_count: false,
            skip_procs_count: false,
            temperature: false,
            tls: false,
            use_gitee_to_upgrade: false,
            use_ipv6_country_code: false,
            uuid: uuid.to_string(),
        }
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_yaml() {
        let yaml = AgentConfigDocument::new("secret", "nz.example.com:8008", "uuid-1")
            .to_yaml()
            .unwrap();
        assert!(yaml.contains("client_secret: secret"));
        assert!(yaml.contains("server: nz.example.com:8008"));
        assert!(yaml.contains("disable_auto_update: true"));
        assert!(yaml.contains("ip_report_period: 1800"));
        assert!(yaml.contains("uuid: uuid-1"));
    }
}
