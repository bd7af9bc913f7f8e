//! Marketplace client.
//!
//! Four operations, JSON over HTTPS; plain http is accepted only for
//! loopback hosts during development. Kept behind a trait so the install
//! pipeline can be driven by a mock.

use serde::Deserialize;
use skillport_core::config::CliConfig;
use skillport_core::error::SkillPortError;
use std::io::Read;

/// Cap on a downloaded archive; matches the extraction bomb budget.
const MAX_DOWNLOAD_BYTES: u64 = 500 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
pub struct SkillListing {
    pub id: String,
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub author_key_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadReceipt {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
}

pub trait Marketplace {
    fn search(&self, ssp_id: &str) -> Result<Option<SkillListing>, SkillPortError>;
    /// Time-limited download URL for a listed skill.
    fn download_url(&self, ssp_id: &str) -> Result<String, SkillPortError>;
    fn download(&self, url: &str) -> Result<Vec<u8>, SkillPortError>;
    fn register_key(&self, public_pem: &str, label: &str) -> Result<String, SkillPortError>;
    fn upload(&self, archive: &[u8]) -> Result<UploadReceipt, SkillPortError>;
}

pub struct HttpMarketplace {
    base_url: String,
    auth_token: Option<String>,
    agent: ureq::Agent,
}

fn is_loopback_url(url: &str) -> bool {
    let Some(rest) = url.strip_prefix("http://") else {
        return false;
    };
    let host = rest
        .split(|c| c == '/' || c == ':')
        .next()
        .unwrap_or_default();
    host == "localhost" || host == "127.0.0.1" || host == "[::1]"
}

impl HttpMarketplace {
    pub fn from_config(config: &CliConfig) -> Result<Self, SkillPortError> {
        let base_url = config.effective_api_url();
        if !base_url.starts_with("https://") && !is_loopback_url(&base_url) {
            return Err(SkillPortError::InputInvalid(format!(
                "marketplace URL must be https (or loopback http): {}",
                base_url
            )));
        }
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token: config.effective_auth_token(),
            agent: ureq::AgentBuilder::new().build(),
        })
    }

    fn request(&self, method: &str, path: &str) -> ureq::Request {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.agent.request(method, &url);
        if let Some(token) = &self.auth_token {
            req = req.set("Authorization", &format!("Bearer {}", token));
        }
        req
    }
}

fn map_http_error(context: &str, err: ureq::Error) -> SkillPortError {
    match err {
        ureq::Error::Status(401, _) => SkillPortError::AuthRequired(context.to_string()),
        ureq::Error::Status(403, _) => SkillPortError::Forbidden(context.to_string()),
        ureq::Error::Status(404, _) => SkillPortError::NotFound(context.to_string()),
        ureq::Error::Status(429, _) => SkillPortError::RateLimited(context.to_string()),
        ureq::Error::Status(code, _) => {
            SkillPortError::Network(format!("{}: HTTP {}", context, code))
        }
        ureq::Error::Transport(t) => SkillPortError::Network(format!("{}: {}", context, t)),
    }
}

impl Marketplace for HttpMarketplace {
    fn search(&self, ssp_id: &str) -> Result<Option<SkillListing>, SkillPortError> {
        let path = format!("/v1/skills/{}", ssp_id);
        match self.request("GET", &path).call() {
            Ok(resp) => {
                let listing: SkillListing = resp
                    .into_json()
                    .map_err(|e| SkillPortError::Network(format!("search response: {}", e)))?;
                Ok(Some(listing))
            }
            Err(ureq::Error::Status(404, _)) => Ok(None),
            Err(e) => Err(map_http_error("search", e)),
        }
    }

    fn download_url(&self, ssp_id: &str) -> Result<String, SkillPortError> {
        #[derive(Deserialize)]
        struct DownloadUrl {
            url: String,
        }
        let path = format!("/v1/skills/{}/download-url", ssp_id);
        let resp = self
            .request("POST", &path)
            .call()
            .map_err(|e| map_http_error("download-url", e))?;
        let body: DownloadUrl = resp
            .into_json()
            .map_err(|e| SkillPortError::Network(format!("download-url response: {}", e)))?;
        Ok(body.url)
    }

    fn download(&self, url: &str) -> Result<Vec<u8>, SkillPortError> {
        if !url.starts_with("https://") && !is_loopback_url(url) {
            return Err(SkillPortError::InputInvalid(format!(
                "refusing non-https download URL: {}",
                url
            )));
        }
        let resp = self
            .agent
            .get(url)
            .call()
            .map_err(|e| map_http_error("download", e))?;
        let mut bytes = Vec::new();
        resp.into_reader()
            .take(MAX_DOWNLOAD_BYTES)
            .read_to_end(&mut bytes)
            .map_err(|e| SkillPortError::Network(format!("download read: {}", e)))?;
        Ok(bytes)
    }

    fn register_key(&self, public_pem: &str, label: &str) -> Result<String, SkillPortError> {
        #[derive(Deserialize)]
        struct Registered {
            key_id: String,
        }
        let resp = self
            .request("POST", "/v1/keys")
            .send_json(serde_json::json!({ "public_key_pem": public_pem, "label": label }))
            .map_err(|e| map_http_error("register key", e))?;
        let body: Registered = resp
            .into_json()
            .map_err(|e| SkillPortError::Network(format!("register response: {}", e)))?;
        Ok(body.key_id)
    }

    fn upload(&self, archive: &[u8]) -> Result<UploadReceipt, SkillPortError> {
        let resp = self
            .request("POST", "/v1/skills")
            .set("Content-Type", "application/octet-stream")
            .send_bytes(archive)
            .map_err(|e| map_http_error("upload", e))?;
        resp.into_json()
            .map_err(|e| SkillPortError::Network(format!("upload response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loopback_detection() {
        assert!(is_loopback_url("http://localhost:8080"));
        assert!(is_loopback_url("http://127.0.0.1/api"));
        assert!(!is_loopback_url("http://evil.example"));
        assert!(!is_loopback_url("https://api.skillport.dev"));
    }

    #[test]
    fn test_plain_http_rejected_for_remote_hosts() {
        std::env::set_var(skillport_core::paths::ENV_API_URL, "http://remote.example");
        let result = HttpMarketplace::from_config(&CliConfig::default());
        std::env::remove_var(skillport_core::paths::ENV_API_URL);
        assert!(matches!(result, Err(SkillPortError::InputInvalid(_))));
    }
}
