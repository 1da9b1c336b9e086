//! Access to the Jenkins credential store.
//!
//! [`CredentialStore`] is the capability set the reconciler needs from the
//! remote system. Every call is scoped explicitly by a canonical folder path
//! (see [`crate::folder::normalize`]) and a credential domain.
//!
//! [`JenkinsClient`] implements the trait over the Jenkins credentials REST
//! endpoints:
//!
//! ```text
//! <server><folder>/credentials/store/<system|folder>/domain/<domain>/createCredentials
//! <server><folder>/credentials/store/<system|folder>/domain/<domain>/credential/<id>/config.xml
//! <server><folder>/credentials/store/<system|folder>/domain/<domain>/credential/<id>/doDelete
//! ```

use std::fmt;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, instrument};
use url::Url;

use crate::config::JenkinsConfig;

/// Errors returned by a [`CredentialStore`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server answered with a non-success status code.
    #[error("{url} returned HTTP {status}")]
    Status {
        /// The requested URL.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The request could not be sent or the response could not be read.
    #[error("request to {url} failed: {source}")]
    Http {
        /// The requested URL.
        url: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    /// The server URL cannot carry a path.
    #[error("invalid server URL: {0}")]
    InvalidUrl(String),

    /// The credential record could not be encoded.
    #[error("failed to encode credential document: {0}")]
    Encode(#[from] quick_xml::SeError),

    /// The credential document returned by the server could not be decoded.
    #[error("failed to decode credential document: {0}")]
    Decode(#[from] quick_xml::DeError),
}

impl ClientError {
    /// Whether the error means the addressed object does not exist.
    ///
    /// This is the only place the not-found convention of the remote API is
    /// interpreted.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }
}

/// A secret text credential as stored by the Jenkins plain-credentials plugin.
///
/// `secret` is omitted from the encoded document when `None`, which leaves
/// the stored secret untouched on update. Values read back from the server
/// carry an encrypted placeholder in `secret`, never the original text.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "org.jenkinsci.plugins.plaincredentials.impl.StringCredentialsImpl")]
pub struct StringCredentials {
    /// Credential identifier, unique within its domain.
    pub id: String,
    /// Visibility scope (`GLOBAL` or `SYSTEM`).
    #[serde(default)]
    pub scope: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// The secret text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

impl StringCredentials {
    /// Encode the record as the XML document Jenkins expects.
    pub fn to_xml(&self) -> Result<String, ClientError> {
        Ok(quick_xml::se::to_string(self)?)
    }

    /// Decode a record from a Jenkins `config.xml` document.
    pub fn from_xml(xml: &str) -> Result<Self, ClientError> {
        Ok(quick_xml::de::from_str(xml)?)
    }
}

impl fmt::Debug for StringCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StringCredentials")
            .field("id", &self.id)
            .field("scope", &self.scope)
            .field("description", &self.description)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Operations on a remote credential store.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Confirm that a folder exists. `folder` is in canonical form.
    async fn check_folder(&self, folder: &str) -> Result<(), ClientError>;

    /// Add a new credential to `domain` within `folder`.
    async fn add(
        &self,
        folder: &str,
        domain: &str,
        credentials: &StringCredentials,
    ) -> Result<(), ClientError>;

    /// Fetch a single credential by name.
    async fn get_single(
        &self,
        folder: &str,
        domain: &str,
        name: &str,
    ) -> Result<StringCredentials, ClientError>;

    /// Replace an existing credential.
    async fn update(
        &self,
        folder: &str,
        domain: &str,
        name: &str,
        credentials: &StringCredentials,
    ) -> Result<(), ClientError>;

    /// Delete a credential.
    async fn delete(&self, folder: &str, domain: &str, name: &str) -> Result<(), ClientError>;
}

#[derive(Debug, Clone, Deserialize)]
struct Crumb {
    crumb: String,
    #[serde(rename = "crumbRequestField")]
    request_field: String,
}

/// [`CredentialStore`] backed by the Jenkins REST API.
pub struct JenkinsClient {
    http: reqwest::Client,
    base_url: Url,
    username: Option<String>,
    password: Option<SecretString>,
    // Outer `None` until fetched; inner `None` when CSRF protection is off
    crumb: Mutex<Option<Option<Crumb>>>,
}

impl fmt::Debug for JenkinsClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JenkinsClient")
            .field("base_url", &self.base_url.as_str())
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl JenkinsClient {
    /// Build a client from resolved provider configuration.
    pub fn new(config: &JenkinsConfig) -> Result<Self, ClientError> {
        if config.server_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(config.server_url.to_string()));
        }

        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(config.timeout)
            .build()
            .map_err(ClientError::Build)?;

        Ok(Self {
            http,
            base_url: config.server_url.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            crumb: Mutex::new(None),
        })
    }

    fn url_for(&self, folder: &str, tail: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| ClientError::InvalidUrl(self.base_url.to_string()))?;
            segments.pop_if_empty();
            segments.extend(folder.split('/').filter(|s| !s.is_empty()));
            segments.extend(tail);
        }
        Ok(url)
    }

    /// URL of `tail` below the credential domain of `folder`.
    fn domain_url(&self, folder: &str, domain: &str, tail: &[&str]) -> Result<Url, ClientError> {
        let store = if folder.is_empty() { "system" } else { "folder" };
        let mut path = vec!["credentials", "store", store, "domain", domain];
        path.extend_from_slice(tail);
        self.url_for(folder, &path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.username {
            Some(username) => request.basic_auth(
                username,
                self.password.as_ref().map(|p| p.expose_secret()),
            ),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, url: &Url) -> Result<Response, ClientError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|source| ClientError::Http {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        debug!(url = %url, status = status.as_u16(), "Jenkins responded");
        if !status.is_success() {
            return Err(ClientError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    async fn crumb(&self) -> Result<Option<Crumb>, ClientError> {
        let mut cached = self.crumb.lock().await;
        if let Some(crumb) = cached.as_ref() {
            return Ok(crumb.clone());
        }
        let crumb = self.fetch_crumb().await?;
        *cached = Some(crumb.clone());
        Ok(crumb)
    }

    async fn forget_crumb(&self) {
        *self.crumb.lock().await = None;
    }

    async fn fetch_crumb(&self) -> Result<Option<Crumb>, ClientError> {
        let url = self.url_for("", &["crumbIssuer", "api", "json"])?;
        match self.send(self.http.get(url.clone()), &url).await {
            Ok(response) => {
                let crumb = response
                    .json::<Crumb>()
                    .await
                    .map_err(|source| ClientError::Http {
                        url: url.to_string(),
                        source,
                    })?;
                Ok(Some(crumb))
            },
            // CSRF protection disabled
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn post_request(&self, url: &Url, crumb: Option<&Crumb>, body: Option<&str>) -> RequestBuilder {
        let mut request = self.http.post(url.clone());
        if let Some(crumb) = crumb {
            request = request.header(crumb.request_field.as_str(), crumb.crumb.as_str());
        }
        if let Some(body) = body {
            request = request
                .header(CONTENT_TYPE, "application/xml")
                .body(body.to_owned());
        }
        request
    }

    /// POST with the CSRF crumb. A crumb expires with the session it was
    /// issued for, so a 403 refetches it and retries once.
    async fn post(&self, url: Url, body: Option<String>) -> Result<(), ClientError> {
        let crumb = self.crumb().await?;
        let request = self.post_request(&url, crumb.as_ref(), body.as_deref());
        match self.send(request, &url).await {
            Err(ClientError::Status { status: 403, .. }) if crumb.is_some() => {
                debug!(url = %url, "Crumb rejected, fetching a new one");
                self.forget_crumb().await;
                let crumb = self.crumb().await?;
                let request = self.post_request(&url, crumb.as_ref(), body.as_deref());
                self.send(request, &url).await?;
            },
            result => {
                result?;
            },
        }
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for JenkinsClient {
    #[instrument(skip(self), name = "jenkins.check_folder")]
    async fn check_folder(&self, folder: &str) -> Result<(), ClientError> {
        let url = self.url_for(folder, &["api", "json"])?;
        self.send(self.http.get(url.clone()), &url).await?;
        Ok(())
    }

    #[instrument(skip(self, credentials), fields(name = %credentials.id), name = "jenkins.add")]
    async fn add(
        &self,
        folder: &str,
        domain: &str,
        credentials: &StringCredentials,
    ) -> Result<(), ClientError> {
        let url = self.domain_url(folder, domain, &["createCredentials"])?;
        self.post(url, Some(credentials.to_xml()?)).await
    }

    #[instrument(skip(self), name = "jenkins.get_single")]
    async fn get_single(
        &self,
        folder: &str,
        domain: &str,
        name: &str,
    ) -> Result<StringCredentials, ClientError> {
        let url = self.domain_url(folder, domain, &["credential", name, "config.xml"])?;
        let response = self.send(self.http.get(url.clone()), &url).await?;
        let body = response.text().await.map_err(|source| ClientError::Http {
            url: url.to_string(),
            source,
        })?;
        StringCredentials::from_xml(&body)
    }

    #[instrument(skip(self, credentials), name = "jenkins.update")]
    async fn update(
        &self,
        folder: &str,
        domain: &str,
        name: &str,
        credentials: &StringCredentials,
    ) -> Result<(), ClientError> {
        let url = self.domain_url(folder, domain, &["credential", name, "config.xml"])?;
        self.post(url, Some(credentials.to_xml()?)).await
    }

    #[instrument(skip(self), name = "jenkins.delete")]
    async fn delete(&self, folder: &str, domain: &str, name: &str) -> Result<(), ClientError> {
        let url = self.domain_url(folder, domain, &["credential", name, "doDelete"])?;
        self.post(url, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn client(base: &str) -> JenkinsClient {
        JenkinsClient::new(&JenkinsConfig {
            server_url: Url::parse(base).unwrap(),
            username: None,
            password: None,
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[test]
    fn test_not_found_classification() {
        let not_found = ClientError::Status {
            url: "http://jenkins/x".to_string(),
            status: 404,
        };
        assert!(not_found.is_not_found());

        let forbidden = ClientError::Status {
            url: "http://jenkins/x".to_string(),
            status: 403,
        };
        assert!(!forbidden.is_not_found());
        assert!(!ClientError::InvalidUrl("x".into()).is_not_found());
    }

    #[test]
    fn test_root_domain_url() {
        let client = client("https://ci.example.com/");
        let url = client
            .domain_url("", "_", &["credential", "foo", "config.xml"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://ci.example.com/credentials/store/system/domain/_/credential/foo/config.xml"
        );
    }

    #[test]
    fn test_folder_domain_url() {
        let client = client("https://ci.example.com/jenkins");
        let url = client
            .domain_url("/job/teamA/job/teamB", "_", &["createCredentials"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://ci.example.com/jenkins/job/teamA/job/teamB/credentials/store/folder/domain/_/createCredentials"
        );
    }

    #[test]
    fn test_url_segments_are_escaped() {
        let client = client("https://ci.example.com/");
        let url = client
            .domain_url("", "my domain", &["credential", "a/b", "doDelete"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://ci.example.com/credentials/store/system/domain/my%20domain/credential/a%2Fb/doDelete"
        );
    }

    #[test]
    fn test_xml_encoding_omits_unset_secret() {
        let creds = StringCredentials {
            id: "deploy-token".to_string(),
            scope: "GLOBAL".to_string(),
            description: "Managed by Terraform".to_string(),
            secret: None,
        };
        let xml = creds.to_xml().unwrap();
        assert!(xml.starts_with(
            "<org.jenkinsci.plugins.plaincredentials.impl.StringCredentialsImpl>"
        ));
        assert!(xml.contains("<id>deploy-token</id>"));
        assert!(xml.contains("<scope>GLOBAL</scope>"));
        assert!(!xml.contains("<secret>"));

        let with_secret = StringCredentials {
            secret: Some("s3cr3t".to_string()),
            ..creds
        };
        assert!(with_secret.to_xml().unwrap().contains("<secret>s3cr3t</secret>"));
    }

    #[test]
    fn test_xml_decoding_of_jenkins_config() {
        let xml = r#"<?xml version='1.1' encoding='UTF-8'?>
<org.jenkinsci.plugins.plaincredentials.impl.StringCredentialsImpl plugin="plain-credentials@143.v1b_df8b_d3b_e48">
  <scope>SYSTEM</scope>
  <id>deploy-token</id>
  <description>CI deploy token</description>
  <secret>{AQAAABAAAAAQ}</secret>
</org.jenkinsci.plugins.plaincredentials.impl.StringCredentialsImpl>"#;

        let creds = StringCredentials::from_xml(xml).unwrap();
        assert_eq!(creds.id, "deploy-token");
        assert_eq!(creds.scope, "SYSTEM");
        assert_eq!(creds.description, "CI deploy token");
    }

    #[test]
    fn test_debug_redacts_secret() {
        let creds = StringCredentials {
            id: "x".to_string(),
            secret: Some("hunter2".to_string()),
            ..Default::default()
        };
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }

    mod http {
        use super::*;
        use serde_json::json;
        use wiremock::matchers::{body_string_contains, header, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        const DOMAIN_PATH: &str = "/credentials/store/system/domain/_";

        fn client_for(server: &MockServer) -> JenkinsClient {
            client(&server.uri())
        }

        async fn without_crumbs(server: &MockServer) {
            Mock::given(method("GET"))
                .and(path("/crumbIssuer/api/json"))
                .respond_with(ResponseTemplate::new(404))
                .mount(server)
                .await;
        }

        #[tokio::test]
        async fn test_get_single_parses_config() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path(format!("{}/credential/foo/config.xml", DOMAIN_PATH)))
                .respond_with(ResponseTemplate::new(200).set_body_string(
                    "<org.jenkinsci.plugins.plaincredentials.impl.StringCredentialsImpl>\
                     <scope>GLOBAL</scope><id>foo</id><description>ci</description>\
                     <secret>{AQAAABAAAAAQ}</secret>\
                     </org.jenkinsci.plugins.plaincredentials.impl.StringCredentialsImpl>",
                ))
                .expect(1)
                .mount(&server)
                .await;

            let creds = client_for(&server).get_single("", "_", "foo").await.unwrap();
            assert_eq!(creds.id, "foo");
            assert_eq!(creds.scope, "GLOBAL");
            assert_eq!(creds.description, "ci");
        }

        #[tokio::test]
        async fn test_missing_credential_is_not_found() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path(format!("{}/credential/gone/config.xml", DOMAIN_PATH)))
                .respond_with(ResponseTemplate::new(404))
                .mount(&server)
                .await;

            let err = client_for(&server)
                .get_single("", "_", "gone")
                .await
                .unwrap_err();
            assert!(err.is_not_found());
        }

        #[tokio::test]
        async fn test_add_sends_crumb_and_document() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/crumbIssuer/api/json"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "_class": "hudson.security.csrf.DefaultCrumbIssuer",
                    "crumb": "abc123",
                    "crumbRequestField": "Jenkins-Crumb",
                })))
                .expect(1)
                .mount(&server)
                .await;
            Mock::given(method("POST"))
                .and(path("/job/teamA/credentials/store/folder/domain/_/createCredentials"))
                .and(header("Jenkins-Crumb", "abc123"))
                .and(header("content-type", "application/xml"))
                .and(body_string_contains("<secret>bar</secret>"))
                .respond_with(ResponseTemplate::new(200))
                .expect(2)
                .mount(&server)
                .await;

            let client = client_for(&server);
            let creds = StringCredentials {
                id: "foo".to_string(),
                scope: "GLOBAL".to_string(),
                description: "Managed by Terraform".to_string(),
                secret: Some("bar".to_string()),
            };
            client.add("/job/teamA", "_", &creds).await.unwrap();
            // Crumb is fetched once and reused
            client.add("/job/teamA", "_", &creds).await.unwrap();
        }

        #[tokio::test]
        async fn test_rejected_crumb_is_refreshed_once() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/crumbIssuer/api/json"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "crumb": "old",
                    "crumbRequestField": "Jenkins-Crumb",
                })))
                .up_to_n_times(1)
                .mount(&server)
                .await;
            Mock::given(method("GET"))
                .and(path("/crumbIssuer/api/json"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "crumb": "new",
                    "crumbRequestField": "Jenkins-Crumb",
                })))
                .expect(1)
                .mount(&server)
                .await;
            Mock::given(method("POST"))
                .and(path(format!("{}/credential/foo/doDelete", DOMAIN_PATH)))
                .and(header("Jenkins-Crumb", "old"))
                .respond_with(ResponseTemplate::new(403))
                .expect(1)
                .mount(&server)
                .await;
            Mock::given(method("POST"))
                .and(path(format!("{}/credential/foo/doDelete", DOMAIN_PATH)))
                .and(header("Jenkins-Crumb", "new"))
                .respond_with(ResponseTemplate::new(200))
                .expect(2)
                .mount(&server)
                .await;

            let client = client_for(&server);
            client.delete("", "_", "foo").await.unwrap();
            // The refreshed crumb is kept
            client.delete("", "_", "foo").await.unwrap();
        }

        #[tokio::test]
        async fn test_forbidden_without_crumb_is_not_retried() {
            let server = MockServer::start().await;
            without_crumbs(&server).await;
            Mock::given(method("POST"))
                .and(path(format!("{}/credential/foo/doDelete", DOMAIN_PATH)))
                .respond_with(ResponseTemplate::new(403))
                .expect(1)
                .mount(&server)
                .await;

            let err = client_for(&server).delete("", "_", "foo").await.unwrap_err();
            assert!(matches!(err, ClientError::Status { status: 403, .. }));
        }

        #[tokio::test]
        async fn test_delete_without_crumb_issuer() {
            let server = MockServer::start().await;
            without_crumbs(&server).await;
            Mock::given(method("POST"))
                .and(path(format!("{}/credential/foo/doDelete", DOMAIN_PATH)))
                .respond_with(ResponseTemplate::new(302).insert_header("location", "/"))
                .mount(&server)
                .await;
            Mock::given(method("GET"))
                .and(path("/"))
                .respond_with(ResponseTemplate::new(200))
                .mount(&server)
                .await;

            client_for(&server).delete("", "_", "foo").await.unwrap();
        }

        #[tokio::test]
        async fn test_update_failure_reports_status() {
            let server = MockServer::start().await;
            without_crumbs(&server).await;
            Mock::given(method("POST"))
                .and(path(format!("{}/credential/foo/config.xml", DOMAIN_PATH)))
                .respond_with(ResponseTemplate::new(500))
                .mount(&server)
                .await;

            let err = client_for(&server)
                .update("", "_", "foo", &StringCredentials::default())
                .await
                .unwrap_err();
            assert!(matches!(err, ClientError::Status { status: 500, .. }));
            assert!(!err.is_not_found());
        }

        #[tokio::test]
        async fn test_check_folder_uses_basic_auth() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/job/teamA/api/json"))
                .and(header("authorization", "Basic dXNlcjpwYXNz"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "teamA"})))
                .expect(1)
                .mount(&server)
                .await;

            let client = JenkinsClient::new(&JenkinsConfig {
                server_url: Url::parse(&server.uri()).unwrap(),
                username: Some("user".to_string()),
                password: Some(SecretString::from("pass".to_string())),
                timeout: Duration::from_secs(5),
            })
            .unwrap();

            client.check_folder("/job/teamA").await.unwrap();
            assert!(client
                .check_folder("/job/missing")
                .await
                .unwrap_err()
                .is_not_found());
        }
    }
}
