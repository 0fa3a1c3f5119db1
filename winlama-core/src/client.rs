use std::{fmt::Display, str::FromStr, time::Duration};

use futures::{Stream, StreamExt as _};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use url::Url;

use crate::{
    decoder::NdjsonDecoder,
    error::{Error, Result},
    event::StreamEvent,
    model::{ConversationContext, ModelName},
};

pub const DEFAULT_HOST: &str = "http://localhost:11434";

const TAGS_PATH: &str = "api/tags";
const GENERATE_PATH: &str = "api/generate";

/// Listing is a local health check and should fail fast.
pub const LIST_TIMEOUT: Duration = Duration::from_secs(10);
/// Generation can take minutes on large models.
/// For streamed generations this bounds the wait for each chunk, not the whole response.
pub const GENERATE_TIMEOUT: Duration = Duration::from_secs(300);

/// Base address of the Ollama server.
///
/// The address is validated when a request is built,
/// so a bad address fails the call and not the constructor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelHost(String);

impl ModelHost {
    pub fn new(address: impl Into<String>) -> Self {
        ModelHost(address.into())
    }

    /// Join `path` onto the base address.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        let address = self.0.trim();
        let has_scheme = ["http://", "https://"].iter().any(|scheme| {
            address
                .get(..scheme.len())
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
        });
        if !has_scheme {
            return Err(Error::MissingScheme {
                address: self.0.clone(),
            });
        }

        let joined = format!("{}/{path}", address.trim_end_matches('/'));
        joined.parse().map_err(|source| Error::InvalidAddress {
            address: self.0.clone(),
            source,
        })
    }
}

impl Default for ModelHost {
    fn default() -> Self {
        ModelHost(DEFAULT_HOST.into())
    }
}

impl FromStr for ModelHost {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(ModelHost(s.into()))
    }
}

impl Display for ModelHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<LocalModel>,
}

#[derive(Debug, Deserialize)]
struct LocalModel {
    name: ModelName,
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    model: ModelName,
    prompt: String,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<ConversationContext>,
}

impl GenerateRequest {
    fn new(
        model: ModelName,
        prompt: String,
        context: Option<ConversationContext>,
        stream: bool,
    ) -> Self {
        Self {
            model,
            prompt,
            stream,
            context: context.filter(|context| !context.is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    context: Option<ConversationContext>,
}

/// Result of a non-streaming generation.
#[derive(Clone, Debug, PartialEq)]
pub struct Generation {
    pub response: String,
    pub context: Option<ConversationContext>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// HTTP client for the parts of the Ollama API the chat needs.
#[derive(Clone, Debug)]
pub struct Client {
    host: ModelHost,
    http: reqwest::Client,
    list_timeout: Duration,
    generate_timeout: Duration,
}

impl Client {
    pub fn new(host: ModelHost) -> Self {
        Self {
            host,
            http: reqwest::Client::new(),
            list_timeout: LIST_TIMEOUT,
            generate_timeout: GENERATE_TIMEOUT,
        }
    }

    pub fn with_list_timeout(mut self, timeout: Duration) -> Self {
        self.list_timeout = timeout;
        self
    }

    pub fn with_generate_timeout(mut self, timeout: Duration) -> Self {
        self.generate_timeout = timeout;
        self
    }

    pub fn host(&self) -> &ModelHost {
        &self.host
    }

    /// Names of the models installed on the server, in the order the server lists them.
    #[instrument(skip(self), fields(host = %self.host))]
    pub async fn list_models(&self) -> Result<Vec<ModelName>> {
        let url = self.host.endpoint(TAGS_PATH)?;
        tracing::debug!(%url, "fetching models");

        let response = self
            .http
            .get(url.clone())
            .timeout(self.list_timeout)
            .send()
            .await
            .map_err(|source| Error::from_reqwest(&url, self.list_timeout, source))
            .inspect_err(|error| tracing::error!(%error, "unable to list models"))?;

        let tags: TagsResponse = read_json(response, &url, self.list_timeout)
            .await
            .inspect_err(|error| tracing::error!(%error, "unable to list models"))?;

        let names: Vec<ModelName> = tags.models.into_iter().map(|model| model.name).collect();
        tracing::debug!(count = names.len(), "fetched models");
        Ok(names)
    }

    /// Generate a complete response in one request.
    #[instrument(skip(self, prompt, context), fields(host = %self.host))]
    pub async fn generate(
        &self,
        model: ModelName,
        prompt: impl Into<String>,
        context: Option<ConversationContext>,
    ) -> Result<Generation> {
        let url = self.host.endpoint(GENERATE_PATH)?;
        let request = GenerateRequest::new(model, prompt.into(), context, false);
        tracing::debug!(%url, "sending generate request");

        let response = self
            .http
            .post(url.clone())
            .json(&request)
            .timeout(self.generate_timeout)
            .send()
            .await
            .map_err(|source| Error::from_reqwest(&url, self.generate_timeout, source))
            .inspect_err(|error| tracing::error!(%error, "generate request failed"))?;

        let GenerateResponse { response, context } =
            read_json(response, &url, self.generate_timeout)
                .await
                .inspect_err(|error| tracing::error!(%error, "generate request failed"))?;

        Ok(Generation { response, context })
    }

    /// Stream a response token by token.
    ///
    /// The generate timeout applies to the response headers and to every gap
    /// between body chunks, so a long answer that keeps flowing is never cut off.
    /// The returned stream holds the HTTP connection until it ends or is dropped.
    /// Failures are delivered as a single [`StreamEvent::Error`],
    /// and the stream always finishes with exactly one terminal event.
    pub fn generate_stream(
        &self,
        model: ModelName,
        prompt: impl Into<String>,
        context: Option<ConversationContext>,
    ) -> impl Stream<Item = StreamEvent> + Send + 'static {
        let http = self.http.clone();
        let timeout = self.generate_timeout;
        let endpoint = self.host.endpoint(GENERATE_PATH);
        let request = GenerateRequest::new(model, prompt.into(), context, true);

        async_stream::stream! {
            let url = match endpoint {
                Ok(url) => url,
                Err(error) => {
                    tracing::error!(%error, "invalid generate endpoint");
                    yield StreamEvent::from(error);
                    return;
                }
            };

            tracing::debug!(%url, model = %request.model, "opening generation stream");
            let sent = tokio::time::timeout(timeout, http.post(url.clone()).json(&request).send()).await;
            let response = match sent {
                Ok(Ok(response)) => response,
                Ok(Err(source)) => {
                    let error = Error::from_reqwest(&url, timeout, source);
                    tracing::error!(%error, "unable to open generation stream");
                    yield StreamEvent::from(error);
                    return;
                }
                Err(_elapsed) => {
                    let error = Error::Timeout { url: url.clone(), timeout };
                    tracing::error!(%error, "no response to generate request");
                    yield StreamEvent::from(error);
                    return;
                }
            };

            let response = match check_status(response).await {
                Ok(response) => response,
                Err(error) => {
                    tracing::error!(%error, "generation request rejected");
                    yield StreamEvent::from(error);
                    return;
                }
            };

            let mut decoder = NdjsonDecoder::new();
            let mut body = response.bytes_stream();
            loop {
                let chunk = match tokio::time::timeout(timeout, body.next()).await {
                    Ok(Some(chunk)) => chunk,
                    Ok(None) => break,
                    Err(_elapsed) => {
                        let error = Error::Timeout { url: url.clone(), timeout };
                        tracing::error!(%error, "generation stream stalled");
                        yield StreamEvent::from(error);
                        return;
                    }
                };
                match chunk {
                    Ok(bytes) => {
                        for event in decoder.decode(&bytes) {
                            yield event;
                        }
                        if decoder.is_finished() {
                            return;
                        }
                    }
                    Err(source) => {
                        let error = Error::from_reqwest(&url, timeout, source);
                        tracing::error!(%error, "generation stream interrupted");
                        yield StreamEvent::from(error);
                        return;
                    }
                }
            }

            for event in decoder.finish() {
                yield event;
            }
            if !decoder.is_finished() {
                tracing::warn!(%url, "generation stream closed without a final message");
                yield StreamEvent::Error {
                    message: "connection closed before the response completed".into(),
                };
            }
        }
    }
}

impl Default for Client {
    fn default() -> Self {
        Client::new(ModelHost::default())
    }
}

/// Turn a non-2xx response into [`Error::Protocol`],
/// attaching the server's `error` message when the body carries one.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorBody>(&body)
        .map(|body| body.error)
        .ok()
        .or_else(|| Some(body.trim().to_string()).filter(|text| !text.is_empty()));

    Err(Error::Protocol { status, detail })
}

async fn read_json<T>(response: reqwest::Response, url: &Url, timeout: Duration) -> Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let response = check_status(response).await?;
    let bytes = response
        .bytes()
        .await
        .map_err(|source| Error::from_reqwest(url, timeout, source))?;

    serde_json::from_slice(&bytes).map_err(|source| Error::Decode {
        url: url.clone(),
        source,
    })
}
