//! Node Client
//!
//! HTTP client implementing the storage network's node API. Each logical
//! operation is exactly one request/response round trip; the client keeps
//! no per-call state, so one instance may be shared freely across tasks.
//!
//! Response policy: the full body is read before the status code is
//! inspected. On a non-success status the body is decoded as the node's
//! `{code, message}` error envelope, falling back to the raw body text
//! verbatim when it does not decode. No operation is retried internally.

use crate::tar::TarStream;
use bytes::Bytes;
use futures::Stream;
use parking_lot::RwLock;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::time::Duration;
use swarmstore_core::{Address, Chunk, RedundancyLevel, Result, SwarmstoreError, TagStatus};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Idle connections kept per host in the shared pool
const MAX_IDLE_CONNECTIONS_PER_HOST: usize = 20;
/// Total timeout applied to every request
const REQUEST_TIMEOUT_SECS: u64 = 6000;

// Path segments of the node API. Exported: they are part of the wire
// contract with the node API version this client targets.
pub const HEALTH_PATH: &str = "/health";
pub const CHUNKS_PATH: &str = "/chunks";
pub const BYTES_PATH: &str = "/bytes";
pub const BZZ_PATH: &str = "/bzz";
pub const TAGS_PATH: &str = "/tags";
pub const PINS_PATH: &str = "/pins";
pub const FEEDS_PATH: &str = "/feeds";
pub const SOC_PATH: &str = "/soc";

// Header names of the node API.
pub const SWARM_PIN_HEADER: &str = "Swarm-Pin";
pub const SWARM_ENCRYPT_HEADER: &str = "Swarm-Encrypt";
pub const SWARM_POSTAGE_BATCH_HEADER: &str = "Swarm-Postage-Batch-Id";
pub const SWARM_DEFERRED_UPLOAD_HEADER: &str = "Swarm-Deferred-Upload";
pub const SWARM_REDUNDANCY_LEVEL_HEADER: &str = "Swarm-Redundancy-Level";
pub const SWARM_TAG_HEADER: &str = "Swarm-Tag";
pub const SWARM_COLLECTION_HEADER: &str = "Swarm-Collection";
pub const SWARM_FEED_INDEX_HEADER: &str = "swarm-feed-index";
pub const SWARM_FEED_INDEX_NEXT_HEADER: &str = "swarm-feed-index-next";

const OCTET_STREAM: &str = "application/octet-stream";
const TAR_CONTENT_TYPE: &str = "application/x-tar";

/// Greeting a full node serves at its root path
const BEE_GREETING: &str = "Ethereum Swarm Bee\n";
/// Health body served by a gateway-proxy
const PROXY_HEALTH_OK: &str = "OK";

/// Kind of endpoint behind the configured base URL, decided once by
/// [`BeeClient::check_connection`] and stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeMode {
    /// Full node: every operation is available
    Bee,
    /// Restricted gateway-proxy: the tag API is not exposed, so tag
    /// operations short-circuit to neutral zero results instead of failing
    GatewayProxy,
}

/// Streamed download body
pub type ByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

#[derive(Debug, Deserialize)]
struct ReferenceResponse {
    reference: Address,
}

#[derive(Debug, Serialize)]
struct TagPostRequest<'a> {
    address: &'a str,
}

/// Node error envelope on non-success responses
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    #[allow(dead_code)]
    code: i64,
    message: String,
}

/// HTTP client for one storage-network node
///
/// Holds the shared connection pool and the client-wide upload defaults
/// (postage batch, redundancy level, pin). Per-call values override the
/// defaults; an empty per-call stamp or redundancy selects the default,
/// and a construction-time `pin` of `true` is sticky — it upgrades a
/// per-call `false` but a per-call `true` is never downgraded.
pub struct BeeClient {
    http: Client,
    base_url: String,
    mode: RwLock<NodeMode>,
    stamp: String,
    redundancy: String,
    pin: bool,
}

impl BeeClient {
    /// Create a client for the node at `base_url`
    pub fn new(base_url: &str) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .pool_max_idle_per_host(MAX_IDLE_CONNECTIONS_PER_HOST)
            .build()
            .expect("failed to create HTTP client");

        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            mode: RwLock::new(NodeMode::Bee),
            stamp: String::new(),
            redundancy: String::new(),
            pin: false,
        }
    }

    /// Set the default postage batch used when a call passes an empty stamp
    pub fn with_stamp(mut self, stamp: impl Into<String>) -> Self {
        self.stamp = stamp.into();
        self
    }

    /// Set the default redundancy level used when a call passes an empty level
    pub fn with_redundancy(mut self, level: RedundancyLevel) -> Self {
        self.redundancy = level.as_str().to_string();
        self
    }

    /// Set the sticky pin default applied to every upload
    pub fn with_pinning(mut self, pin: bool) -> Self {
        self.pin = pin;
        self
    }

    /// The node mode decided by the last [`check_connection`](Self::check_connection)
    pub fn node_mode(&self) -> NodeMode {
        *self.mode.read()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn resolve_stamp<'a>(&'a self, stamp: &'a str) -> &'a str {
        if stamp.is_empty() {
            &self.stamp
        } else {
            stamp
        }
    }

    fn resolve_redundancy<'a>(&'a self, level: &'a str) -> &'a str {
        if level.is_empty() {
            &self.redundancy
        } else {
            level
        }
    }

    // Sticky true: the construction-time default upgrades a per-call
    // `false` but never suppresses a per-call `true`.
    fn resolve_pin(&self, pin: bool) -> bool {
        self.pin || pin
    }

    fn api_error(status: StatusCode, body: &[u8]) -> SwarmstoreError {
        let message = match serde_json::from_slice::<ApiErrorBody>(body) {
            Ok(envelope) => envelope.message,
            Err(_) => String::from_utf8_lossy(body).into_owned(),
        };
        warn!(status = status.as_u16(), message = %message, "node rejected request");
        SwarmstoreError::Api {
            status: status.as_u16(),
            message,
        }
    }

    fn decode_reference(body: &[u8]) -> Result<Address> {
        let resp: ReferenceResponse = serde_json::from_slice(body)
            .map_err(|_| SwarmstoreError::Decode("error decoding reference response".to_string()))?;
        Ok(resp.reference)
    }

    /// Probe the endpoint and classify it as a full node or a gateway-proxy.
    ///
    /// The decided [`NodeMode`] is stored and consulted by the tag
    /// operations; it is not re-probed per call. Returns `false` when the
    /// endpoint is neither a full node nor a healthy proxy.
    pub async fn check_connection(&self) -> bool {
        // A full node greets on its root path.
        if let Ok(body) = self.probe(false).await {
            if body == BEE_GREETING {
                *self.mode.write() = NodeMode::Bee;
                return true;
            }
        }

        // Otherwise the endpoint may be a gateway-proxy with a health path.
        match self.probe(true).await {
            Ok(body) => {
                let is_proxy = body == PROXY_HEALTH_OK;
                *self.mode.write() = if is_proxy {
                    NodeMode::GatewayProxy
                } else {
                    NodeMode::Bee
                };
                debug!(is_proxy, "endpoint classified");
                is_proxy
            }
            Err(_) => false,
        }
    }

    async fn probe(&self, health: bool) -> Result<String> {
        let url = if health {
            self.url(HEALTH_PATH)
        } else {
            self.base_url.clone()
        };
        let response = self.http.get(&url).send().await?;
        Ok(response.text().await?)
    }

    /// Upload a single owner chunk, the payload vehicle for feed updates.
    ///
    /// The chunk's address derives from `(owner, id)` rather than its
    /// content hash. Requires a signature and a non-empty resolved stamp;
    /// both are checked before any network call.
    pub async fn upload_soc(
        &self,
        owner: &str,
        id: &str,
        signature: &str,
        stamp: &str,
        redundancy: &str,
        pin: bool,
        data: Bytes,
    ) -> Result<Address> {
        let stamp = self.resolve_stamp(stamp);
        if stamp.is_empty() {
            return Err(SwarmstoreError::MissingPostageBatch);
        }
        if signature.is_empty() {
            return Err(SwarmstoreError::MissingSignature);
        }

        let url = format!("{}{}/{}/{}?sig={}", self.base_url, SOC_PATH, owner, id, signature);
        let mut request = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, OCTET_STREAM)
            .header(SWARM_POSTAGE_BATCH_HEADER, stamp)
            .header(SWARM_DEFERRED_UPLOAD_HEADER, "true")
            .header(SWARM_REDUNDANCY_LEVEL_HEADER, self.resolve_redundancy(redundancy))
            .body(data);
        if self.resolve_pin(pin) {
            request = request.header(SWARM_PIN_HEADER, "true");
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        if status != StatusCode::CREATED {
            return Err(Self::api_error(status, &body));
        }

        let address = Self::decode_reference(&body)?;
        debug!(address = %address, owner, "uploaded single owner chunk");
        Ok(address)
    }

    /// Upload a content-addressed chunk under an existing tag.
    ///
    /// The requested redundancy level is forwarded to the network as an
    /// instruction to its redundancy policy; the chunk body itself is sent
    /// as-is — the client never erasure-codes locally.
    pub async fn upload_chunk(
        &self,
        tag: u32,
        chunk: &Chunk,
        stamp: &str,
        redundancy: &str,
        pin: bool,
    ) -> Result<Address> {
        let mut request = self
            .http
            .post(self.url(CHUNKS_PATH))
            .header(CONTENT_TYPE, OCTET_STREAM)
            .header(SWARM_POSTAGE_BATCH_HEADER, self.resolve_stamp(stamp))
            .header(SWARM_DEFERRED_UPLOAD_HEADER, "true")
            .header(SWARM_REDUNDANCY_LEVEL_HEADER, self.resolve_redundancy(redundancy))
            .header(SWARM_TAG_HEADER, tag.to_string())
            .body(chunk.data().clone());
        if self.resolve_pin(pin) {
            request = request.header(SWARM_PIN_HEADER, "true");
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        if status != StatusCode::CREATED {
            return Err(Self::api_error(status, &body));
        }

        let address = Self::decode_reference(&body)?;
        debug!(address = %address, tag, size = chunk.size(), "uploaded chunk");
        Ok(address)
    }

    /// Download the chunk at `address`.
    ///
    /// The only cancellable operation: cancelling the token aborts the
    /// in-flight request and surfaces [`SwarmstoreError::Cancelled`].
    pub async fn download_chunk(
        &self,
        cancel: &CancellationToken,
        address: &Address,
    ) -> Result<Chunk> {
        let url = format!("{}{}/{}", self.base_url, CHUNKS_PATH, address);
        let fetch = async {
            let response = self.http.get(&url).send().await?;
            let status = response.status();
            let body = response.bytes().await?;
            if status != StatusCode::OK {
                return Err(Self::api_error(status, &body));
            }
            Ok(body)
        };

        tokio::select! {
            _ = cancel.cancelled() => Err(SwarmstoreError::Cancelled),
            body = fetch => Ok(Chunk::new(address.clone(), body?)),
        }
    }

    /// Upload an arbitrary-size blob.
    ///
    /// `encrypt` instructs the network to store an encrypted variant; this
    /// client has no decryption responsibility. The tag header is attached
    /// only for a nonzero tag UID.
    pub async fn upload_blob(
        &self,
        tag: u32,
        stamp: &str,
        redundancy: &str,
        pin: bool,
        encrypt: bool,
        data: impl Into<reqwest::Body>,
    ) -> Result<Address> {
        let pin = self.resolve_pin(pin);
        let mut request = self
            .http
            .post(self.url(BYTES_PATH))
            .header(SWARM_PIN_HEADER, if pin { "true" } else { "false" })
            .header(SWARM_ENCRYPT_HEADER, if encrypt { "true" } else { "false" })
            .header(CONTENT_TYPE, OCTET_STREAM)
            .header(SWARM_REDUNDANCY_LEVEL_HEADER, self.resolve_redundancy(redundancy))
            .header(SWARM_POSTAGE_BATCH_HEADER, self.resolve_stamp(stamp))
            .header(SWARM_DEFERRED_UPLOAD_HEADER, "true")
            .body(data.into());
        if tag > 0 {
            request = request.header(SWARM_TAG_HEADER, tag.to_string());
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        if status != StatusCode::OK && status != StatusCode::CREATED {
            return Err(Self::api_error(status, &body));
        }

        let address = Self::decode_reference(&body)?;
        debug!(address = %address, tag, "uploaded blob");
        Ok(address)
    }

    /// Download a blob as a byte stream, with the response status code
    pub async fn download_blob(&self, address: &Address) -> Result<(ByteStream, u16)> {
        let url = format!("{}{}/{}", self.base_url, BYTES_PATH, address);
        let response = self.http.get(&url).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            let body = response.bytes().await?;
            return Err(Self::api_error(status, &body));
        }
        Ok((Box::pin(response.bytes_stream()), status.as_u16()))
    }

    /// Upload a single file as a one-entry collection
    pub async fn upload_file_bzz(
        &self,
        data: Bytes,
        file_name: &str,
        stamp: &str,
        redundancy: &str,
        pin: bool,
    ) -> Result<Address> {
        let pin = self.resolve_pin(pin);
        let request = self
            .http
            .post(self.url(BZZ_PATH))
            .query(&[("name", file_name)])
            .header(SWARM_PIN_HEADER, if pin { "true" } else { "false" })
            .header(SWARM_POSTAGE_BATCH_HEADER, self.resolve_stamp(stamp))
            .header(CONTENT_TYPE, OCTET_STREAM)
            .header(SWARM_REDUNDANCY_LEVEL_HEADER, self.resolve_redundancy(redundancy))
            .body(data);

        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        if status != StatusCode::OK && status != StatusCode::CREATED {
            return Err(Self::api_error(status, &body));
        }

        let address = Self::decode_reference(&body)?;
        debug!(address = %address, file_name, "uploaded file");
        Ok(address)
    }

    /// Upload a finalized archive stream as a multi-file collection
    pub async fn upload_archive(
        &self,
        archive: TarStream,
        stamp: &str,
        redundancy: &str,
        pin: bool,
    ) -> Result<Address> {
        let body = archive.into_bytes()?;
        let pin = self.resolve_pin(pin);
        let request = self
            .http
            .post(self.url(BZZ_PATH))
            .header(SWARM_PIN_HEADER, if pin { "true" } else { "false" })
            .header(SWARM_POSTAGE_BATCH_HEADER, self.resolve_stamp(stamp))
            .header(CONTENT_TYPE, TAR_CONTENT_TYPE)
            .header(SWARM_COLLECTION_HEADER, "true")
            .header(SWARM_REDUNDANCY_LEVEL_HEADER, self.resolve_redundancy(redundancy))
            .body(body);

        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        if status != StatusCode::OK && status != StatusCode::CREATED {
            return Err(Self::api_error(status, &body));
        }

        let address = Self::decode_reference(&body)?;
        debug!(address = %address, "uploaded collection");
        Ok(address)
    }

    /// Download a whole collection, with the response status code
    pub async fn download_bzz(&self, address: &Address) -> Result<(Bytes, u16)> {
        let url = format!("{}{}/{}", self.base_url, BZZ_PATH, address);
        let response = self.http.get(&url).send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        if status != StatusCode::OK {
            return Err(Self::api_error(status, &body));
        }
        Ok((body, status.as_u16()))
    }

    /// Download one named member of a collection.
    ///
    /// Returns the body stream and the server-reported content length so
    /// callers can size downstream buffers; a missing or unparseable
    /// `Content-Length` is a decode failure.
    pub async fn download_file_bzz(
        &self,
        address: &Address,
        file_name: &str,
    ) -> Result<(ByteStream, u64)> {
        let url = format!("{}{}/{}/{}", self.base_url, BZZ_PATH, address, file_name);
        let response = self.http.get(&url).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            let body = response.bytes().await?;
            return Err(Self::api_error(status, &body));
        }

        let content_length = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .ok_or_else(|| {
                SwarmstoreError::Decode("missing or invalid Content-Length".to_string())
            })?;

        Ok((Box::pin(response.bytes_stream()), content_length))
    }

    /// Unpin a reference so the network may garbage-collect it.
    ///
    /// "Not found" counts as success: unpinning an address with no pin is
    /// idempotent, not an error.
    pub async fn unpin(&self, address: &Address) -> Result<()> {
        let url = format!("{}{}/{}", self.base_url, PINS_PATH, address);
        let response = self.http.delete(&url).send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        if status != StatusCode::OK && status != StatusCode::NOT_FOUND {
            return Err(Self::api_error(status, &body));
        }
        debug!(address = %address, "unpinned reference");
        Ok(())
    }

    /// Allocate a new upload tag, optionally seeded with a target address.
    ///
    /// Against a gateway-proxy this returns UID 0 without a network call.
    pub async fn create_tag(&self, address: &Address) -> Result<u32> {
        if self.node_mode() == NodeMode::GatewayProxy {
            return Ok(0);
        }

        let mut request = self.http.post(self.url(TAGS_PATH));
        if address.is_valid_reference() {
            let hex = address.to_hex();
            request = request.json(&TagPostRequest { address: &hex });
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        if status != StatusCode::OK && status != StatusCode::CREATED {
            return Err(Self::api_error(status, &body));
        }

        let tag: TagStatus = serde_json::from_slice(&body)
            .map_err(|_| SwarmstoreError::Decode("error decoding tag response".to_string()))?;
        debug!(uid = tag.uid, "created tag");
        Ok(tag.uid)
    }

    /// Poll the sync counters of a tag.
    ///
    /// Against a gateway-proxy this returns zeroed counters without a
    /// network call.
    pub async fn get_tag(&self, tag: u32) -> Result<TagStatus> {
        if self.node_mode() == NodeMode::GatewayProxy {
            return Ok(TagStatus::default());
        }

        let url = format!("{}{}/{}", self.base_url, TAGS_PATH, tag);
        let response = self.http.get(&url).send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        if status != StatusCode::OK && status != StatusCode::CREATED {
            return Err(Self::api_error(status, &body));
        }

        serde_json::from_slice(&body)
            .map_err(|_| SwarmstoreError::Decode("error decoding tag response".to_string()))
    }

    /// Publish the mutable-pointer record for `(owner, topic)`
    pub async fn create_feed_manifest(
        &self,
        owner: &str,
        topic: &str,
        stamp: &str,
        pin: bool,
    ) -> Result<Address> {
        let url = format!("{}{}/{}/{}", self.base_url, FEEDS_PATH, owner, topic);
        let mut request = self
            .http
            .post(&url)
            .header(SWARM_POSTAGE_BATCH_HEADER, self.resolve_stamp(stamp));
        if self.resolve_pin(pin) {
            request = request.header(SWARM_PIN_HEADER, "true");
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        if status != StatusCode::OK && status != StatusCode::CREATED {
            return Err(Self::api_error(status, &body));
        }

        let address = Self::decode_reference(&body)?;
        debug!(address = %address, owner, topic, "created feed manifest");
        Ok(address)
    }

    /// Resolve the latest chunk published in a feed.
    ///
    /// Returns the referenced address, the feed's current index and the
    /// next index to publish to. Both indices are opaque strings whose only
    /// contract is monotonic advancement recognized by the node.
    pub async fn get_latest_feed_manifest(
        &self,
        owner: &str,
        topic: &str,
    ) -> Result<(Address, String, String)> {
        let url = format!("{}{}/{}/{}", self.base_url, FEEDS_PATH, owner, topic);
        let response = self.http.get(&url).send().await?;
        let status = response.status();

        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string()
        };
        let index = header(SWARM_FEED_INDEX_HEADER);
        let next_index = header(SWARM_FEED_INDEX_NEXT_HEADER);

        let body = response.bytes().await?;
        if status != StatusCode::OK && status != StatusCode::CREATED {
            return Err(Self::api_error(status, &body));
        }

        let address = Self::decode_reference(&body)?;
        Ok((address, index, next_index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_merge_rules() {
        let client = BeeClient::new("http://localhost:1633")
            .with_stamp("default-batch")
            .with_redundancy(RedundancyLevel::Medium);

        assert_eq!(client.resolve_stamp(""), "default-batch");
        assert_eq!(client.resolve_stamp("call-batch"), "call-batch");
        assert_eq!(client.resolve_redundancy(""), "1");
        assert_eq!(client.resolve_redundancy("4"), "4");
    }

    #[test]
    fn test_pin_is_sticky_true() {
        let pinned = BeeClient::new("http://localhost:1633").with_pinning(true);
        assert!(pinned.resolve_pin(false));
        assert!(pinned.resolve_pin(true));

        let unpinned = BeeClient::new("http://localhost:1633");
        assert!(!unpinned.resolve_pin(false));
        assert!(unpinned.resolve_pin(true));
    }

    #[test]
    fn test_api_error_decodes_envelope() {
        let err = BeeClient::api_error(StatusCode::NOT_FOUND, br#"{"code":404,"message":"Not Found"}"#);
        match err {
            SwarmstoreError::Api { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "Not Found");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_api_error_raw_body_fallback() {
        let err = BeeClient::api_error(StatusCode::INTERNAL_SERVER_ERROR, b"boom");
        match err {
            SwarmstoreError::Api { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = BeeClient::new("http://localhost:1633/");
        assert_eq!(client.url(CHUNKS_PATH), "http://localhost:1633/chunks");
    }
}
