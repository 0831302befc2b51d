use crate::store::ObjectStore;
use crate::SeqsumError;
use aws_config::Region;
use aws_sdk_s3::{primitives::ByteStream, Client};
use std::sync::Arc;
use tokio::runtime::Runtime;

/// S3-backed object store. All operations block on a dedicated runtime so
/// the rest of the crate stays synchronous.
#[derive(Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
    prefix: String,
    runtime: Arc<Runtime>,
}

#[derive(Clone)]
pub struct S3StoreConfig {
    pub bucket: String,
    pub region: String,
    pub prefix: String,
    pub endpoint: Option<String>,
}

impl S3StoreConfig {
    /// `None` when SEQSUM_S3_BUCKET is unset: the caller falls back to local
    /// state, mirroring how the batch runner is used on a laptop.
    pub fn from_env() -> Result<Option<Self>, SeqsumError> {
        let bucket = match std::env::var("SEQSUM_S3_BUCKET") {
            Ok(b) if !b.is_empty() => b,
            _ => return Ok(None),
        };

        let region = std::env::var("SEQSUM_S3_REGION").unwrap_or_else(|_| "us-east-1".to_string());
        let prefix = std::env::var("SEQSUM_S3_PREFIX").unwrap_or_else(|_| "seqsum".to_string());
        let endpoint = std::env::var("SEQSUM_S3_ENDPOINT").ok();

        Ok(Some(Self {
            bucket,
            region,
            prefix,
            endpoint,
        }))
    }
}

impl S3Store {
    pub fn new(config: S3StoreConfig) -> Result<Self, SeqsumError> {
        let runtime =
            Runtime::new().map_err(|e| SeqsumError::Other(format!("tokio runtime error: {}", e)))?;
        let region = Region::new(config.region.clone());
        let base_config = runtime.block_on(aws_config::from_env().region(region.clone()).load());

        let mut s3_builder = aws_sdk_s3::config::Builder::from(&base_config).region(region);
        if let Some(endpoint) = &config.endpoint {
            s3_builder = s3_builder.endpoint_url(endpoint);
            s3_builder = s3_builder.force_path_style(true);
        }

        let client = Client::from_conf(s3_builder.build());

        Ok(Self {
            client,
            bucket: config.bucket,
            prefix: config.prefix,
            runtime: Arc::new(runtime),
        })
    }

    pub fn try_from_env() -> Result<Option<Self>, SeqsumError> {
        if let Some(cfg) = S3StoreConfig::from_env()? {
            Ok(Some(Self::new(cfg)?))
        } else {
            Ok(None)
        }
    }

    fn prefixed(&self, key: &str) -> String {
        let clean = key.trim_start_matches('/');
        if self.prefix.is_empty() {
            clean.to_string()
        } else {
            format!("{}/{}", self.prefix.trim_end_matches('/'), clean)
        }
    }

    fn strip_prefix<'a>(&self, key: &'a str) -> &'a str {
        if self.prefix.is_empty() {
            key
        } else if let Some(rest) =
            key.strip_prefix(&format!("{}/", self.prefix.trim_end_matches('/')))
        {
            rest
        } else {
            key
        }
    }
}

impl ObjectStore for S3Store {
    fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), SeqsumError> {
        let prefixed = self.prefixed(key);
        let body = ByteStream::from(bytes);
        self.runtime
            .block_on(
                self.client
                    .put_object()
                    .bucket(&self.bucket)
                    .key(prefixed)
                    .body(body)
                    .send(),
            )
            .map_err(|e| SeqsumError::Store(format!("S3 put {}: {}", key, e)))?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, SeqsumError> {
        let prefixed = self.prefixed(key);
        let result = self.runtime.block_on(
            self.client
                .get_object()
                .bucket(&self.bucket)
                .key(prefixed)
                .send(),
        );

        match result {
            Ok(resp) => {
                let data = self
                    .runtime
                    .block_on(resp.body.collect())
                    .map_err(|e| SeqsumError::Store(format!("S3 read {}: {}", key, e)))?
                    .to_vec();
                Ok(Some(data))
            }
            Err(err) => {
                let service = err.into_service_error();
                if service.is_no_such_key() {
                    Ok(None)
                } else {
                    Err(SeqsumError::Store(format!("S3 get {}: {}", key, service)))
                }
            }
        }
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, SeqsumError> {
        let prefixed_prefix = self.prefixed(prefix);
        let mut token: Option<String> = None;
        let mut keys = Vec::new();

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefixed_prefix.clone());

            if let Some(ref cont) = token {
                request = request.continuation_token(cont);
            }

            let resp = self
                .runtime
                .block_on(request.send())
                .map_err(|e| SeqsumError::Store(format!("S3 list {}: {}", prefix, e)))?;

            for object in resp.contents() {
                if let Some(key) = object.key() {
                    keys.push(self.strip_prefix(key).to_string());
                }
            }

            if resp.is_truncated().unwrap_or(false) {
                token = resp.next_continuation_token().map(|s| s.to_string());
            } else {
                break;
            }
        }

        Ok(keys)
    }
}
