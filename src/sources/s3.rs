use super::auth::aws::{sign_request, Credentials, EMPTY_PAYLOAD_SHA256};
use super::http::read_range;
use crate::errors::Error;
use chrono::Utc;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use tracing::debug;

// S3 canonical URIs keep unreserved characters and '/' as is
// https://docs.aws.amazon.com/IAM/latest/UserGuide/create-signed-request.html#create-canonical-request
const S3_PATH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

fn env_flag(name: &str) -> bool {
    matches!(
        std::env::var(name).map(|v| v.to_uppercase()).as_deref(),
        Ok("YES") | Ok("TRUE") | Ok("1")
    )
}

/// S3 settings, read from the same environment variables as GDAL/the AWS CLI
#[derive(Debug, Clone)]
pub struct S3Config {
    /// e.g. `http://localhost:9000` for minio. Uses path style addressing when set
    pub endpoint: Option<String>,
    pub region: String,
    /// None means anonymous (unsigned) requests
    pub credentials: Option<Credentials>,
}

impl S3Config {
    pub fn from_env() -> S3Config {
        let region = std::env::var("AWS_DEFAULT_REGION")
            .or_else(|_| std::env::var("AWS_REGION"))
            .unwrap_or("us-east-1".to_string());
        let endpoint = std::env::var("AWS_S3_ENDPOINT").ok();
        let credentials = if env_flag("AWS_NO_SIGN_REQUEST") {
            None
        } else {
            match (
                std::env::var("AWS_ACCESS_KEY_ID"),
                std::env::var("AWS_SECRET_ACCESS_KEY"),
            ) {
                (Ok(access_key), Ok(secret_key)) => Some(Credentials {
                    access_key,
                    secret_key,
                }),
                _ => {
                    debug!("no AWS credentials in environment, using unsigned requests");
                    None
                }
            }
        };
        S3Config {
            endpoint,
            region,
            credentials,
        }
    }
}

#[derive(Debug, Default)]
struct Stats {
    read_counts: usize,
}

pub struct S3Source {
    client: Client,
    config: S3Config,
    url: String,
    host: String,
    canonical_uri: String,
    stats: Stats,
}

impl S3Source {
    /// `path` is `<bucket>/<key>`
    pub fn new(path: &str) -> Result<S3Source, Error> {
        S3Source::with_config(path, S3Config::from_env())
    }

    pub fn with_config(path: &str, config: S3Config) -> Result<S3Source, Error> {
        let (bucket, key) = path
            .split_once('/')
            .filter(|(bucket, key)| !bucket.is_empty() && !key.is_empty())
            .ok_or_else(|| {
                Error::ResourceUnavailable(format!(
                    "Failed to extract bucket and key from {}",
                    path
                ))
            })?;
        let encoded_key: String = utf8_percent_encode(key, S3_PATH_ENCODE_SET).to_string();
        let (url, host, canonical_uri) = match &config.endpoint {
            Some(endpoint) => {
                let endpoint = endpoint.trim_end_matches('/');
                let host = endpoint
                    .split_once("://")
                    .map(|(_, rest)| rest)
                    .unwrap_or(endpoint)
                    .to_string();
                let canonical_uri = format!("/{}/{}", bucket, encoded_key);
                (
                    format!("{}{}", endpoint, canonical_uri),
                    host,
                    canonical_uri,
                )
            }
            None => {
                let host = format!("{}.s3.{}.amazonaws.com", bucket, config.region);
                let canonical_uri = format!("/{}", encoded_key);
                (
                    format!("https://{}{}", host, canonical_uri),
                    host,
                    canonical_uri,
                )
            }
        };
        Ok(S3Source {
            client: Client::builder().build()?,
            config,
            url,
            host,
            canonical_uri,
            stats: Default::default(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn read(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize, Error> {
        self.stats.read_counts += 1;
        let mut request = self.client.get(&self.url);
        if let Some(credentials) = &self.config.credentials {
            let headers = sign_request(
                "GET",
                &self.host,
                &self.canonical_uri,
                &self.config.region,
                credentials,
                &Utc::now(),
            );
            request = request
                .header("x-amz-date", headers.amz_date_header)
                .header("x-amz-content-sha256", EMPTY_PAYLOAD_SHA256)
                .header(AUTHORIZATION, headers.authorization_header);
        }
        read_range(request, &self.url, offset, buf).await
    }

    pub fn get_stats(&self) -> String {
        format!("read_counts={}", self.stats.read_counts)
    }
}

#[cfg(test)]
mod tests {
    use super::{S3Config, S3Source};

    #[test]
    fn test_virtual_host_url() {
        let config = S3Config {
            endpoint: None,
            region: "us-west-2".to_string(),
            credentials: None,
        };
        let source = S3Source::with_config(
            "sentinel-cogs/sentinel-s2-l2a-cogs/36/N/YF/B04 band.tif",
            config,
        )
        .unwrap();
        assert_eq!(
            source.url(),
            "https://sentinel-cogs.s3.us-west-2.amazonaws.com/sentinel-s2-l2a-cogs/36/N/YF/B04%20band.tif"
        );
        assert_eq!(source.host, "sentinel-cogs.s3.us-west-2.amazonaws.com");
    }

    #[test]
    fn test_path_style_url_with_endpoint() {
        let config = S3Config {
            endpoint: Some("http://localhost:9000/".to_string()),
            region: "us-east-1".to_string(),
            credentials: None,
        };
        let source = S3Source::with_config("public/red.tif", config).unwrap();
        assert_eq!(source.url(), "http://localhost:9000/public/red.tif");
        assert_eq!(source.host, "localhost:9000");
        assert_eq!(source.canonical_uri, "/public/red.tif");
    }

    #[test]
    fn test_missing_key() {
        let config = S3Config {
            endpoint: None,
            region: "us-east-1".to_string(),
            credentials: None,
        };
        assert!(S3Source::with_config("bucket-only", config).is_err());
    }
}
