// AWS Signature Version 4 for S3 GET requests
// https://docs.aws.amazon.com/IAM/latest/UserGuide/create-signed-request.html
// AWS-provided examples
// https://github.com/aws-samples/sigv4-signing-examples/blob/main/no-sdk/python/main.py

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::hex::bytes_to_hex_string;

const FMT_YYYYMMDD_HHMMSS: &str = "%Y%m%dT%H%M%SZ";
const FMT_YYYYMMDD: &str = "%Y%m%d";

/// SHA256 of the empty string, our GET requests have no body
pub const EMPTY_PAYLOAD_SHA256: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

const SIGNED_HEADERS: &str = "host;x-amz-content-sha256;x-amz-date";

#[derive(Clone)]
pub struct Credentials {
    pub access_key: String,
    pub secret_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .finish_non_exhaustive()
    }
}

fn canonical_request(method: &str, uri: &str, host: &str, timestamp: &DateTime<Utc>) -> String {
    let amz_date = timestamp.format(FMT_YYYYMMDD_HHMMSS).to_string();
    let canonical_headers = format!(
        "host:{host}\nx-amz-content-sha256:{EMPTY_PAYLOAD_SHA256}\nx-amz-date:{amz_date}\n"
    );

    [
        method.to_uppercase(),
        uri.to_string(),
        // canonical query string
        "".to_string(),
        canonical_headers,
        SIGNED_HEADERS.to_string(),
        EMPTY_PAYLOAD_SHA256.to_string(),
    ]
    .join("\n")
}

fn scope(timestamp: &DateTime<Utc>, region: &str) -> String {
    let datetime = timestamp.format(FMT_YYYYMMDD).to_string();
    format!("{datetime}/{region}/s3/aws4_request")
}

fn string_to_sign(
    timestamp: &DateTime<Utc>,
    method: &str,
    uri: &str,
    host: &str,
    region: &str,
) -> String {
    let canonical_request = canonical_request(method, uri, host, timestamp);
    let hashed_canonical_request =
        bytes_to_hex_string(&Sha256::digest(canonical_request.as_bytes()));
    let request_date_time = timestamp.format(FMT_YYYYMMDD_HHMMSS).to_string();
    [
        "AWS4-HMAC-SHA256",
        &request_date_time,
        &scope(timestamp, region),
        &hashed_canonical_request,
    ]
    .join("\n")
}

fn hmac(key: &[u8], value: &str) -> Vec<u8> {
    // HMAC accepts keys of any length, so this can't fail
    let mut h = <Hmac<Sha256> as Mac>::new_from_slice(key).expect("hmac accepts any key length");
    h.update(value.as_bytes());
    h.finalize().into_bytes().to_vec()
}

fn signing_key(timestamp: &DateTime<Utc>, secret_key: &str, region: &str) -> Vec<u8> {
    let date_key = hmac(
        format!("AWS4{secret_key}").as_bytes(),
        &timestamp.format(FMT_YYYYMMDD).to_string(),
    );
    let date_region_key = hmac(&date_key, region);
    let date_region_service_key = hmac(&date_region_key, "s3");
    hmac(&date_region_service_key, "aws4_request")
}

fn compute_signature(
    method: &str,
    host: &str,
    uri: &str,
    region: &str,
    timestamp: &DateTime<Utc>,
    secret_key: &str,
) -> String {
    let to_sign = string_to_sign(timestamp, method, uri, host, region);
    let key = signing_key(timestamp, secret_key, region);
    bytes_to_hex_string(&hmac(&key, &to_sign))
}

// The result of signing a request is a series of headers that should be added to the request.
// `x-amz-content-sha256` must also be sent, with `EMPTY_PAYLOAD_SHA256` as value
pub struct SignatureHeaders {
    // The 'x-amz-date' header
    pub amz_date_header: String,
    // The 'Authorization' header
    pub authorization_header: String,
}

pub fn sign_request(
    method: &str,
    host: &str,
    uri: &str,
    region: &str,
    credentials: &Credentials,
    timestamp: &DateTime<Utc>,
) -> SignatureHeaders {
    let signature = compute_signature(
        method,
        host,
        uri,
        region,
        timestamp,
        &credentials.secret_key,
    );
    let authorization_header = format!(
        "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={SIGNED_HEADERS}, Signature={signature}",
        credentials.access_key,
        scope(timestamp, region),
    );
    SignatureHeaders {
        amz_date_header: timestamp.format(FMT_YYYYMMDD_HHMMSS).to_string(),
        authorization_header,
    }
}

#[cfg(test)]
mod tests {
    use super::{
        canonical_request, compute_signature, sign_request, signing_key, string_to_sign,
        Credentials,
    };
    use chrono::{NaiveDate, TimeZone, Utc};

    // Expected values were generated by an independent python implementation of SigV4
    // (hashlib + hmac), following the aws-samples script linked at the top of this file

    fn timestamp() -> chrono::DateTime<Utc> {
        Utc.from_utc_datetime(&NaiveDate::from_ymd_opt(2024, 9, 28).unwrap().into())
    }

    const SECRET_KEY: &str = "wJalrXUtnFEMI/K7MDENG/bPxRfiCYEXAMPLEKEY";

    #[test]
    fn test_canonical_request() {
        let actual = canonical_request("get", "/public/red.tif", "localhost:9000", &timestamp());
        let expected = "GET\n/public/red.tif\n\nhost:localhost:9000\nx-amz-content-sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855\nx-amz-date:20240928T000000Z\n\nhost;x-amz-content-sha256;x-amz-date\ne3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_string_to_sign() {
        let actual = string_to_sign(
            &timestamp(),
            "GET",
            "/public/red.tif",
            "localhost:9000",
            "us-east-1",
        );
        let expected = "AWS4-HMAC-SHA256\n20240928T000000Z\n20240928/us-east-1/s3/aws4_request\na8f42982705b00e938306509626496a2ddaed959ac94413c14bf92747e242c10";
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_signing_key() {
        let actual = signing_key(&timestamp(), SECRET_KEY, "us-east-1");
        let expected = crate::hex::bytes_to_hex_string(&actual);
        assert_eq!(expected, "932acdc8a91a5c1482d72ae628a7bb3bcc9b7597a73431c4fb5026a39f7e3836");
    }

    #[test]
    fn test_compute_signature() {
        let actual = compute_signature(
            "GET",
            "localhost:9000",
            "/public/red.tif",
            "us-east-1",
            &timestamp(),
            SECRET_KEY,
        );
        assert_eq!(actual, "d16d6132002a1579c543f07841740c07eba8a22144cbc96b5ece6244c64932fd");
    }

    #[test]
    fn test_sign_request_headers() {
        let credentials = Credentials {
            access_key: "AKIDEXAMPLE".to_string(),
            secret_key: SECRET_KEY.to_string(),
        };
        let actual = sign_request(
            "GET",
            "localhost:9000",
            "/public/red.tif",
            "us-east-1",
            &credentials,
            &timestamp(),
        );
        let expected_authorization = "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20240928/us-east-1/s3/aws4_request, SignedHeaders=host;x-amz-content-sha256;x-amz-date, Signature=d16d6132002a1579c543f07841740c07eba8a22144cbc96b5ece6244c64932fd";
        assert_eq!(actual.amz_date_header, "20240928T000000Z");
        assert_eq!(actual.authorization_header, expected_authorization);
    }

    #[test]
    fn test_credentials_debug_hides_secret() {
        let credentials = Credentials {
            access_key: "AKIDEXAMPLE".to_string(),
            secret_key: SECRET_KEY.to_string(),
        };
        assert!(!format!("{:?}", credentials).contains(SECRET_KEY));
    }
}
