use reqwest::Client;
use serde_json::Value;
use time::OffsetDateTime;

use super::sigv4::{self, SignableRequest};
use super::{AwsCredentials, AwsError};

const BODY: &str = "Action=GetCallerIdentity&Version=2011-06-15";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";

/// ARN of the identity the credentials belong to.
pub async fn caller_identity(
    http: &Client,
    region: &str,
    credentials: &AwsCredentials,
) -> Result<String, AwsError> {
    let host = format!("sts.{region}.amazonaws.com");
    let signature = sigv4::sign(
        &SignableRequest {
            method: "POST",
            host: &host,
            path: "/",
            query: "",
            headers: &[("content-type", FORM_CONTENT_TYPE)],
            payload: BODY.as_bytes(),
        },
        credentials,
        region,
        "sts",
        OffsetDateTime::now_utc(),
    );

    let mut req = http
        .post(format!("https://{host}/"))
        .header("content-type", FORM_CONTENT_TYPE)
        .header("accept", "application/json")
        .header("x-amz-date", &signature.amz_date)
        .header("authorization", &signature.authorization)
        .body(BODY);
    if let Some(token) = &credentials.session_token {
        req = req.header("x-amz-security-token", token);
    }

    let resp = req.send().await?;
    let status = resp.status();
    let text = resp.text().await?;
    if !status.is_success() {
        return Err(AwsError::Api {
            status: status.as_u16(),
            body: text,
        });
    }
    parse_identity(&text)
}

fn parse_identity(text: &str) -> Result<String, AwsError> {
    let v: Value = serde_json::from_str(text).map_err(|e| AwsError::Parse(e.to_string()))?;
    v.pointer("/GetCallerIdentityResponse/GetCallerIdentityResult/Arn")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AwsError::Parse("caller identity response has no Arn".into()))
}
