use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::info;
use reqwest::{header::ACCEPT, Client, Url};

use crate::time_entry::TimeEntry;

/// 接続先が設定されていない場合に利用する勤怠APIのURL。
pub const DEFAULT_API_URL: &str = "https://rc-vault-fap-live-1.azurewebsites.net/api/gettimeentries?code=vO17RnE8vuzXzPJo5eaLLjXjmRW07law99QTD90zat9FfOQJKKUcgQ==";

/// 勤怠レコードを取得するためのtrait。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TimeEntryRepository: Send + Sync {
    /// 全ての勤怠レコードを取得する。
    async fn read_time_entries(&self) -> Result<Vec<TimeEntry>>;
}

/// 勤怠APIと通信するためのクライアント。
///
/// # Examples
///
/// ```
/// let client = TimeEntriesClient::new(DEFAULT_API_URL, Duration::from_secs(30)).unwrap();
/// let time_entries = client.read_time_entries().await.unwrap();
/// ```
pub struct TimeEntriesClient {
    client: Client,
    api_url: Url,
}

impl TimeEntriesClient {
    /// 新しい`TimeEntriesClient`を返す。
    ///
    /// # Arguments
    ///
    /// * `api_url` - 勤怠APIのURL
    /// * `timeout` - 1リクエストあたりのタイムアウト
    pub fn new(api_url: &str, timeout: Duration) -> Result<Self> {
        let api_url =
            Url::parse(api_url).with_context(|| format!("Invalid time entries API URL: {}", api_url))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client, api_url })
    }

    /// ログに出力するURL。クエリにアクセスコードを含むため、パスまでとする。
    fn display_url(&self) -> String {
        let port = self
            .api_url
            .port()
            .map(|port| format!(":{}", port))
            .unwrap_or_default();
        format!(
            "{}://{}{}{}",
            self.api_url.scheme(),
            self.api_url.host_str().unwrap_or_default(),
            port,
            self.api_url.path()
        )
    }
}

#[async_trait]
impl TimeEntryRepository for TimeEntriesClient {
    async fn read_time_entries(&self) -> Result<Vec<TimeEntry>> {
        let time_entries = self
            .client
            .get(self.api_url.clone())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", self.display_url()))?
            .error_for_status()
            .context("Request returned an error status")?
            .json::<Option<Vec<TimeEntry>>>()
            .await
            .context("Failed to deserialize response")?
            .context("Response body was null")?;
        info!(
            "length of time entries from {}: {}",
            self.display_url(),
            time_entries.len()
        );

        Ok(time_entries)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{TimeZone, Utc};
    use rstest::rstest;
    use tokio::net::TcpListener;

    use super::{TimeEntriesClient, TimeEntryRepository};
    use crate::time_entry::TimeEntry;

    /// 正常系のテスト。
    #[tokio::test]
    async fn test_read_time_entries() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/gettimeentries")
            .match_query(mockito::Matcher::UrlEncoded(
                "code".to_string(),
                "secret".to_string(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[
                    {"employeeName":"Alice","timeIn":"2022-02-22T09:00:00","timeOut":"2022-02-22T17:00:00"},
                    {"EmployeeName":"Bob","TimeIn":"2022-02-22T09:00:00","TimeOut":"2022-02-22T12:00:00"}
                ]"#,
            )
            .create_async()
            .await;

        let url = format!("{}/api/gettimeentries?code=secret", server.url());
        let client = TimeEntriesClient::new(&url, Duration::from_secs(5)).unwrap();
        let time_entries = client.read_time_entries().await.unwrap();

        mock.assert_async().await;
        assert_eq!(
            time_entries,
            vec![
                TimeEntry {
                    employee_name: "Alice".to_string(),
                    time_in: Utc.with_ymd_and_hms(2022, 2, 22, 9, 0, 0).unwrap(),
                    time_out: Utc.with_ymd_and_hms(2022, 2, 22, 17, 0, 0).unwrap(),
                },
                TimeEntry {
                    employee_name: "Bob".to_string(),
                    time_in: Utc.with_ymd_and_hms(2022, 2, 22, 9, 0, 0).unwrap(),
                    time_out: Utc.with_ymd_and_hms(2022, 2, 22, 12, 0, 0).unwrap(),
                },
            ]
        );
    }

    /// 空配列は成功として扱うことを確認する。
    #[tokio::test]
    async fn test_read_time_entries_empty() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/")
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let client = TimeEntriesClient::new(&server.url(), Duration::from_secs(5)).unwrap();

        assert_eq!(client.read_time_entries().await.unwrap(), vec![]);
    }

    /// 異常系のテスト。
    #[rstest]
    #[case::service_unavailable(503, "[]")]
    #[case::not_found(404, "[]")]
    #[case::server_error(500, "oops")]
    #[case::malformed_json(200, "[{")]
    #[case::null_body(200, "null")]
    #[case::not_array(200, r#"{"EmployeeName":"Alice"}"#)]
    #[case::bad_entry(200, r#"[{"EmployeeName":"Alice","TimeIn":"x","TimeOut":"y"}]"#)]
    #[tokio::test]
    async fn test_read_time_entries_error(#[case] status: usize, #[case] body: &str) {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/")
            .with_status(status)
            .with_body(body)
            .create_async()
            .await;

        let client = TimeEntriesClient::new(&server.url(), Duration::from_secs(5)).unwrap();

        assert!(client.read_time_entries().await.is_err());
    }

    /// 接続できない場合はエラーになることを確認する。
    #[tokio::test]
    async fn test_read_time_entries_unreachable() {
        let client =
            TimeEntriesClient::new("http://127.0.0.1:1/api", Duration::from_secs(1)).unwrap();

        assert!(client.read_time_entries().await.is_err());
    }

    /// 接続を受け付けるが応答しない上流APIを起動し、URLを返す。
    async fn spawn_silent_upstream() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });
        format!("http://{}/api", addr)
    }

    /// 応答がない場合はタイムアウトでエラーになることを確認する。
    #[tokio::test]
    async fn test_read_time_entries_timeout() {
        let url = spawn_silent_upstream().await;
        let client = TimeEntriesClient::new(&url, Duration::from_millis(200)).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), client.read_time_entries())
            .await
            .expect("request was not bounded by the client timeout");

        assert!(result.is_err());
    }

    /// 不正なURLはクライアント作成時にエラーになることを確認する。
    #[test]
    fn test_new_invalid_url() {
        assert!(TimeEntriesClient::new("not a url", Duration::from_secs(1)).is_err());
    }

    /// ログ用のURLにクエリが含まれず、ポートは含まれることを確認する。
    #[rstest]
    #[case::default_port(
        "https://example.com/api/gettimeentries?code=secret",
        "https://example.com/api/gettimeentries"
    )]
    #[case::explicit_port(
        "http://example.com:8081/api/gettimeentries?code=secret",
        "http://example.com:8081/api/gettimeentries"
    )]
    fn test_display_url(#[case] api_url: &str, #[case] expected: &str) {
        let client = TimeEntriesClient::new(api_url, Duration::from_secs(1)).unwrap();

        assert_eq!(client.display_url(), expected);
    }
}
