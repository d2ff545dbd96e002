/*!
 * Common test utilities for the dataset-translator test suite
 */

use anyhow::Result;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use dataset_translator::app_config::ColumnSelection;
use dataset_translator::Config;

/// Route library logs through env_logger; safe to call from every test
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Write a single-column `text` CSV dataset
pub fn write_text_dataset(dir: &Path, filename: &str, texts: &[&str]) -> Result<PathBuf> {
    let path = dir.join(filename);
    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record(["id", "text"])?;
    for (i, text) in texts.iter().enumerate() {
        writer.write_record([(i + 1).to_string().as_str(), *text])?;
    }
    writer.flush()?;
    Ok(path)
}

/// Configuration translating the `text` column of `source`, with files under `dir`
pub fn test_config(source: &Path, dir: &Path) -> Config {
    let mut config = Config::default();
    config.dataset.source = source.display().to_string();
    config.dataset.columns_to_translate = ColumnSelection::Named(vec!["text".to_string()]);
    config.checkpoint.directory = dir.join("checkpoints");
    config.output.path = Some(dir.join("out.csv"));
    config.output.keep_columns = Some(vec!["text".to_string()]);
    config.retry.respect_rate_limits = false;
    config
}

/// Read a CSV file into its header and rows
pub fn read_csv(path: &Path) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let mut reader = csv::Reader::from_path(path)?;
    let header = reader.headers()?.iter().map(str::to_string).collect();
    let rows = reader
        .records()
        .map(|r| r.map(|record| record.iter().map(str::to_string).collect()))
        .collect::<Result<Vec<Vec<String>>, _>>()?;
    Ok((header, rows))
}

/// Minimal HTTP server answering every request with a fixed status and body
pub struct StubServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl StubServer {
    pub async fn start(status: u16, body: &str) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let base_url = format!("http://{}/v1", listener.local_addr()?);
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = requests.clone();
        let body = body.to_string();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let seen = seen.clone();
                let body = body.clone();
                tokio::spawn(async move {
                    let Ok(request) = read_request(&mut socket).await else {
                        return;
                    };
                    seen.lock().push(request);
                    let response = format!(
                        "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        status,
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        Ok(Self { base_url, requests })
    }

    /// Request bodies received so far
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

/// Read headers and a Content-Length body; returns the body
async fn read_request(socket: &mut tokio::net::TcpStream) -> Result<String> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            anyhow::bail!("connection closed before request completed");
        }
        buffer.extend_from_slice(&chunk[..n]);

        let Some(header_end) = find_header_end(&buffer) else {
            continue;
        };
        let headers = String::from_utf8_lossy(&buffer[..header_end]).to_lowercase();
        let length = headers
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        let body_start = header_end + 4;
        if buffer.len() >= body_start + length {
            return Ok(String::from_utf8_lossy(&buffer[body_start..body_start + length]).into_owned());
        }
    }
}

fn find_header_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Chat completions body with one assistant message
pub fn chat_body(content: &str) -> String {
    serde_json::json!({
        "choices": [{ "message": { "role": "assistant", "content": content } }]
    })
    .to_string()
}
