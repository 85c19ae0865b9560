use tokio::net::TcpStream;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use crate::{Result, Error};
use tokio::sync::Mutex;
use serde_json::Value;

/// Remote client for the metatree line protocol.
///
/// Reconnects transparently: a broken connection is retried a few times
/// before the error is surfaced.
pub struct Client {
    addr: String,
    inner: Mutex<Option<ClientInner>>,
}

struct ClientInner {
    reader: BufReader<tokio::net::tcp::OwnedReadHalf>,
    writer: tokio::net::tcp::OwnedWriteHalf,
}

impl Client {
    pub async fn connect(addr: &str) -> Result<Self> {
        let inner = Client::connect_inner(addr).await?;
        Ok(Self {
            addr: addr.to_string(),
            inner: Mutex::new(Some(inner)),
        })
    }

    async fn send_and_receive(&self, cmd: String) -> Result<String> {
        let mut inner_guard = self.inner.lock().await;

        // Retry logic
        for i in 0..3 {
            if inner_guard.is_none() {
                match Client::connect_inner(&self.addr).await {
                    Ok(inner) => *inner_guard = Some(inner),
                    Err(e) => {
                        if i == 2 { return Err(e); }
                        tokio::time::sleep(std::time::Duration::from_millis((i + 1) * 200)).await;
                        continue;
                    }
                }
            }

            let inner = inner_guard.as_mut().unwrap();
            if let Err(_) = inner.writer.write_all(format!("{}\n", cmd).as_bytes()).await {
                *inner_guard = None;
                continue;
            }

            let mut resp = String::new();
            match inner.reader.read_line(&mut resp).await {
                Ok(0) => {
                    *inner_guard = None;
                    continue;
                }
                Ok(_) => return Ok(resp.trim().to_string()),
                Err(_) => {
                    *inner_guard = None;
                    continue;
                }
            }
        }

        Err(Error::Internal("failed after 3 attempts".to_string()))
    }

    async fn connect_inner(addr: &str) -> Result<ClientInner> {
        let stream = TcpStream::connect(addr).await?;
        let (reader, writer) = stream.into_split();
        Ok(ClientInner {
            reader: BufReader::new(reader),
            writer,
        })
    }

    /// Sends a command and decodes the `<status> <json>` response line.
    async fn request(&self, cmd: String) -> Result<Value> {
        let resp = self.send_and_receive(cmd).await?;
        let (status, body) = resp
            .split_once(' ')
            .ok_or_else(|| Error::Internal("invalid response".to_string()))?;
        let value: Value = serde_json::from_str(body)?;
        if status == "200" {
            Ok(value)
        } else {
            let message = value["error"].as_str().unwrap_or("request failed");
            Err(Error::Internal(message.to_string()))
        }
    }

    /// Retrieves the value or subtree at `path`.
    pub async fn get(&self, path: &str) -> Result<Value> {
        self.request(format!("GET {}", normalize(path))).await
    }

    /// Retrieves `path` with descriptive annotations per leaf.
    pub async fn get_with_metadata(&self, path: &str) -> Result<Value> {
        self.request(format!("GET {} META", normalize(path))).await
    }

    /// Applies `value` at `path` and returns the post-set value.
    pub async fn put(&self, path: &str, value: Value) -> Result<Value> {
        let payload = serde_json::to_string(&value)?;
        self.request(format!("PUT {} {}", normalize(path), payload)).await
    }

    /// Triggers a metadata write on the server.
    pub async fn write(&self) -> Result<()> {
        self.request("WRITE".to_string()).await?;
        Ok(())
    }
}

// The protocol is whitespace-delimited, so the root path needs a spelling.
fn normalize(path: &str) -> &str {
    if path.is_empty() { "/" } else { path }
}
