use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use crate::adapter::{ApiResponse, MetadataAdapter};
use crate::Result;
use log::{info, error};
use tokio::sync::Semaphore;

pub struct Router {
    adapter: Arc<MetadataAdapter>,
    semaphore: Arc<Semaphore>,
}

impl Router {
    pub fn new(adapter: Arc<MetadataAdapter>) -> Self {
        Self {
            adapter,
            semaphore: Arc::new(Semaphore::new(100)),
        }
    }

    pub async fn listen(&self, port: &str) -> Result<()> {
        let listener = TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
        info!("metatree listening on port {}", port);

        loop {
            let (socket, _) = listener.accept().await?;
            let adapter = self.adapter.clone();
            let sem = self.semaphore.clone();

            tokio::spawn(async move {
                let _permit = match sem.try_acquire() {
                    Ok(p) => p,
                    Err(_) => {
                        error!("Server busy: too many concurrent connections. Rejecting...");
                        // Ensure it's closed
                        let mut socket = socket;
                        let _ = socket.shutdown().await;
                        return;
                    }
                };

                if let Err(e) = handle_connection(socket, adapter).await {
                    error!("Connection error: {}", e);
                }
            });
        }
    }
}

fn format_response(resp: ApiResponse) -> String {
    format!("{} {}", resp.status, resp.body)
}

pub async fn handle_connection(mut socket: TcpStream, adapter: Arc<MetadataAdapter>) -> Result<()> {
    let (reader, mut writer) = socket.split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            break;
        }

        let parts: Vec<&str> = line.trim().split_whitespace().collect();
        if parts.is_empty() {
            continue;
        }

        let command = parts[0].to_uppercase();
        let response = match command.as_str() {
            "GET" => {
                if parts.len() < 2 {
                    "400 {\"error\":\"missing path\"}".to_string()
                } else {
                    let with_metadata = parts.get(2).map(|p| p.eq_ignore_ascii_case("meta")).unwrap_or(false);
                    format_response(adapter.get(parts[1], with_metadata))
                }
            }
            "PUT" => {
                if parts.len() < 3 {
                    "400 {\"error\":\"missing path or payload\"}".to_string()
                } else {
                    let payload = parts[2..].join(" ");
                    format_response(adapter.put(parts[1], &payload))
                }
            }
            "WRITE" => format_response(adapter.put("write", "null")),
            "PING" => "PONG".to_string(),
            "QUIT" => break,
            _ => "400 {\"error\":\"unknown command\"}".to_string(),
        };

        writer.write_all(format!("{}\n", response).as_bytes()).await?;
    }
    Ok(())
}
