//! Room client
//!
//! Dials a room server and drives the same command/raw framing from the
//! other side. Chat lines that arrive while a response is awaited are
//! queued and handed out by [`RoomClient::next_chat`].

use log::{info, warn};
use std::collections::VecDeque;
use std::path::PathBuf;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::client::results::{DownloadResult, UploadOutcome};
use crate::error::{ClientError, ConnectionError, TransferError};
use crate::framing::{CommandReader, ConnectionWriter, framed};
use crate::protocol::{Command, Response};
use crate::storage::DirectoryStore;
use crate::transfer;

const MAX_RESPONSE_LENGTH: usize = 1024 * 1024;
const CHUNK_SIZE: usize = 8192;

pub struct RoomClient {
    reader: CommandReader,
    writer: ConnectionWriter,
    client_root: PathBuf,
    store: Option<DirectoryStore>,
    username: Option<String>,
    pending_chats: VecDeque<String>,
}

impl RoomClient {
    /// Connects over TCP. Local files live under `client_root/<username>`.
    pub async fn connect(
        addr: impl ToSocketAddrs,
        client_root: impl Into<PathBuf>,
    ) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await.map_err(ConnectionError::from)?;
        Ok(Self::from_stream(stream, client_root))
    }

    pub fn from_stream<S>(stream: S, client_root: impl Into<PathBuf>) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + Sync + 'static,
    {
        let (reader, writer) = framed(stream, MAX_RESPONSE_LENGTH);
        Self {
            reader,
            writer,
            client_root: client_root.into(),
            store: None,
            username: None,
            pending_chats: VecDeque::new(),
        }
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// The logged-in user's local store.
    pub fn store(&self) -> Result<&DirectoryStore, ClientError> {
        self.store.as_ref().ok_or(ClientError::NotLoggedIn)
    }

    /// Returns `true` on `LOGIN-SUCCESS`, `false` on `LOGIN-FAILED`.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<bool, ClientError> {
        self.send(Command::Login {
            username: username.to_string(),
            password: password.to_string(),
        })
        .await?;

        match self.await_response().await? {
            Response::LoginSuccess => {
                let store = DirectoryStore::for_user(&self.client_root, username)?;
                store.ensure_root().await?;
                info!("Logged in as {}", username);
                self.store = Some(store);
                self.username = Some(username.to_string());
                Ok(true)
            }
            Response::LoginFailed => Ok(false),
            other => Err(unexpected(other)),
        }
    }

    /// Sends a chat line. The server does not answer the sender.
    pub async fn chat(&mut self, text: &str) -> Result<(), ClientError> {
        self.send(Command::Chat(text.to_string())).await
    }

    pub async fn list(&mut self) -> Result<Vec<String>, ClientError> {
        self.send(Command::List).await?;
        match self.await_response().await? {
            Response::FileList(names) => Ok(names),
            Response::Error(message) => Err(ClientError::Server(message)),
            other => Err(unexpected(other)),
        }
    }

    /// Uploads `name` from the local store.
    ///
    /// If the local file cannot be read after the server said `UPLOAD_READY`,
    /// the server is told with `UPLOAD_FAILED` and the error is returned.
    pub async fn upload(&mut self, name: &str) -> Result<UploadOutcome, ClientError> {
        let length = self.store()?.file_length(name).await?;

        self.send(Command::UploadRequest {
            filename: name.to_string(),
            length,
        })
        .await?;

        match self.await_response().await? {
            Response::UploadReady => {}
            Response::UploadDenied(reason) => return Ok(UploadOutcome::Denied(reason)),
            Response::Error(message) => return Err(ClientError::Server(message)),
            other => return Err(unexpected(other)),
        }

        let body = match self.store()?.read_file(name).await {
            Ok(body) if body.len() as u64 == length => body,
            Ok(body) => {
                warn!("{} changed size from {} to {} bytes", name, length, body.len());
                self.send(Command::UploadFailed(name.to_string())).await?;
                return Err(ClientError::Transfer(TransferError::Incomplete {
                    expected: length,
                    received: body.len() as u64,
                }));
            }
            Err(e) => {
                warn!("Failed to read {} for upload: {}", name, e);
                self.send(Command::UploadFailed(name.to_string())).await?;
                return Err(e.into());
            }
        };

        transfer::send(
            &self.writer,
            &Command::UploadStart.to_string(),
            &body,
            CHUNK_SIZE,
        )
        .await?;

        match self.await_response().await? {
            Response::UploadSuccess(stored) => Ok(UploadOutcome::Uploaded(stored)),
            Response::UploadDenied(reason) => Ok(UploadOutcome::Denied(reason)),
            Response::Error(message) => Err(ClientError::Server(message)),
            other => Err(unexpected(other)),
        }
    }

    /// Downloads `name` into the local store. Incomplete bodies are discarded.
    pub async fn download(&mut self, name: &str) -> Result<DownloadResult, ClientError> {
        self.store()?;
        self.send(Command::Download(name.to_string())).await?;

        let (filename, length) = match self.await_response().await? {
            Response::FileInfo { filename, length } => (filename, length),
            Response::Error(message) => return Err(ClientError::Server(message)),
            other => return Err(unexpected(other)),
        };

        let body = transfer::receive(&mut self.reader, length, CHUNK_SIZE)
            .await
            .into_complete()?;
        let file = self.store()?.store_file(&filename, &body).await?;
        info!("Downloaded {} ({} bytes)", file.name, file.length);
        Ok(DownloadResult { file })
    }

    /// Next relayed chat line (`<username>: <text>`), or `None` once the
    /// server closes the connection.
    pub async fn next_chat(&mut self) -> Result<Option<String>, ClientError> {
        if let Some(chat) = self.pending_chats.pop_front() {
            return Ok(Some(chat));
        }
        loop {
            let Some(line) = self.reader.read_command().await? else {
                return Ok(None);
            };
            match Response::parse(&line) {
                Some(Response::Chat(text)) => return Ok(Some(text)),
                _ => warn!("Ignoring unsolicited line: {}", line),
            }
        }
    }

    /// Sends EXIT and closes the write side.
    pub async fn exit(self) -> Result<(), ClientError> {
        self.writer.write_command(&Command::Exit.to_string()).await?;
        self.writer.shutdown().await?;
        Ok(())
    }

    async fn send(&self, command: Command) -> Result<(), ClientError> {
        self.writer.write_command(&command.to_string()).await?;
        Ok(())
    }

    async fn await_response(&mut self) -> Result<Response, ClientError> {
        loop {
            let Some(line) = self.reader.read_command().await? else {
                return Err(ConnectionError::Closed.into());
            };
            match Response::parse(&line) {
                Some(Response::Chat(text)) => self.pending_chats.push_back(text),
                Some(response) => return Ok(response),
                None => return Err(ClientError::UnexpectedResponse(line)),
            }
        }
    }
}

fn unexpected(response: Response) -> ClientError {
    ClientError::UnexpectedResponse(response.to_string())
}
