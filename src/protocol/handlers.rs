//! Protocol state machine
//!
//! One [`ProtocolHandler`] per connection interprets command lines in order,
//! tracks the login/upload state, and drives the transfer engine. Nothing in
//! here runs concurrently for the same connection, so it holds no locks of
//! its own; shared state lives in the session registry and the file store.

use log::{debug, info, warn};
use std::sync::Arc;

use crate::error::ConnectionError;
use crate::error::handlers::{download_error_response, list_error_response, upload_error_response};
use crate::framing::{CommandReader, ConnectionWriter};
use crate::middleware::logging::log_command;
use crate::protocol::state::{PendingUpload, ProtocolState};
use crate::protocol::{Command, Response, parse_command};
use crate::server::ServerContext;
use crate::session::ConnectionId;
use crate::storage::validate_file_name;
use crate::transfer;

/// What the read loop should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    Continue,
    CloseConnection,
}

pub struct ProtocolHandler {
    id: ConnectionId,
    state: ProtocolState,
    reader: CommandReader,
    writer: ConnectionWriter,
    context: Arc<ServerContext>,
}

impl ProtocolHandler {
    pub fn new(
        id: ConnectionId,
        reader: CommandReader,
        writer: ConnectionWriter,
        context: Arc<ServerContext>,
    ) -> Self {
        Self {
            id,
            state: ProtocolState::default(),
            reader,
            writer,
            context,
        }
    }

    pub fn state(&self) -> &ProtocolState {
        &self.state
    }

    /// Reads and handles commands until EXIT, end of stream, or a stream failure.
    pub async fn run(&mut self) -> Result<(), ConnectionError> {
        loop {
            let line = match self.reader.read_command().await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    info!("Connection {} closed by client", self.id);
                    break;
                }
                Err(e) if e.is_recoverable() => {
                    warn!("Connection {}: {}", self.id, e);
                    self.reply(Response::Error("Command too long.".into())).await?;
                    continue;
                }
                Err(e) => return Err(e),
            };

            log_command(&self.id.to_string(), &line);
            let command = parse_command(&line);

            if self.handle(command, &line).await? == CommandStatus::CloseConnection {
                break;
            }
        }

        self.state = ProtocolState::Exited;
        Ok(())
    }

    /// Applies one parsed command. Commands that are unknown, malformed, or
    /// not valid in the current state get `ERROR|Unknown command: <line>`.
    pub async fn handle(
        &mut self,
        command: Command,
        line: &str,
    ) -> Result<CommandStatus, ConnectionError> {
        match command {
            Command::Exit => return Ok(self.handle_exit()),
            Command::Login { username, password } if self.state.is_unauthenticated() => {
                self.handle_login(username, &password).await?;
            }
            Command::Chat(text) if self.state.is_authenticated() => {
                self.handle_chat(&text).await;
            }
            Command::UploadRequest { filename, length } if self.state.is_authenticated() => {
                self.handle_upload_request(filename, length).await?;
            }
            Command::UploadStart if self.state.is_upload_pending() => {
                self.handle_upload_start().await?;
            }
            Command::UploadFailed(filename) if self.state.is_upload_pending() => {
                self.handle_upload_failed(&filename);
            }
            Command::List if self.state.is_authenticated() => {
                self.handle_list().await?;
            }
            Command::Download(filename) if self.state.is_authenticated() => {
                self.handle_download(&filename).await?;
            }
            other => {
                debug!(
                    "Connection {} rejected {} in state {:?}",
                    self.id,
                    other.name(),
                    self.state
                );
                self.reply(Response::unknown_command(line)).await?;
            }
        }
        Ok(CommandStatus::Continue)
    }

    async fn reply(&self, response: Response) -> Result<(), ConnectionError> {
        self.writer.write_command(&response.to_string()).await
    }

    fn username(&self) -> &str {
        self.state.username().unwrap_or("unknown")
    }

    async fn handle_login(&mut self, username: String, password: &str) -> Result<(), ConnectionError> {
        match self.context.authenticator.authenticate(&username, password) {
            Ok(()) => {
                self.context
                    .registry
                    .set_username(self.id, &username)
                    .await;
                info!("User logged in: {} (connection {})", username, self.id);
                self.state = ProtocolState::Authenticated { username };
                self.reply(Response::LoginSuccess).await
            }
            Err(e) => {
                info!("Failed login attempt on connection {}: {}", self.id, e);
                self.reply(Response::LoginFailed).await
            }
        }
    }

    async fn handle_chat(&self, text: &str) {
        let message = Response::chat_from(self.username(), text).to_string();
        let report = self.context.registry.broadcast(self.id, &message).await;
        debug!(
            "Chat from {} queued for {} connections ({} dropped)",
            self.username(),
            report.queued,
            report.dropped
        );
    }

    async fn handle_upload_request(
        &mut self,
        filename: String,
        length: u64,
    ) -> Result<(), ConnectionError> {
        if validate_file_name(&filename).is_err() {
            return self.reply(Response::UploadDenied("Invalid file name.".into())).await;
        }

        let limit = self.context.config.max_upload_size_bytes();
        if let Err(e) = transfer::check_declared_length(length, limit) {
            info!("Denied upload of {} from {}: {}", filename, self.username(), e);
            return self.reply(Response::UploadDenied("File too large.".into())).await;
        }

        match self.context.store.file_exists(&filename).await {
            Ok(false) => {}
            Ok(true) => {
                info!("Denied upload of {} from {}: file exists", filename, self.username());
                return self.reply(Response::UploadDenied("File already exists.".into())).await;
            }
            Err(e) => {
                warn!("Upload check for {} failed: {}", filename, e);
                return self.reply(upload_error_response(&e)).await;
            }
        }

        let username = self.username().to_string();
        self.state = ProtocolState::UploadPending {
            username,
            upload: PendingUpload { filename, length },
        };
        self.reply(Response::UploadReady).await
    }

    async fn handle_upload_start(&mut self) -> Result<(), ConnectionError> {
        let Some(upload) = self.state.take_pending_upload() else {
            return Ok(());
        };

        let chunk_size = self.context.config.buffer_size;
        let body = match transfer::receive(&mut self.reader, upload.length, chunk_size)
            .await
            .into_complete()
        {
            Ok(body) => body,
            Err(e) => {
                // Framing is lost once the raw phase comes up short; nothing to reply to
                warn!(
                    "Client {} disconnected during file upload: {} ({})",
                    self.username(),
                    upload.filename,
                    e
                );
                return Ok(());
            }
        };

        match self.context.store.store_file(&upload.filename, &body).await {
            Ok(stored) => {
                info!(
                    "File {} received successfully from {} ({} bytes)",
                    stored.name,
                    self.username(),
                    stored.length
                );
                self.reply(Response::UploadSuccess(upload.filename)).await
            }
            Err(e) => {
                warn!("Failed to store {} from {}: {}", upload.filename, self.username(), e);
                self.reply(upload_error_response(&e)).await
            }
        }
    }

    fn handle_upload_failed(&mut self, filename: &str) {
        if let Some(upload) = self.state.take_pending_upload() {
            if upload.filename != filename {
                warn!(
                    "Client {} canceled upload {} while {} was pending",
                    self.username(),
                    filename,
                    upload.filename
                );
            }
        }
        info!("Client {} canceled upload: {}", self.username(), filename);
    }

    async fn handle_list(&self) -> Result<(), ConnectionError> {
        match self.context.store.list_files().await {
            Ok(files) => {
                info!("Sent file list to user '{}'", self.username());
                let names = files.into_iter().map(|file| file.name).collect();
                self.reply(Response::FileList(names)).await
            }
            Err(e) => {
                warn!("Failed to list files for '{}': {}", self.username(), e);
                self.reply(list_error_response(&e)).await
            }
        }
    }

    async fn handle_download(&self, filename: &str) -> Result<(), ConnectionError> {
        let body = match self.context.store.read_file(filename).await {
            Ok(body) => body,
            Err(e) => {
                info!("Download of {} by '{}' refused: {}", filename, self.username(), e);
                return self.reply(download_error_response(&e)).await;
            }
        };

        let header = Response::FileInfo {
            filename: filename.to_string(),
            length: body.len() as u64,
        };
        transfer::send(
            &self.writer,
            &header.to_string(),
            &body,
            self.context.config.buffer_size,
        )
        .await?;
        info!("Sent file {} to user '{}'", filename, self.username());
        Ok(())
    }

    fn handle_exit(&mut self) -> CommandStatus {
        info!("{} disconnected.", self.state.username().unwrap_or("anonymous"));
        self.state = ProtocolState::Exited;
        CommandStatus::CloseConnection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::framing::framed;
    use tempfile::TempDir;
    use tokio::io::{AsyncWriteExt, DuplexStream, duplex};

    struct Harness {
        handler: ProtocolHandler,
        peer: CommandReader,
        peer_stream_writer: tokio::io::WriteHalf<DuplexStream>,
        _dir: TempDir,
    }

    async fn harness() -> Harness {
        let dir = TempDir::new().unwrap();
        let config = ServerConfig {
            server_root: dir.path().display().to_string(),
            max_upload_size_mb: 1,
            ..ServerConfig::default()
        };
        let context = Arc::new(ServerContext::new(config));
        let (server_side, client_side) = duplex(64 * 1024);
        let (reader, writer) = framed(server_side, 1024);
        let id = context.registry.register(writer.clone(), "test").await;
        let handler = ProtocolHandler::new(id, reader, writer, context);

        let (client_read, client_write) = tokio::io::split(client_side);
        Harness {
            handler,
            peer: CommandReader::new(Box::new(client_read), 1024),
            peer_stream_writer: client_write,
            _dir: dir,
        }
    }

    impl Harness {
        async fn send(&mut self, line: &str) -> CommandStatus {
            let command = parse_command(line);
            self.handler.handle(command, line).await.unwrap()
        }

        async fn expect(&mut self, expected: &str) {
            let line = self.peer.read_command().await.unwrap();
            assert_eq!(line.as_deref(), Some(expected));
        }

        async fn login(&mut self) {
            self.send("LOGIN|user1|1234").await;
            self.expect("LOGIN-SUCCESS").await;
        }
    }

    #[tokio::test]
    async fn login_success_and_failure() {
        let mut h = harness().await;

        h.send("LOGIN|user1|wrong").await;
        h.expect("LOGIN-FAILED").await;
        assert!(h.handler.state().is_unauthenticated());

        h.login().await;
        assert_eq!(h.handler.state().username(), Some("user1"));

        // A second LOGIN is out of state
        h.send("LOGIN|user2|1234").await;
        h.expect("ERROR|Unknown command: LOGIN|user2|1234").await;
        assert_eq!(h.handler.state().username(), Some("user1"));
    }

    #[tokio::test]
    async fn commands_before_login_are_rejected() {
        let mut h = harness().await;
        for line in ["LIST", "CHAT|hi", "DOWNLOAD|a.txt", "UPLOAD_REQUEST|a.txt|1", "UPLOAD_START"] {
            h.send(line).await;
            h.expect(&format!("ERROR|Unknown command: {line}")).await;
        }
        assert!(h.handler.state().is_unauthenticated());
    }

    #[tokio::test]
    async fn malformed_input_keeps_connection_open() {
        let mut h = harness().await;
        h.login().await;

        for line in ["UPLOAD_REQUEST|a.txt|abc", "UPLOAD_REQUEST|a.txt", "DOWNLOAD", "BOGUS", ""] {
            assert_eq!(h.send(line).await, CommandStatus::Continue);
            h.expect(&format!("ERROR|Unknown command: {line}")).await;
        }
        assert!(h.handler.state().is_authenticated());
    }

    #[tokio::test]
    async fn upload_handshake_then_list_and_download() {
        let mut h = harness().await;
        h.login().await;

        h.send("LIST").await;
        h.expect("FILE_LIST|").await;

        h.send("UPLOAD_REQUEST|a.txt|5").await;
        h.expect("UPLOAD_READY").await;
        assert_eq!(
            h.handler.state().pending_upload(),
            Some(&PendingUpload {
                filename: "a.txt".into(),
                length: 5
            })
        );

        h.peer_stream_writer.write_all(b"hello").await.unwrap();
        h.send("UPLOAD_START").await;
        h.expect("UPLOAD_SUCCESS|a.txt").await;
        assert!(h.handler.state().is_authenticated());

        h.send("LIST").await;
        h.expect("FILE_LIST|a.txt").await;

        h.send("DOWNLOAD|a.txt").await;
        h.expect("FILE_INFO|a.txt|5").await;
        let body = h.peer.raw().read_exact_or_short(5, 16).await;
        assert_eq!(body.bytes, b"hello");
    }

    #[tokio::test]
    async fn upload_of_existing_name_is_denied() {
        let mut h = harness().await;
        h.handler
            .context
            .store
            .store_file("a.txt", b"original")
            .await
            .unwrap();
        h.login().await;

        h.send("UPLOAD_REQUEST|a.txt|3").await;
        h.expect("UPLOAD_DENIED|File already exists.").await;
        assert!(h.handler.state().is_authenticated());
        assert_eq!(
            h.handler.context.store.read_file("a.txt").await.unwrap(),
            b"original"
        );
    }

    #[tokio::test]
    async fn upload_denials_for_name_and_size() {
        let mut h = harness().await;
        h.login().await;

        h.send("UPLOAD_REQUEST|../x|3").await;
        h.expect("UPLOAD_DENIED|Invalid file name.").await;

        h.send("UPLOAD_REQUEST|big.bin|1048577").await;
        h.expect("UPLOAD_DENIED|File too large.").await;
        assert!(h.handler.state().is_authenticated());
    }

    #[tokio::test]
    async fn upload_pending_only_accepts_start_failed_or_exit() {
        let mut h = harness().await;
        h.login().await;

        h.send("UPLOAD_REQUEST|a.txt|5").await;
        h.expect("UPLOAD_READY").await;

        h.send("LIST").await;
        h.expect("ERROR|Unknown command: LIST").await;
        assert!(h.handler.state().is_upload_pending());

        h.send("UPLOAD_FAILED|a.txt").await;
        assert!(h.handler.state().is_authenticated());
        assert_eq!(h.handler.state().pending_upload(), None);

        h.send("UPLOAD_START").await;
        h.expect("ERROR|Unknown command: UPLOAD_START").await;
    }

    #[tokio::test]
    async fn short_upload_is_abandoned_silently() {
        let mut h = harness().await;
        h.login().await;

        h.send("UPLOAD_REQUEST|a.txt|10").await;
        h.expect("UPLOAD_READY").await;

        h.peer_stream_writer.write_all(b"abc").await.unwrap();
        h.peer_stream_writer.shutdown().await.unwrap();
        h.send("UPLOAD_START").await;

        assert!(h.handler.state().is_authenticated());
        assert!(!h.handler.context.store.file_exists("a.txt").await.unwrap());
    }

    #[tokio::test]
    async fn missing_download_has_no_raw_phase() {
        let mut h = harness().await;
        h.login().await;

        h.send("DOWNLOAD|missing.txt").await;
        h.expect("ERROR|File not found.").await;
        h.send("LIST").await;
        h.expect("FILE_LIST|").await;
    }

    #[tokio::test]
    async fn exit_closes_from_any_state() {
        let mut h = harness().await;
        assert_eq!(h.send("EXIT").await, CommandStatus::CloseConnection);
        assert_eq!(h.handler.state(), &ProtocolState::Exited);
    }
}
