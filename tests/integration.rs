use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use rax_room_server::client::UploadOutcome;
use rax_room_server::error::ClientError;
use rax_room_server::{RoomClient, Server, ServerConfig, ServerContext};

struct TestServer {
    addr: SocketAddr,
    context: Arc<ServerContext>,
    server_dir: TempDir,
    client_dir: TempDir,
}

// Start a server on an ephemeral port with temporary stores
async fn start_test_server() -> TestServer {
    let server_dir = TempDir::new().unwrap();
    let client_dir = TempDir::new().unwrap();
    let config = ServerConfig {
        port: 0,
        server_root: server_dir.path().display().to_string(),
        ..ServerConfig::default()
    };
    let server = Server::bind(config).await.unwrap();
    let addr = server.local_addr().unwrap();
    let context = Arc::clone(server.context());
    tokio::spawn(server.start());
    TestServer {
        addr,
        context,
        server_dir,
        client_dir,
    }
}

impl TestServer {
    async fn client(&self, username: &str) -> RoomClient {
        let mut client = RoomClient::connect(self.addr, self.client_dir.path())
            .await
            .unwrap();
        assert!(client.login(username, "1234").await.unwrap());
        client
    }

    fn client_file(&self, username: &str, name: &str) -> std::path::PathBuf {
        self.client_dir.path().join(username).join(name)
    }

    async fn wait_for_sessions(&self, expected: usize) {
        for _ in 0..200 {
            if self.context.registry.len().await == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "expected {} sessions, found {}",
            expected,
            self.context.registry.len().await
        );
    }
}

/// Raw line-level connection for checking exact wire output.
struct RawConnection {
    lines: BufReader<OwnedReadHalf>,
    out: OwnedWriteHalf,
}

impl RawConnection {
    async fn open(addr: SocketAddr) -> Self {
        let (read_half, out) = TcpStream::connect(addr).await.unwrap().into_split();
        Self {
            lines: BufReader::new(read_half),
            out,
        }
    }

    async fn send(&mut self, line: &str) {
        self.out
            .write_all(format!("{line}\n").as_bytes())
            .await
            .unwrap();
    }

    async fn send_raw(&mut self, bytes: &[u8]) {
        self.out.write_all(bytes).await.unwrap();
    }

    async fn recv(&mut self) -> Option<String> {
        let mut line = String::new();
        let n = self.lines.read_line(&mut line).await.unwrap();
        if n == 0 {
            return None;
        }
        Some(line.trim_end_matches('\n').to_string())
    }

    async fn roundtrip(&mut self, line: &str) -> String {
        self.send(line).await;
        self.recv().await.unwrap()
    }
}

async fn write_local(path: &Path, bytes: &[u8]) {
    tokio::fs::write(path, bytes).await.unwrap();
}

#[tokio::test]
async fn test_login_responses() {
    let server = start_test_server().await;
    let mut conn = RawConnection::open(server.addr).await;

    assert_eq!(conn.roundtrip("LOGIN|user1|nope").await, "LOGIN-FAILED");
    assert_eq!(conn.roundtrip("LOGIN|ghost|1234").await, "LOGIN-FAILED");
    assert_eq!(conn.roundtrip("LIST").await, "ERROR|Unknown command: LIST");
    assert_eq!(conn.roundtrip("LOGIN|user1|1234").await, "LOGIN-SUCCESS");
    assert_eq!(conn.roundtrip("LIST").await, "FILE_LIST|");
}

#[tokio::test]
async fn test_chat_reaches_others_but_not_sender() {
    let server = start_test_server().await;
    let mut alice = server.client("user1").await;
    let mut bob = server.client("user2").await;
    let mut carol = server.client("user3").await;

    alice.chat("hi").await.unwrap();

    assert_eq!(bob.next_chat().await.unwrap().as_deref(), Some("user1: hi"));
    assert_eq!(carol.next_chat().await.unwrap().as_deref(), Some("user1: hi"));

    // Anything the sender reads next must be its own response, not an echo
    assert_eq!(alice.list().await.unwrap(), Vec::<String>::new());
    bob.chat("hey").await.unwrap();
    assert_eq!(alice.next_chat().await.unwrap().as_deref(), Some("user2: hey"));
}

#[tokio::test]
async fn test_chat_wire_format() {
    let server = start_test_server().await;
    let mut sender = RawConnection::open(server.addr).await;
    let mut receiver = RawConnection::open(server.addr).await;
    assert_eq!(sender.roundtrip("LOGIN|user1|1234").await, "LOGIN-SUCCESS");
    assert_eq!(receiver.roundtrip("LOGIN|user2|1234").await, "LOGIN-SUCCESS");

    sender.send("CHAT|hi").await;
    assert_eq!(receiver.recv().await.as_deref(), Some("CHAT|user1: hi"));
}

#[tokio::test]
async fn test_disconnected_peer_does_not_block_broadcast() {
    let server = start_test_server().await;
    let mut alice = server.client("user1").await;
    let dropped = server.client("user2").await;
    let mut carol = server.client("user3").await;

    drop(dropped);
    alice.chat("anyone?").await.unwrap();

    assert_eq!(carol.next_chat().await.unwrap().as_deref(), Some("user1: anyone?"));
    server.wait_for_sessions(2).await;
}

#[tokio::test]
async fn test_upload_scenario_over_the_wire() {
    let server = start_test_server().await;
    let mut conn = RawConnection::open(server.addr).await;
    assert_eq!(conn.roundtrip("LOGIN|user1|1234").await, "LOGIN-SUCCESS");

    assert_eq!(conn.roundtrip("UPLOAD_REQUEST|a.txt|5").await, "UPLOAD_READY");
    conn.send("UPLOAD_START").await;
    conn.send_raw(b"hello").await;
    assert_eq!(conn.recv().await.as_deref(), Some("UPLOAD_SUCCESS|a.txt"));

    assert_eq!(conn.roundtrip("LIST").await, "FILE_LIST|a.txt");
    assert_eq!(
        tokio::fs::read(server.server_dir.path().join("a.txt")).await.unwrap(),
        b"hello"
    );

    assert_eq!(
        conn.roundtrip("UPLOAD_REQUEST|a.txt|3").await,
        "UPLOAD_DENIED|File already exists."
    );
}

#[tokio::test]
async fn test_download_missing_file() {
    let server = start_test_server().await;
    let mut conn = RawConnection::open(server.addr).await;
    assert_eq!(conn.roundtrip("LOGIN|user1|1234").await, "LOGIN-SUCCESS");

    assert_eq!(
        conn.roundtrip("DOWNLOAD|missing.txt").await,
        "ERROR|File not found."
    );
    // The next line is a normal response, so no raw bytes followed
    assert_eq!(conn.roundtrip("LIST").await, "FILE_LIST|");
}

#[tokio::test]
async fn test_download_wire_format() {
    let server = start_test_server().await;
    tokio::fs::write(server.server_dir.path().join("b.bin"), [0u8, 10, 255, 10])
        .await
        .unwrap();

    let mut conn = RawConnection::open(server.addr).await;
    assert_eq!(conn.roundtrip("LOGIN|user1|1234").await, "LOGIN-SUCCESS");
    assert_eq!(conn.roundtrip("DOWNLOAD|b.bin").await, "FILE_INFO|b.bin|4");

    let mut body = [0u8; 4];
    conn.lines.read_exact(&mut body).await.unwrap();
    assert_eq!(body, [0u8, 10, 255, 10]);

    conn.send("EXIT").await;
    assert_eq!(conn.recv().await, None);
}

#[tokio::test]
async fn test_round_trip_is_byte_identical() {
    let server = start_test_server().await;
    let mut uploader = server.client("user1").await;
    let mut downloader = server.client("user2").await;

    let sizes = [0usize, 1, 4095, 4096, 70_000];
    for size in sizes {
        let name = format!("file_{size}.bin");
        let content: Vec<u8> = (0..size).map(|i| (i * 31 % 251) as u8).collect();
        write_local(&server.client_file("user1", &name), &content).await;

        assert_eq!(
            uploader.upload(&name).await.unwrap(),
            UploadOutcome::Uploaded(name.clone())
        );

        let result = downloader.download(&name).await.unwrap();
        assert_eq!(result.file.length, size as u64);
        let fetched = tokio::fs::read(server.client_file("user2", &name)).await.unwrap();
        assert_eq!(fetched, content);
    }

    let listed = downloader.list().await.unwrap();
    assert_eq!(listed.len(), sizes.len());
}

#[tokio::test]
async fn test_duplicate_upload_never_overwrites() {
    let server = start_test_server().await;
    let mut first = server.client("user1").await;
    let mut second = server.client("user2").await;

    write_local(&server.client_file("user1", "song.mp3"), b"original").await;
    write_local(&server.client_file("user2", "song.mp3"), b"impostor!").await;

    assert_eq!(
        first.upload("song.mp3").await.unwrap(),
        UploadOutcome::Uploaded("song.mp3".into())
    );
    assert_eq!(
        second.upload("song.mp3").await.unwrap(),
        UploadOutcome::Denied("File already exists.".into())
    );
    assert_eq!(
        tokio::fs::read(server.server_dir.path().join("song.mp3")).await.unwrap(),
        b"original"
    );
}

#[tokio::test]
async fn test_download_error_surfaces_to_client() {
    let server = start_test_server().await;
    let mut client = server.client("user1").await;

    match client.download("nothing.txt").await {
        Err(ClientError::Server(message)) => assert_eq!(message, "File not found."),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_lines_keep_session_alive() {
    let server = start_test_server().await;
    let mut conn = RawConnection::open(server.addr).await;
    assert_eq!(conn.roundtrip("LOGIN|user1|1234").await, "LOGIN-SUCCESS");

    assert_eq!(
        conn.roundtrip("UPLOAD_REQUEST|a.txt|lots").await,
        "ERROR|Unknown command: UPLOAD_REQUEST|a.txt|lots"
    );
    assert_eq!(conn.roundtrip("chat|lower").await, "ERROR|Unknown command: chat|lower");

    let long_line = format!("CHAT|{}", "x".repeat(10_000));
    assert_eq!(conn.roundtrip(&long_line).await, "ERROR|Command too long.");
    assert_eq!(conn.roundtrip("LIST").await, "FILE_LIST|");
}

#[tokio::test]
async fn test_sessions_unregister_on_every_exit_path() {
    let server = start_test_server().await;

    let graceful = server.client("user1").await;
    let mut abrupt = RawConnection::open(server.addr).await;
    assert_eq!(abrupt.roundtrip("LOGIN|user2|1234").await, "LOGIN-SUCCESS");
    let mut mid_upload = RawConnection::open(server.addr).await;
    assert_eq!(mid_upload.roundtrip("LOGIN|user3|1234").await, "LOGIN-SUCCESS");
    assert_eq!(
        mid_upload.roundtrip("UPLOAD_REQUEST|partial.bin|100").await,
        "UPLOAD_READY"
    );
    server.wait_for_sessions(3).await;

    graceful.exit().await.unwrap();
    drop(abrupt);
    mid_upload.send("UPLOAD_START").await;
    mid_upload.send_raw(b"only ten b").await;
    drop(mid_upload);

    server.wait_for_sessions(0).await;
    assert!(!server.server_dir.path().join("partial.bin").exists());
}
