// End-to-end tests against a server bound on 127.0.0.1

use crate::core_storage::FileStore;
use crate::server::{Server, Services};
use crate::session::Session;
use crate::Config;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
const IO_TIMEOUT: Duration = Duration::from_secs(10);

struct TestServer {
    control: SocketAddr,
    help: SocketAddr,
    services: Services,
    _dir: TempDir,
}

impl TestServer {
    async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    async fn start_with(tweak: impl FnOnce(&mut Config)) -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.server.bind_address = String::from("127.0.0.1");
        config.server.listen_port = 0;
        config.server.help_port = 0;
        config.server.storage_root = dir.path().join("files");
        config.server.credentials_file = dir.path().join("users.json");
        config.server.metadata_file = dir.path().join("filesystem.json");
        config.server.bcrypt_cost = 4;
        tweak(&mut config);

        let services = Services::from_config(config).unwrap();
        let server = Server::bind(services.clone()).await.unwrap();
        let control = server.control_addr().unwrap();
        let help = server.help_addr().unwrap();
        tokio::spawn(server.serve());

        Self {
            control,
            help,
            services,
            _dir: dir,
        }
    }

    async fn with_user(login: &str, password: &str) -> Self {
        let server = Self::start().await;
        server.services.accounts.register(login, password).await.unwrap();
        server
    }

    /// Session of the only control connection of this server.
    async fn session(&self) -> Arc<Session> {
        let client = self
            .services
            .registry
            .find_by_ip(LOCALHOST)
            .await
            .expect("a registered client");
        Arc::clone(&client.session)
    }

    async fn wait_until_empty(&self) {
        for _ in 0..200 {
            if self.services.registry.len().await == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("client was never unregistered");
    }
}

struct Control {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Control {
    async fn connect(server: &TestServer) -> Self {
        let stream = TcpStream::connect(server.control).await.unwrap();
        let (reader, writer) = stream.into_split();
        let mut control = Self {
            reader: BufReader::new(reader),
            writer,
        };
        let welcome = control.read_reply().await;
        assert!(welcome.starts_with("220 "), "{}", welcome);
        control
    }

    async fn login(server: &TestServer, login: &str, password: &str) -> Self {
        let mut control = Self::connect(server).await;
        assert_eq!(code(&control.cmd(&format!("USER {}", login)).await), 331);
        assert_eq!(code(&control.cmd(&format!("PASS {}", password)).await), 230);
        control
    }

    /// Reads one reply: the status line, then the blank separator line.
    async fn read_reply(&mut self) -> String {
        let mut status = String::new();
        tokio::time::timeout(IO_TIMEOUT, self.reader.read_line(&mut status))
            .await
            .expect("reply in time")
            .unwrap();
        let mut blank = String::new();
        tokio::time::timeout(IO_TIMEOUT, self.reader.read_line(&mut blank))
            .await
            .expect("separator in time")
            .unwrap();
        assert_eq!(blank, "\r\n");
        status.trim_end().to_string()
    }

    async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{}\r\n", line).as_bytes())
            .await
            .unwrap();
    }

    async fn cmd(&mut self, line: &str) -> String {
        self.send(line).await;
        self.read_reply().await
    }

    /// Sends PASV and connects to the announced port.
    async fn open_data_channel(&mut self) -> TcpStream {
        let reply = self.cmd("PASV").await;
        assert_eq!(code(&reply), 227, "{}", reply);
        TcpStream::connect(parse_pasv(&reply)).await.unwrap()
    }

    async fn expect_eof(&mut self) {
        let mut rest = String::new();
        let n = tokio::time::timeout(IO_TIMEOUT, self.reader.read_line(&mut rest))
            .await
            .expect("eof in time")
            .unwrap();
        assert_eq!(n, 0, "unexpected data: {}", rest);
    }
}

fn code(reply: &str) -> u16 {
    reply[..3].parse().unwrap()
}

fn parse_pasv(reply: &str) -> SocketAddr {
    let start = reply.find('(').unwrap() + 1;
    let end = reply.find(')').unwrap();
    let numbers: Vec<u16> = reply[start..end]
        .split(',')
        .map(|n| n.parse().unwrap())
        .collect();
    assert_eq!(numbers.len(), 6);
    let ip = Ipv4Addr::new(
        numbers[0] as u8,
        numbers[1] as u8,
        numbers[2] as u8,
        numbers[3] as u8,
    );
    SocketAddr::new(IpAddr::V4(ip), numbers[4] * 256 + numbers[5])
}

async fn read_all(mut stream: TcpStream) -> Vec<u8> {
    let mut data = Vec::new();
    tokio::time::timeout(IO_TIMEOUT, stream.read_to_end(&mut data))
        .await
        .expect("data in time")
        .unwrap();
    data
}

#[tokio::test]
async fn test_login_pasv_list_scenario() {
    let server = TestServer::with_user("alice", "correctpw").await;
    let mut control = Control::connect(&server).await;

    assert_eq!(code(&control.cmd("USER alice").await), 331);
    assert_eq!(code(&control.cmd("PASS wrongpw").await), 530);
    assert_eq!(code(&control.cmd("PASS correctpw").await), 230);

    let reply = control.cmd("PASV").await;
    assert_eq!(code(&reply), 227);
    assert!(reply.contains("Entering Passive Mode (127,0,0,1,"), "{}", reply);
    let data = TcpStream::connect(parse_pasv(&reply)).await.unwrap();

    assert_eq!(code(&control.cmd("LIST").await), 150);
    let listing = read_all(data).await;
    assert_eq!(listing, b"226 Directory is empty.\r\n\r\n");
    assert_eq!(code(&control.read_reply().await), 226);

    let session = server.session().await;
    let state = session.lock().await;
    assert!(!state.passive);
    assert!(state.dtp_connection.is_none());
}

#[tokio::test]
async fn test_list_sends_one_line_per_file() {
    let server = TestServer::with_user("alice", "pw").await;
    server.services.files.write("b.txt", b"b").unwrap();
    server.services.files.write("a.txt", b"a").unwrap();
    let mut control = Control::login(&server, "alice", "pw").await;

    let data = control.open_data_channel().await;
    assert_eq!(code(&control.cmd("LIST").await), 150);
    let listing = String::from_utf8(read_all(data).await).unwrap();
    assert_eq!(
        listing,
        "-rw-r--r-- 1 owner group 0 Jan 01 00:00 a.txt\r\n\
         -rw-r--r-- 1 owner group 0 Jan 01 00:00 b.txt\r\n"
    );
    assert_eq!(code(&control.read_reply().await), 226);
}

#[tokio::test]
async fn test_pass_requires_prior_user() {
    let server = TestServer::with_user("alice", "correctpw").await;
    let mut control = Control::connect(&server).await;

    assert_eq!(code(&control.cmd("PASS correctpw").await), 503);

    // An unknown login clears the previous pending one.
    assert_eq!(code(&control.cmd("USER alice").await), 331);
    assert_eq!(code(&control.cmd("USER mallory").await), 332);
    assert_eq!(code(&control.cmd("PASS correctpw").await), 503);
    assert!(!server.session().await.is_authenticated().await);
}

#[tokio::test]
async fn test_argument_and_state_errors() {
    let server = TestServer::with_user("alice", "pw").await;
    let mut control = Control::connect(&server).await;

    assert_eq!(code(&control.cmd("USER").await), 501);
    assert_eq!(code(&control.cmd("USER alice bob").await), 501);
    assert_eq!(code(&control.cmd("USER alice").await), 331);
    assert_eq!(code(&control.cmd("PASS").await), 501);
    assert_eq!(code(&control.cmd("PASS pw").await), 230);
    assert_eq!(code(&control.cmd("USER alice").await), 435);
    assert_eq!(code(&control.cmd("PASS pw").await), 435);
    assert_eq!(code(&control.cmd("RETR").await), 501);
    assert_eq!(code(&control.cmd("STOR a b").await), 501);
}

#[tokio::test]
async fn test_utility_commands() {
    let server = TestServer::start().await;
    let mut control = Control::connect(&server).await;

    assert_eq!(control.cmd("echo hello   world").await, "200 hello world");
    assert_eq!(control.cmd("HLLO").await, "200 Hello");
    assert_eq!(code(&control.cmd("NOPE").await), 502);
    assert_eq!(
        control.cmd("help").await,
        "200 Available commands: help, echo, hllo, rgsr, user, pass, quit"
    );
}

#[tokio::test]
async fn test_unauthenticated_pasv_is_rejected() {
    let server = TestServer::start().await;
    let mut control = Control::connect(&server).await;

    assert_eq!(code(&control.cmd("PASV").await), 503);
    let session = server.session().await;
    assert!(session.lock().await.dtp_listener.is_none());
}

#[tokio::test]
async fn test_transfer_commands_require_login() {
    let server = TestServer::start().await;
    let mut control = Control::connect(&server).await;

    assert_eq!(code(&control.cmd("LIST").await), 530);
    assert_eq!(code(&control.cmd("RETR a.txt").await), 530);
    assert_eq!(code(&control.cmd("STOR a.txt").await), 530);
}

#[tokio::test]
async fn test_list_without_pasv_fails() {
    let server = TestServer::with_user("alice", "pw").await;
    let mut control = Control::login(&server, "alice", "pw").await;

    assert_eq!(code(&control.cmd("LIST").await), 527);
    assert_eq!(code(&control.cmd("HLLO").await), 200);
}

#[tokio::test]
async fn test_second_pasv_keeps_one_listener() {
    let server = TestServer::with_user("alice", "pw").await;
    let mut control = Control::login(&server, "alice", "pw").await;
    let session = server.session().await;

    assert_eq!(code(&control.cmd("PASV").await), 227);
    assert_eq!(code(&control.cmd("PASV").await), 527);
    assert!(session.lock().await.dtp_listener.is_some());

    // Once connected, a new PASV drops the old channel before opening another.
    let listener_addr = session.lock().await.dtp_listener.as_ref().unwrap().local_addr;
    let data = TcpStream::connect(listener_addr).await.unwrap();
    for _ in 0..200 {
        if session.lock().await.passive {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(code(&control.cmd("PASV").await), 227);
    {
        let state = session.lock().await;
        assert!(!state.passive);
        assert!(state.dtp_connection.is_none());
        assert!(state.dtp_listener.is_some());
    }
    assert!(read_all(data).await.is_empty());
}

#[tokio::test]
async fn test_stor_then_retr_round_trip() {
    let server = TestServer::with_user("alice", "pw").await;
    let mut control = Control::login(&server, "alice", "pw").await;
    let content: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();

    let mut data = control.open_data_channel().await;
    assert_eq!(code(&control.cmd("STOR blob.bin").await), 150);
    data.write_all(&content).await.unwrap();
    data.shutdown().await.unwrap();
    drop(data);
    assert_eq!(
        control.read_reply().await,
        format!("226 Transfer complete. Total bytes received: {}.", content.len())
    );

    let data = control.open_data_channel().await;
    assert_eq!(code(&control.cmd("RETR blob.bin").await), 150);
    assert_eq!(read_all(data).await, content);
    assert_eq!(
        control.read_reply().await,
        format!("226 Transfer complete. Total bytes sent: {}.", content.len())
    );

    let document = server.services.index.load().unwrap();
    assert_eq!(
        document.root.children["blob.bin"].size,
        content.len() as u64
    );
}

#[tokio::test]
async fn test_retr_missing_file_keeps_data_channel() {
    let server = TestServer::with_user("alice", "pw").await;
    server.services.files.write("present.txt", b"here").unwrap();
    let mut control = Control::login(&server, "alice", "pw").await;

    let data = control.open_data_channel().await;
    assert_eq!(code(&control.cmd("RETR missing.txt").await), 550);
    assert_eq!(code(&control.cmd("RETR present.txt").await), 150);
    assert_eq!(read_all(data).await, b"here");
    assert_eq!(code(&control.read_reply().await), 226);
}

#[tokio::test]
async fn test_stor_timeout_resets_data_channel() {
    let server = TestServer::start_with(|config| config.server.stor_read_timeout_secs = 1).await;
    server.services.accounts.register("alice", "pw").await.unwrap();
    let mut control = Control::login(&server, "alice", "pw").await;

    let mut data = control.open_data_channel().await;
    assert_eq!(code(&control.cmd("STOR partial.bin").await), 150);
    data.write_all(b"only part of it").await.unwrap();

    let reply = control.read_reply().await;
    assert_eq!(reply, "426 Data connection timed out.");

    let session = server.session().await;
    {
        let state = session.lock().await;
        assert!(!state.passive);
        assert!(state.dtp_connection.is_none());
    }
    assert!(server.services.files.read("partial.bin").is_err());
    assert_eq!(code(&control.cmd("STOR again.bin").await), 527);
}

#[tokio::test]
async fn test_duplicate_registration() {
    let server = TestServer::start().await;
    let mut control = Control::connect(&server).await;

    assert_eq!(
        control.cmd("RGSR alice pw1").await,
        "200 Successfully registered. Your login: alice"
    );
    let stored = std::fs::read_to_string(&server.services.config.server.credentials_file).unwrap();

    let reply = control.cmd("RGSR alice pw2").await;
    assert_eq!(code(&reply), 530);
    assert!(reply.contains("Username exists"));
    assert_eq!(
        std::fs::read_to_string(&server.services.config.server.credentials_file).unwrap(),
        stored
    );

    assert_eq!(code(&control.cmd("RGSR alice").await), 501);
    assert_eq!(code(&control.cmd("USER alice").await), 331);
    assert_eq!(code(&control.cmd("PASS pw2").await), 530);
    assert_eq!(code(&control.cmd("PASS pw1").await), 230);
}

#[tokio::test]
async fn test_quit_closes_everything() {
    let server = TestServer::with_user("alice", "pw").await;
    let mut control = Control::login(&server, "alice", "pw").await;
    let mut data = control.open_data_channel().await;

    // Let the accept task hand the data connection to the session.
    let session = server.session().await;
    for _ in 0..200 {
        if session.lock().await.passive {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(control.cmd("QUIT").await, "221 Connection closed.");
    control.expect_eof().await;
    server.wait_until_empty().await;

    let mut rest = Vec::new();
    let n = tokio::time::timeout(IO_TIMEOUT, data.read_to_end(&mut rest))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(n, 0);
    assert!(!session.lock().await.authenticated);
}

#[tokio::test]
async fn test_double_quit_is_harmless() {
    let server = TestServer::start().await;
    let mut control = Control::connect(&server).await;

    control.send("QUIT\r\nQUIT").await;
    assert_eq!(code(&control.read_reply().await), 221);
    control.expect_eof().await;
    server.wait_until_empty().await;

    let mut again = Control::connect(&server).await;
    assert_eq!(code(&again.cmd("HLLO").await), 200);
}

#[tokio::test]
async fn test_help_channel_tracks_login() {
    let server = TestServer::with_user("alice", "pw").await;
    let mut control = Control::connect(&server).await;

    let help = TcpStream::connect(server.help).await.unwrap();
    let mut help = BufReader::new(help).lines();
    let first = tokio::time::timeout(IO_TIMEOUT, help.next_line())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.as_deref(), Some("help echo hllo rgsr user pass quit"));

    assert_eq!(code(&control.cmd("USER alice").await), 331);
    assert_eq!(code(&control.cmd("PASS pw").await), 230);
    let refreshed = tokio::time::timeout(IO_TIMEOUT, help.next_line())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        refreshed.as_deref(),
        Some("help echo hllo rgsr user pass quit pasv list retr stor")
    );

    assert_eq!(code(&control.cmd("QUIT").await), 221);
    let closed = tokio::time::timeout(IO_TIMEOUT, help.next_line())
        .await
        .unwrap()
        .unwrap();
    assert!(closed.is_none());
}

async fn wait_for_passive(session: &Session) {
    for _ in 0..200 {
        if session.lock().await.passive {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("data connection was never accepted");
}

/// Connects to the data port, waits for the server to accept, then resets the
/// connection so the server's next write fails.
async fn reset_data_channel(control: &mut Control, server: &TestServer) {
    let data = control.open_data_channel().await;
    wait_for_passive(&*server.session().await).await;
    data.set_linger(Some(Duration::ZERO)).unwrap();
    drop(data);
    tokio::time::sleep(Duration::from_millis(200)).await;
}

#[tokio::test]
async fn test_pasv_again_after_missed_data_connection() {
    let server =
        TestServer::start_with(|config| config.server.data_connect_grace_ms = 50).await;
    server.services.accounts.register("alice", "pw").await.unwrap();
    let mut control = Control::login(&server, "alice", "pw").await;

    let first = control.cmd("PASV").await;
    assert_eq!(code(&first), 227);
    assert_eq!(
        control.cmd("LIST").await,
        "425 No data connection. Re-enter Passive Mode."
    );

    let second = control.cmd("PASV").await;
    assert_eq!(code(&second), 227);
    let data = TcpStream::connect(parse_pasv(&second)).await.unwrap();
    assert_eq!(code(&control.cmd("LIST").await), 150);
    assert_eq!(read_all(data).await, b"226 Directory is empty.\r\n\r\n");
    assert_eq!(code(&control.read_reply().await), 226);

    // The abandoned listener is gone.
    if parse_pasv(&first) != parse_pasv(&second) {
        assert!(TcpStream::connect(parse_pasv(&first)).await.is_err());
    }
}

#[tokio::test]
async fn test_overlong_line_is_rejected() {
    let server = TestServer::start().await;
    let mut control = Control::connect(&server).await;

    let long = format!("ECHO {}", "a".repeat(10_000));
    assert_eq!(control.cmd(&long).await, "501 Command line too long.");
    assert_eq!(code(&control.cmd("HLLO").await), 200);

    // No newline at all: the reply comes without waiting for the end of the line.
    control
        .writer
        .write_all(&vec![b'x'; 256 * 1024])
        .await
        .unwrap();
    assert_eq!(code(&control.read_reply().await), 501);
    control.send("").await;
    assert_eq!(control.cmd("HLLO").await, "200 Hello");
}

#[tokio::test]
async fn test_list_to_reset_data_channel() {
    let server = TestServer::with_user("alice", "pw").await;
    server.services.files.write("a.txt", b"a").unwrap();
    let mut control = Control::login(&server, "alice", "pw").await;

    reset_data_channel(&mut control, &server).await;
    assert_eq!(code(&control.cmd("LIST").await), 150);
    assert_eq!(code(&control.read_reply().await), 426);

    let session = server.session().await;
    {
        let state = session.lock().await;
        assert!(!state.passive);
        assert!(state.dtp_connection.is_none());
    }
    assert_eq!(code(&control.cmd("LIST").await), 527);
}

#[tokio::test]
async fn test_retr_to_reset_data_channel() {
    let server = TestServer::with_user("alice", "pw").await;
    server
        .services
        .files
        .write("big.bin", &vec![7u8; 4 * 1024 * 1024])
        .unwrap();
    let mut control = Control::login(&server, "alice", "pw").await;

    reset_data_channel(&mut control, &server).await;
    assert_eq!(code(&control.cmd("RETR big.bin").await), 150);
    assert_eq!(code(&control.read_reply().await), 426);

    let session = server.session().await;
    let state = session.lock().await;
    assert!(!state.passive);
    assert!(state.dtp_connection.is_none());
}

#[tokio::test]
async fn test_stor_write_failure_is_reported() {
    let server = TestServer::with_user("alice", "pw").await;
    std::fs::create_dir(server.services.config.server.storage_root.join("taken")).unwrap();
    let mut control = Control::login(&server, "alice", "pw").await;

    let mut data = control.open_data_channel().await;
    assert_eq!(code(&control.cmd("STOR taken").await), 150);
    data.write_all(b"payload").await.unwrap();
    data.shutdown().await.unwrap();
    drop(data);

    assert_eq!(control.read_reply().await, "550 Could not write file: taken");
    let session = server.session().await;
    assert!(!session.lock().await.passive);
    assert_eq!(code(&control.cmd("HLLO").await), 200);
}
