use super::{ProtocolError, ProtocolResult, TIMEOUT};
use crate::storage::FtpCredentials;
use ssh2::Session;
use std::{
    io::Read,
    net::{TcpStream, ToSocketAddrs},
    path::Path,
    time::Duration,
};
use suppaftp::FtpStream;

/// File access over FTP or SFTP, for servers without the plugin
#[derive(Debug, Clone)]
pub struct FtpProtocol {
    host: String,
    port: u16,
    credentials: FtpCredentials,
    secure: bool,
    /// Bounds every socket read and write, and each whole operation
    timeout: Duration,
}

impl FtpProtocol {
    pub fn ftp(host: &str, port: u16, credentials: FtpCredentials) -> Self {
        Self {
            host: host.to_string(),
            port,
            credentials,
            secure: false,
            timeout: TIMEOUT,
        }
    }

    pub fn sftp(host: &str, port: u16, credentials: FtpCredentials) -> Self {
        Self {
            secure: true,
            ..Self::ftp(host, port, credentials)
        }
    }

    #[cfg(test)]
    fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub(super) async fn get_file(&self, remote_path: &str) -> ProtocolResult<Vec<u8>> {
        let remote_path = remote_path.to_string();

        self.blocking(move |this| match this.secure {
            true => this.sftp_get(&remote_path),
            false => this.ftp_get(&remote_path),
        })
        .await
    }

    /// Connects and logs in without transferring anything
    pub(super) async fn test(&self) -> ProtocolResult<()> {
        self.blocking(|this| match this.secure {
            true => this.sftp_session().map(|_| ()),
            false => this.ftp_stream()?.quit().map_err(ProtocolError::from),
        })
        .await
    }

    /// Runs `f` on the blocking pool. The sockets time out on their own, the outer
    /// timeout only covers servers that keep trickling data.
    async fn blocking<T: Send + 'static>(
        &self,
        f: impl FnOnce(FtpProtocol) -> ProtocolResult<T> + Send + 'static,
    ) -> ProtocolResult<T> {
        let this = self.clone();
        let task = tokio::task::spawn_blocking(move || f(this));

        match tokio::time::timeout(self.timeout * 3, task).await {
            Ok(result) => result?,
            Err(_) => Err(ProtocolError::Timeout),
        }
    }

    /// A TCP connection whose reads and writes fail after [`Self::timeout`]
    fn tcp_stream(&self) -> ProtocolResult<TcpStream> {
        let tcp = TcpStream::connect_timeout(&self.address()?, self.timeout)?;
        tcp.set_read_timeout(Some(self.timeout))?;
        tcp.set_write_timeout(Some(self.timeout))?;

        Ok(tcp)
    }

    fn ftp_stream(&self) -> ProtocolResult<FtpStream> {
        let mut stream = FtpStream::connect_with_stream(self.tcp_stream()?)?;
        stream.login(&self.credentials.user, &self.credentials.password)?;

        Ok(stream)
    }

    fn ftp_get(&self, remote_path: &str) -> ProtocolResult<Vec<u8>> {
        let mut stream = self.ftp_stream()?;
        let file = stream.retr_as_buffer(remote_path)?.into_inner();

        if let Err(err) = stream.quit() {
            tracing::debug!("Could not close FTP connection: {err}");
        }

        tracing::debug!("Downloaded {remote_path} over FTP");
        Ok(file)
    }

    fn sftp_session(&self) -> ProtocolResult<Session> {
        let tcp = self.tcp_stream()?;

        let mut session = Session::new()?;
        session.set_timeout(u32::try_from(self.timeout.as_millis()).unwrap_or(u32::MAX));
        session.set_tcp_stream(tcp);
        session.handshake()?;
        session.userauth_password(&self.credentials.user, &self.credentials.password)?;

        Ok(session)
    }

    fn sftp_get(&self, remote_path: &str) -> ProtocolResult<Vec<u8>> {
        let session = self.sftp_session()?;
        let mut file = session.sftp()?.open(Path::new(remote_path))?;

        let mut content = Vec::new();
        file.read_to_end(&mut content)?;

        tracing::debug!("Downloaded {remote_path} over SFTP");
        Ok(content)
    }

    fn address(&self) -> ProtocolResult<std::net::SocketAddr> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                ProtocolError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("Could not resolve {}", self.host),
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> FtpCredentials {
        FtpCredentials {
            user: "user".to_string(),
            password: "pass".to_string(),
        }
    }

    #[tokio::test]
    async fn unreachable_ftp_server_fails() {
        // Nothing listens on port 1
        let ftp = FtpProtocol::ftp("127.0.0.1", 1, credentials());

        assert!(ftp.test().await.is_err());
        assert!(ftp.get_file("world/stats/x.json").await.is_err());
    }

    /// Accepts one connection and never writes to it
    async fn stalled_server() -> u16 {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(60)).await;
        });

        port
    }

    #[tokio::test]
    async fn stalled_ftp_server_times_out() {
        let port = stalled_server().await;
        let ftp = FtpProtocol::ftp("127.0.0.1", port, credentials())
            .with_timeout(Duration::from_millis(200));

        let result = tokio::time::timeout(Duration::from_secs(5), ftp.test())
            .await
            .expect("FTP login should give up on a silent server");

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn stalled_sftp_server_times_out() {
        let port = stalled_server().await;
        let sftp = FtpProtocol::sftp("127.0.0.1", port, credentials())
            .with_timeout(Duration::from_millis(200));

        let result = tokio::time::timeout(Duration::from_secs(5), sftp.test())
            .await
            .expect("SSH handshake should give up on a silent server");

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn ftp_login_succeeds() {
        use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (read, mut write) = socket.into_split();
            let mut lines = BufReader::new(read).lines();
            let mut received = vec![];

            write.write_all(b"220 Ready\r\n").await.unwrap();
            for reply in ["331 Password required\r\n", "230 Logged in\r\n", "221 Bye\r\n"] {
                received.push(lines.next_line().await.unwrap().unwrap());
                write.write_all(reply.as_bytes()).await.unwrap();
            }

            received
        });

        let ftp = FtpProtocol::ftp("127.0.0.1", port, credentials())
            .with_timeout(Duration::from_secs(2));
        ftp.test().await.unwrap();

        assert_eq!(
            server.await.unwrap(),
            ["USER user", "PASS pass", "QUIT"]
        );
    }

    #[tokio::test]
    async fn unreachable_sftp_server_fails() {
        let sftp = FtpProtocol::sftp("127.0.0.1", 1, credentials());

        assert!(matches!(sftp.test().await, Err(ProtocolError::Io(_))));
    }
}
