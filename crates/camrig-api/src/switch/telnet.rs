// Telnet CLI driver
//
// Line-oriented sessions against the switch's console CLI: log in, enter
// privileged mode, then exchange one command at a time, waiting for the
// prompt after each. Every wait is bounded by the session's exec timeout.

use std::net::Ipv4Addr;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace, warn};

use super::parse::{self, Prompt, TelnetFilter};
use super::{PortMac, SessionOptions, SwitchDriver, SwitchSession};
use crate::error::Error;

const TELNET_PORT: u16 = 23;
const READ_CHUNK: usize = 4096;

/// Login used for every switch on the rig.
#[derive(Debug, Clone)]
pub struct SwitchCredentials {
    pub username: String,
    pub password: SecretString,
}

/// `SwitchDriver` speaking the switch CLI over telnet.
#[derive(Debug, Clone)]
pub struct TelnetDriver {
    credentials: SwitchCredentials,
    port: u16,
}

impl TelnetDriver {
    pub fn new(credentials: SwitchCredentials) -> Self {
        Self {
            credentials,
            port: TELNET_PORT,
        }
    }

    /// Override the TCP port (lab setups behind a console server).
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    async fn connect(
        &self,
        address: Ipv4Addr,
        options: SessionOptions,
    ) -> Result<TelnetSession, Error> {
        let connect = async {
            let stream = TcpStream::connect((address, self.port))
                .await
                .map_err(|e| Error::Connect {
                    address,
                    reason: e.to_string(),
                })?;
            let mut session = TelnetSession {
                stream,
                address,
                exec_timeout: options.exec_timeout,
                filter: TelnetFilter::default(),
            };
            session.login(&self.credentials).await?;
            Ok::<_, Error>(session)
        };

        tokio::time::timeout(options.timeout, connect)
            .await
            .map_err(|_| Error::Timeout {
                operation: format!("connect to {address}"),
                timeout_secs: options.timeout.as_secs(),
            })?
    }
}

#[async_trait]
impl SwitchDriver for TelnetDriver {
    async fn probe(&self, address: Ipv4Addr, options: SessionOptions) -> bool {
        match self.connect(address, options).await {
            Ok(session) => {
                if let Err(e) = Box::new(session).close().await {
                    debug!(%address, error = %e, "probe logout failed");
                }
                true
            }
            Err(e) => {
                debug!(%address, error = %e, "probe failed");
                false
            }
        }
    }

    async fn open(
        &self,
        address: Ipv4Addr,
        options: SessionOptions,
    ) -> Result<Box<dyn SwitchSession>, Error> {
        let session = self.connect(address, options).await?;
        Ok(Box::new(session))
    }

    async fn change_ip_address(
        &self,
        current: Ipv4Addr,
        vlan: u16,
        new: Ipv4Addr,
        mask: Ipv4Addr,
        options: SessionOptions,
    ) -> Result<(), Error> {
        let mut session = self.connect(current, options).await?;
        session.exec("configure").await?;
        session.exec(&format!("interface vlan {vlan}")).await?;

        // The address change cuts the connection; only push the line out.
        session.send_line(&format!("ip address {new} {mask}")).await?;
        let _ = tokio::time::timeout(Duration::from_secs(2), session.read_prompt()).await;
        debug!(%current, %new, "management address change sent");
        Ok(())
    }
}

/// One logged-in telnet connection.
struct TelnetSession {
    stream: TcpStream,
    address: Ipv4Addr,
    exec_timeout: Duration,
    filter: TelnetFilter,
}

impl TelnetSession {
    async fn login(&mut self, credentials: &SwitchCredentials) -> Result<(), Error> {
        let (prompt, _) = self.read_prompt().await?;
        if prompt == Prompt::User {
            self.send_line(&credentials.username).await?;
            let (next, _) = self.read_prompt().await?;
            if next != Prompt::Password {
                return Err(Error::Login {
                    address: self.address,
                });
            }
        }
        if prompt == Prompt::User || prompt == Prompt::Password {
            self.send_line(credentials.password.expose_secret()).await?;
            let (after, _) = self.read_prompt().await?;
            if after != Prompt::Cli {
                return Err(Error::Login {
                    address: self.address,
                });
            }
        }

        self.exec("enable").await?;
        trace!(address = %self.address, "privileged mode");
        Ok(())
    }

    async fn send_line(&mut self, line: &str) -> Result<(), Error> {
        self.stream.write_all(line.as_bytes()).await?;
        self.stream.write_all(b"\r\n").await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Read until the switch shows a prompt, paging through `--More--`.
    async fn read_prompt(&mut self) -> Result<(Prompt, String), Error> {
        let mut text = String::new();
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            let n = self.stream.read(&mut chunk).await?;
            if n == 0 {
                return Err(Error::SessionClosed {
                    address: self.address,
                });
            }

            let mut replies = Vec::new();
            let clean = self.filter.feed(&chunk[..n], &mut replies);
            if !replies.is_empty() {
                self.stream.write_all(&replies).await?;
            }
            text.push_str(&String::from_utf8_lossy(&clean));

            match parse::detect_prompt(&text) {
                Some(Prompt::More) => {
                    parse::remove_more_marker(&mut text);
                    self.stream.write_all(b" ").await?;
                }
                Some(prompt) => return Ok((prompt, text)),
                None => {}
            }
        }
    }

    /// Send one command and return its output without echo or prompt.
    async fn exec(&mut self, command: &str) -> Result<String, Error> {
        trace!(address = %self.address, command, "exec");
        self.send_line(command).await?;

        let exec_timeout = self.exec_timeout;
        let (prompt, raw) = tokio::time::timeout(exec_timeout, self.read_prompt())
            .await
            .map_err(|_| Error::Timeout {
                operation: format!("`{command}` on {}", self.address),
                timeout_secs: exec_timeout.as_secs(),
            })??;

        if prompt != Prompt::Cli {
            return Err(Error::Parse(format!(
                "expected CLI prompt after `{command}`, got {prompt:?}"
            )));
        }

        let output = parse::command_output(&raw);
        if let Some(line) = parse::error_line(&output) {
            return Err(Error::Command {
                command: command.to_owned(),
                output: line.to_owned(),
            });
        }
        Ok(output)
    }

    async fn set_power(&mut self, port: u16, on: bool) -> Result<(), Error> {
        self.exec(&parse::port_interface(port)).await?;
        let command = if on {
            "power inline supply enable"
        } else {
            "power inline supply disable"
        };
        self.exec(command).await.map(drop)
    }

    async fn exec_all(&mut self, commands: &[&str]) -> Result<(), Error> {
        for command in commands {
            self.exec(command).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl SwitchSession for TelnetSession {
    async fn config(&mut self, commands: &[&str]) -> Result<(), Error> {
        self.exec("configure").await?;
        self.exec_all(commands).await?;
        self.exec("end").await?;
        Ok(())
    }

    async fn port(&mut self, index: u16, commands: &[&str]) -> Result<(), Error> {
        self.exec("configure").await?;
        self.exec(&parse::port_interface(index)).await?;
        self.exec_all(commands).await?;
        self.exec("end").await?;
        Ok(())
    }

    async fn privileged(&mut self, command: &str) -> Result<String, Error> {
        self.exec(command).await
    }

    async fn port_mac_table(&mut self) -> Result<Vec<PortMac>, Error> {
        let output = self.exec("show mac address-table").await?;
        Ok(parse::mac_table(&output))
    }

    /// Every port gets its enable attempt even when an earlier step
    /// failed; the first failure is reported afterwards.
    async fn power_cycle(&mut self, ports: &[u16], duration: Duration) -> Result<(), Error> {
        if ports.is_empty() {
            return Ok(());
        }

        self.exec("configure").await?;
        let mut first_error = None;
        for port in ports {
            if let Err(e) = self.set_power(*port, false).await {
                first_error = Some(e);
                break;
            }
        }

        if first_error.is_none() {
            tokio::time::sleep(duration).await;
        }

        for port in ports {
            if let Err(e) = self.set_power(*port, true).await {
                warn!(address = %self.address, port, error = %e, "PoE re-enable failed");
                first_error.get_or_insert(e);
            }
        }
        let end = self.exec("end").await;
        match first_error {
            Some(e) => Err(e),
            None => end.map(drop),
        }
    }

    async fn close(mut self: Box<Self>) -> Result<(), Error> {
        // `logout` ends the CLI; the switch closes the socket itself.
        let _ = self.send_line("logout").await;
        let _ = self.stream.shutdown().await;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::TcpListener;

    fn driver(port: u16) -> TelnetDriver {
        TelnetDriver::new(SwitchCredentials {
            username: "admin".into(),
            password: SecretString::from("secret".to_string()),
        })
        .with_port(port)
    }

    fn options() -> SessionOptions {
        SessionOptions::new(Duration::from_secs(5), Duration::from_secs(5))
    }

    /// Minimal scripted switch: login, then answer each command line.
    async fn fake_switch(listener: TcpListener, table: &'static str) -> Vec<String> {
        let (socket, _) = listener.accept().await.unwrap();
        let (read, mut write) = socket.into_split();
        let mut lines = BufReader::new(read).lines();
        let mut seen = Vec::new();

        write.write_all(b"\r\nUser:").await.unwrap();
        let user = lines.next_line().await.unwrap().unwrap();
        seen.push(user.trim().to_owned());
        write.write_all(b"Password:").await.unwrap();
        let _password = lines.next_line().await.unwrap().unwrap();
        write.write_all(b"\r\nSW>").await.unwrap();

        while let Ok(Some(line)) = lines.next_line().await {
            let command = line.trim().to_owned();
            seen.push(command.clone());
            let reply = match command.as_str() {
                "logout" => break,
                "show mac address-table" => format!("{command}\r\n{table}\r\nSW#"),
                "bogus" => format!("{command}\r\nError: Bad command\r\nSW#"),
                "power inline supply enable"
                    if seen.iter().rev().nth(1) == Some(&parse::port_interface(0)) =>
                {
                    format!("{command}\r\nError: PoE controller busy\r\nSW#")
                }
                _ => format!("{command}\r\nSW#"),
            };
            write.write_all(reply.as_bytes()).await.unwrap();
        }
        seen
    }

    #[tokio::test]
    async fn reads_mac_table_through_session() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(fake_switch(
            listener,
            "MAC Address        VLAN  Port     Type\r\naa:bb:cc:dd:ee:01  1     Gi1/0/3  dynamic",
        ));

        let mut session = driver(port)
            .open(Ipv4Addr::LOCALHOST, options())
            .await
            .unwrap();
        let table = session.port_mac_table().await.unwrap();
        session.close().await.unwrap();

        assert_eq!(
            table,
            vec![PortMac {
                port: 2,
                mac: "aa:bb:cc:dd:ee:01".into()
            }]
        );
        let seen = server.await.unwrap();
        assert_eq!(seen, vec!["admin", "enable", "show mac address-table", "logout"]);
    }

    #[tokio::test]
    async fn cli_errors_surface_as_command_errors() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(fake_switch(listener, ""));

        let mut session = driver(port)
            .open(Ipv4Addr::LOCALHOST, options())
            .await
            .unwrap();
        let err = session.privileged("bogus").await.unwrap_err();
        session.close().await.unwrap();
        server.await.unwrap();

        assert!(matches!(err, Error::Command { ref command, .. } if command == "bogus"));
    }

    #[tokio::test]
    async fn failed_enable_still_restores_remaining_ports() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(fake_switch(listener, ""));

        let mut session = driver(port)
            .open(Ipv4Addr::LOCALHOST, options())
            .await
            .unwrap();
        let err = session
            .power_cycle(&[0, 1], Duration::from_millis(10))
            .await
            .unwrap_err();
        session.close().await.unwrap();

        assert!(matches!(err, Error::Command { .. }));
        let if0 = parse::port_interface(0);
        let if1 = parse::port_interface(1);
        let seen = server.await.unwrap();
        assert_eq!(
            seen,
            vec![
                "admin",
                "enable",
                "configure",
                if0.as_str(),
                "power inline supply disable",
                if1.as_str(),
                "power inline supply disable",
                if0.as_str(),
                "power inline supply enable",
                if1.as_str(),
                "power inline supply enable",
                "end",
                "logout",
            ]
        );
    }

    #[tokio::test]
    async fn probe_is_false_when_nothing_listens() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        assert!(!driver(port).probe(Ipv4Addr::LOCALHOST, options()).await);
    }
}
