//! FTP anonymous access check and content dump.

use super::{run_tool, tool_available, EnumContext, Enumerator};
use crate::error::{EnumError, EnumResult};
use crate::output;
use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

const SERVICE: &str = "FTP";
const ANONYMOUS: &str = "anonymous";

#[derive(Debug, Clone, Copy)]
pub struct FtpEnumerator {
    port: u16,
}

impl Default for FtpEnumerator {
    fn default() -> Self {
        Self { port: 21 }
    }
}

impl FtpEnumerator {
    pub fn with_port(port: u16) -> Self {
        Self { port }
    }

    async fn dump(&self, ctx: &EnumContext) -> EnumResult<()> {
        if !tool_available("wget").await {
            return Err(EnumError::MissingTool("wget"));
        }

        let dir = ctx.dump_root.join("ftp_dump");
        tokio::fs::create_dir_all(&dir).await?;

        let url = mirror_url(SocketAddr::new(ctx.ip, self.port));
        let user = format!("--ftp-user={}", ANONYMOUS);
        let password = format!("--ftp-password={}", ANONYMOUS);
        run_tool(
            "wget",
            &["-r", "--no-parent", "--no-clobber", user.as_str(), password.as_str(), url.as_str()],
            Some(&dir),
        )
        .await?;

        output::print_success(&format!("Dumped FTP content into {}", dir.display()));
        Ok(())
    }
}

#[async_trait]
impl Enumerator for FtpEnumerator {
    fn name(&self) -> &'static str {
        SERVICE
    }

    fn port(&self) -> u16 {
        self.port
    }

    async fn run(&self, ctx: &EnumContext) -> EnumResult<()> {
        let addr = SocketAddr::new(ctx.ip, self.port);
        if !check_anonymous_login(addr, ctx.timeout).await? {
            output::print_info(&format!("FTP anonymous login is disabled on port {}", self.port));
            return Ok(());
        }

        output::print_success(&format!("FTP anonymous login is enabled on port {}", self.port));
        if ctx.dump {
            self.dump(ctx).await?;
        }
        Ok(())
    }
}

/// `ftp://` URL for `addr`; IPv6 hosts are bracketed.
fn mirror_url(addr: SocketAddr) -> String {
    format!("ftp://{}/", addr)
}

/// Log in as `anonymous`/`anonymous` and report whether the server let us in.
pub async fn check_anonymous_login(addr: SocketAddr, limit: Duration) -> EnumResult<bool> {
    let stream = timeout(limit, TcpStream::connect(addr))
        .await
        .map_err(|_| EnumError::Timeout { service: SERVICE })?
        .map_err(|source| EnumError::Connect {
            service: SERVICE,
            port: addr.port(),
            source,
        })?;

    let mut control = Control::new(stream, limit);
    let (code, text) = control.reply().await?;
    if code != 220 {
        return Err(EnumError::Protocol {
            service: SERVICE,
            reason: format!("unexpected greeting {} {}", code, text),
        });
    }

    let (code, _) = control.command(&format!("USER {}", ANONYMOUS)).await?;
    let accepted = match code {
        230 => true,
        331 => control.command(&format!("PASS {}", ANONYMOUS)).await?.0 == 230,
        _ => false,
    };

    // Best effort; the answer is already known
    let _ = control.command("QUIT").await;
    Ok(accepted)
}

/// Line-oriented FTP control connection.
struct Control {
    stream: BufReader<TcpStream>,
    limit: Duration,
}

impl Control {
    fn new(stream: TcpStream, limit: Duration) -> Self {
        Self {
            stream: BufReader::new(stream),
            limit,
        }
    }

    async fn command(&mut self, line: &str) -> EnumResult<(u16, String)> {
        self.stream
            .get_mut()
            .write_all(format!("{}\r\n", line).as_bytes())
            .await?;
        self.reply().await
    }

    /// Read one reply, following `123-` continuation lines to the closing `123 `.
    async fn reply(&mut self) -> EnumResult<(u16, String)> {
        let first = self.line().await?;
        let code = reply_code(&first)?;

        if first.as_bytes().get(3) == Some(&b'-') {
            let end = format!("{} ", code);
            loop {
                let line = self.line().await?;
                if line.starts_with(&end) {
                    break;
                }
            }
        }

        Ok((code, first.get(4..).unwrap_or_default().trim().to_string()))
    }

    async fn line(&mut self) -> EnumResult<String> {
        let mut line = String::new();
        let read = timeout(self.limit, self.stream.read_line(&mut line))
            .await
            .map_err(|_| EnumError::Timeout { service: SERVICE })??;
        if read == 0 {
            return Err(EnumError::Protocol {
                service: SERVICE,
                reason: "connection closed".to_string(),
            });
        }
        Ok(line.trim_end().to_string())
    }
}

fn reply_code(line: &str) -> EnumResult<u16> {
    line.get(..3)
        .and_then(|c| c.parse().ok())
        .ok_or_else(|| EnumError::Protocol {
            service: SERVICE,
            reason: format!("malformed reply: {}", line),
        })
}
