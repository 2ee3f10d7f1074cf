//! SMB share listing and download through `smbclient`.

use super::{run_tool, tool_available, EnumContext, Enumerator};
use crate::error::{EnumError, EnumResult};
use crate::output;
use async_trait::async_trait;

const SERVICE: &str = "SMB";
const SMBCLIENT: &str = "smbclient";

/// A share advertised by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Share {
    pub name: String,
    pub kind: String,
    pub comment: String,
}

impl Share {
    /// Only disk shares hold files worth downloading.
    pub fn is_disk(&self) -> bool {
        self.kind.eq_ignore_ascii_case("disk")
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SmbEnumerator {
    port: u16,
}

impl Default for SmbEnumerator {
    fn default() -> Self {
        Self { port: 445 }
    }
}

impl SmbEnumerator {
    /// List shares with a guest (null) session.
    async fn list_shares(&self, ctx: &EnumContext) -> EnumResult<Vec<Share>> {
        let service = format!("//{}", ctx.address);
        let port = self.port.to_string();
        let result = run_tool(SMBCLIENT, &["-L", &service, "-N", "-g", "-p", &port], None).await;

        let output = match result {
            Ok(output) => output,
            Err(EnumError::ToolFailed { output, .. }) if is_session_failure(&output) => {
                return Err(session_failed());
            }
            Err(e) => return Err(e),
        };

        let text = String::from_utf8_lossy(&output.stdout);
        if is_session_failure(&text) {
            return Err(session_failed());
        }
        Ok(parse_share_list(&text))
    }

    async fn dump(&self, ctx: &EnumContext, shares: &[Share]) -> EnumResult<()> {
        let root = ctx.dump_root.join("smb_dump");
        tokio::fs::create_dir_all(&root).await?;

        for share in shares.iter().filter(|s| s.is_disk()) {
            let dir = root.join(&share.name);
            tokio::fs::create_dir_all(&dir).await?;

            let service = format!("//{}/{}", ctx.address, share.name);
            let port = self.port.to_string();
            let result = run_tool(
                SMBCLIENT,
                &["-N", "-p", &port, &service, "-c", "recurse ON; prompt OFF; mget *"],
                Some(&dir),
            )
            .await;

            match result {
                Ok(_) => output::print_success(&format!("Dumped share {}", share.name)),
                Err(EnumError::ToolFailed { output, .. }) if is_session_failure(&output) => {
                    output::print_warning(&format!("SMB session setup failed for {}", share.name))
                }
                Err(e) => {
                    output::print_warning(&format!("Could not dump share {}: {}", share.name, e))
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Enumerator for SmbEnumerator {
    fn name(&self) -> &'static str {
        SERVICE
    }

    fn port(&self) -> u16 {
        self.port
    }

    async fn run(&self, ctx: &EnumContext) -> EnumResult<()> {
        if !tool_available(SMBCLIENT).await {
            return Err(EnumError::MissingTool(SMBCLIENT));
        }

        let shares = self.list_shares(ctx).await?;
        output::print_info("Listing SMB shares");
        for share in &shares {
            if share.comment.is_empty() {
                output::print_detail(&share.name);
            } else {
                output::print_detail(&format!("{} ({})", share.name, share.comment));
            }
        }

        if ctx.dump {
            self.dump(ctx, &shares).await?;
        }
        Ok(())
    }
}

/// Parse `smbclient -g` share lines: `Disk|public|Public files`.
pub fn parse_share_list(output: &str) -> Vec<Share> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.splitn(3, '|');
            let kind = fields.next()?.trim();
            let name = fields.next()?.trim();
            let comment = fields.next().unwrap_or_default().trim();

            let known = ["Disk", "IPC", "Printer"]
                .iter()
                .any(|k| kind.eq_ignore_ascii_case(k));
            (known && !name.is_empty()).then(|| Share {
                name: name.to_string(),
                kind: kind.to_string(),
                comment: comment.to_string(),
            })
        })
        .collect()
}

fn is_session_failure(text: &str) -> bool {
    text.contains("session setup failed") || text.contains("NT_STATUS_ACCESS_DENIED")
}

fn session_failed() -> EnumError {
    EnumError::Protocol {
        service: SERVICE,
        reason: "session setup failed".to_string(),
    }
}
