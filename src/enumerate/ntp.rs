//! Local clock synchronization against the target.
//!
//! Kerberos-backed services reject requests from clients whose clock is
//! skewed. The helper stops the local NTP daemon and steps the clock
//! from the target once. Both commands need root through `sudo`.

use super::run_tool;
use crate::error::EnumResult;
use crate::output;

/// The two commands run, in order.
pub(crate) fn sync_commands(address: &str) -> [(&'static str, Vec<String>); 2] {
    [
        (
            "sudo",
            vec!["timedatectl".to_string(), "set-ntp".to_string(), "0".to_string()],
        ),
        (
            "sudo",
            vec!["ntpdate".to_string(), "-u".to_string(), address.to_string()],
        ),
    ]
}

/// Synchronize the local clock with the NTP server at `address`.
pub async fn sync_time(address: &str) -> EnumResult<()> {
    for (tool, args) in sync_commands(address) {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        run_tool(tool, &args, None).await?;
    }

    output::print_success(&format!("Clock synchronized with {}", address));
    Ok(())
}
