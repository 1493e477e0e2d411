//! Best-effort `SecurityPosture` collection for the heartbeat loop (§3, §4.8). Every
//! field here is a host-dependent signal the agent reads opportunistically; none of them
//! require a package manager integration or a policy engine, neither of which this crate
//! ships. Fields this host doesn't expose stay at their conservative default rather than
//! guessing.

use std::path::Path;
use std::process::Command;

use fleet_proto::SecurityPosture;

const REBOOT_REQUIRED_FLAG: &str = "/var/run/reboot-required";
const SSHD_CONFIG: &str = "/etc/ssh/sshd_config";

pub fn collect() -> SecurityPosture {
    SecurityPosture {
        firewall_enabled: firewall_enabled(),
        ssh_hardened: ssh_hardened(),
        tls_certificates: Vec::new(),
        pending_updates: 0,
        security_updates: 0,
        reboot_required: Path::new(REBOOT_REQUIRED_FLAG).exists(),
        compliance_score: 0.0,
        security_score: 0.0,
        last_scan: None,
    }
}

/// Debian/Ubuntu leave this flag file behind after installing a kernel or library update
/// that hasn't taken effect yet.
fn firewall_enabled() -> bool {
    systemd_unit_active("firewalld") || systemd_unit_active("ufw")
}

fn systemd_unit_active(unit: &str) -> bool {
    Command::new("systemctl")
        .args(["is-active", "--quiet", unit])
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Crude but cheap: a hardened sshd disables password auth. Any read failure (missing
/// binary build, no sshd installed, permission denied) reports unhardened rather than
/// erroring the whole heartbeat.
fn ssh_hardened() -> bool {
    std::fs::read_to_string(SSHD_CONFIG)
        .map(|contents| {
            contents
                .lines()
                .map(str::trim)
                .any(|line| line.eq_ignore_ascii_case("PasswordAuthentication no"))
        })
        .unwrap_or(false)
}
