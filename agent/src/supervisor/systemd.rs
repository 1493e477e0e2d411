//! Shells out to `systemctl`. Grounded on the `run_systemctl` shell-exec idiom: invoke
//! the command, inspect `ExitStatus::success()`, and surface stderr on failure rather
//! than parsing exit codes.

use std::process::Command;

use super::{ServiceController, ServiceControllerError, ServiceStatus};

#[derive(Debug, Clone, Default)]
pub struct SystemdServiceController;

impl SystemdServiceController {
    fn run(&self, service: &str, action: &'static str, args: &[&str]) -> Result<String, ServiceControllerError> {
        let output = Command::new("systemctl")
            .args(args)
            .output()
            .map_err(|source| ServiceControllerError::Spawn { service: service.to_string(), source })?;

        if !output.status.success() {
            return Err(ServiceControllerError::CommandFailed {
                action,
                service: service.to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl ServiceController for SystemdServiceController {
    fn start(&self, service: &str) -> Result<(), ServiceControllerError> {
        self.run(service, "start", &["start", service]).map(|_| ())
    }

    fn stop(&self, service: &str) -> Result<(), ServiceControllerError> {
        self.run(service, "stop", &["stop", service]).map(|_| ())
    }

    fn reload(&self, service: &str) -> Result<(), ServiceControllerError> {
        self.run(service, "reload", &["reload", service]).map(|_| ())
    }

    /// `systemctl is-active` exits non-zero for every state but `active`, so status is
    /// read from stdout rather than the exit code.
    fn status(&self, service: &str) -> Result<ServiceStatus, ServiceControllerError> {
        let output = Command::new("systemctl")
            .args(["is-active", service])
            .output()
            .map_err(|source| ServiceControllerError::Spawn { service: service.to_string(), source })?;

        let state = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(match state.as_str() {
            "active" => ServiceStatus::Active,
            "inactive" => ServiceStatus::Inactive,
            "failed" => ServiceStatus::Failed,
            _ => ServiceStatus::Unknown,
        })
    }

    fn pid(&self, service: &str) -> Result<Option<u32>, ServiceControllerError> {
        let output = self.run(service, "show", &["show", service, "--property=MainPID", "--value"])?;
        match output.parse::<u32>() {
            Ok(0) => Ok(None),
            Ok(pid) => Ok(Some(pid)),
            Err(_) => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `systemctl` is not available in every sandbox this crate's tests run in, so this
    /// only checks the command-construction path doesn't panic; the real assertions
    /// live in the pure `decide`/`Supervisor` tests.
    #[test]
    #[ignore = "requires systemctl and a real or stub unit on the host"]
    fn test_status_of_unknown_unit_is_reported_as_unknown_not_an_error() {
        let controller = SystemdServiceController;
        let status = controller.status("definitely-not-a-real-unit.service").unwrap();
        assert_eq!(status, ServiceStatus::Unknown);
    }
}
