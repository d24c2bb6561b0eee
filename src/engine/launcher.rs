//! Start-parameter construction for process launch.
//!
//! Translates a [`ProcessConfig`] snapshot plus optional credentials into a
//! ready-to-spawn command. Shell-execute routes the command line through the
//! platform shell; any stream redirection forces direct process creation.

use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::config::ProcessConfig;
use crate::credential::Credentials;
use crate::error::{Result, WardenError};

/// Build the launch command from configuration and credentials.
///
/// Only non-empty arguments and working directory are applied; credentials
/// are applied only when complete (username, domain, and secret all present).
pub(crate) fn build_command(config: &ProcessConfig, credentials: &Credentials) -> Result<Command> {
    if config.file_name.is_empty() {
        return Err(WardenError::LaunchFailed(
            "no executable file name configured".into(),
        ));
    }

    // redirection requires direct process creation
    let shell_execute = config.use_shell_execute && !config.any_redirection();
    let mut cmd = if shell_execute {
        shell_command(config)
    } else {
        let mut cmd = Command::new(&config.file_name);
        if !config.arguments.is_empty() {
            cmd.args(&config.arguments);
        }
        cmd
    };

    if let Some(dir) = &config.working_dir {
        if !dir.as_os_str().is_empty() {
            cmd.current_dir(dir);
        }
    }
    for (key, value) in &config.env {
        cmd.env(key, value);
    }

    cmd.stdin(if config.redirect_stdin {
        Stdio::piped()
    } else {
        Stdio::inherit()
    });
    cmd.stdout(if config.redirect_stdout {
        Stdio::piped()
    } else {
        Stdio::inherit()
    });
    cmd.stderr(if config.redirect_stderr {
        Stdio::piped()
    } else {
        Stdio::inherit()
    });

    apply_credentials(&mut cmd, credentials)?;

    // finalization safety net: a dropped child is killed, so an engine that
    // is never shut down explicitly still releases the process
    cmd.kill_on_drop(true);

    debug!(
        file = %config.file_name,
        shell_execute,
        redirected = config.any_redirection(),
        "launch command built"
    );
    Ok(cmd)
}

/// Route the configured command line through the platform shell.
fn shell_command(config: &ProcessConfig) -> Command {
    let mut line = config.file_name.clone();
    for arg in &config.arguments {
        line.push(' ');
        line.push_str(arg);
    }

    #[cfg(unix)]
    {
        let mut cmd = Command::new("/bin/sh");
        cmd.arg("-c").arg(line);
        cmd
    }
    #[cfg(windows)]
    {
        let mut cmd = Command::new("cmd.exe");
        cmd.arg("/C").arg(line);
        cmd
    }
}

#[cfg(unix)]
fn apply_credentials(cmd: &mut Command, credentials: &Credentials) -> Result<()> {
    if !credentials.is_complete() {
        return Ok(());
    }
    let name = credentials.username().unwrap_or_default();
    let user = nix::unistd::User::from_name(name)
        .map_err(|e| WardenError::LaunchFailed(format!("user lookup failed: {}", e)))?
        .ok_or_else(|| WardenError::LaunchFailed(format!("unknown user: {}", name)))?;
    cmd.uid(user.uid.as_raw());
    cmd.gid(user.gid.as_raw());
    Ok(())
}

#[cfg(not(unix))]
fn apply_credentials(_cmd: &mut Command, _credentials: &Credentials) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_file_name() {
        let config = ProcessConfig::default();
        let creds = Credentials::new();
        let err = build_command(&config, &creds).unwrap_err();
        assert!(matches!(err, WardenError::LaunchFailed(_)));
    }

    #[test]
    fn test_direct_spawn_when_redirected() {
        // use_shell_execute stays true but redirection forces direct creation
        let config = ProcessConfig::new("/bin/echo").arg("hi").capture_output();
        let creds = Credentials::new();
        let cmd = build_command(&config, &creds).unwrap();
        assert_eq!(cmd.as_std().get_program(), "/bin/echo");
    }

    #[cfg(unix)]
    #[test]
    fn test_shell_execute_without_redirection() {
        let config = ProcessConfig::new("echo").arg("hi");
        let creds = Credentials::new();
        let cmd = build_command(&config, &creds).unwrap();
        assert_eq!(cmd.as_std().get_program(), "/bin/sh");
    }

    #[test]
    fn test_working_dir_applied_only_when_nonempty() {
        let config = ProcessConfig::new("/bin/true").working_dir("");
        let creds = Credentials::new();
        let cmd = build_command(&config, &creds).unwrap();
        assert!(cmd.as_std().get_current_dir().is_none());

        let config = ProcessConfig::new("/bin/true")
            .capture_output()
            .working_dir("/tmp");
        let cmd = build_command(&config, &creds).unwrap();
        assert_eq!(
            cmd.as_std().get_current_dir(),
            Some(std::path::Path::new("/tmp"))
        );
    }

    #[test]
    fn test_env_applied() {
        let config = ProcessConfig::new("/bin/true").env("MODE", "batch");
        let creds = Credentials::new();
        let cmd = build_command(&config, &creds).unwrap();
        let envs: Vec<_> = cmd.as_std().get_envs().collect();
        assert!(envs.iter().any(|(k, v)| {
            k.to_str() == Some("MODE") && v.and_then(|v| v.to_str()) == Some("batch")
        }));
    }

    #[test]
    fn test_incomplete_credentials_ignored() {
        let config = ProcessConfig::new("/bin/true");
        let mut creds = Credentials::new();
        creds.set_username("nosuchuser-xyz");
        // no domain, no password: credentials must not participate
        assert!(build_command(&config, &creds).is_ok());
    }
}
