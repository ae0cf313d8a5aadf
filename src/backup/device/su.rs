use crate::backup::device::PrivilegedShell;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use bon::Builder;
use getset::Getters;
use std::path::PathBuf;
use std::process::Command;

fn default_su_binaries() -> Vec<PathBuf> {
    vec!["/system/bin/su".into(), "/system/xbin/su".into()]
}

/// Root shell through `su -c`.
///
/// Each `su` binary is tried in order; a spawn failure or any output on
/// stderr moves on to the next one.
#[derive(Clone, Debug, Builder, Getters)]
#[getset(get = "pub")]
pub struct SuShell {
    #[builder(default = default_su_binaries(), into)]
    binaries: Vec<PathBuf>,
}

impl Default for SuShell {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl PrivilegedShell for SuShell {
    fn run(&self, argv: &[&str]) -> Result<String> {
        let script = quote_command(argv);
        let mut errors = Vec::new();

        for su in &self.binaries {
            tracing::trace!("{:?} -c {}", su, script);
            let output = match Command::new(su).arg("-c").arg(&script).output() {
                Ok(o) => o,
                Err(e) => {
                    tracing::debug!("Cannot run {:?}: {e}", su);
                    errors.push(Error::from(e));
                    continue;
                }
            };

            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            if stderr.trim().is_empty() {
                return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
            }
            tracing::debug!("{:?} reported: {}", su, stderr.trim());
            errors.push(Error::Privileged {
                command: argv.iter().map(|s| s.to_string()).collect(),
                stderr,
            });
        }

        if errors.is_empty() {
            errors.push(Error::Privileged {
                command: argv.iter().map(|s| s.to_string()).collect(),
                stderr: "no su binary configured".into(),
            });
        }
        Err(errors.into())
    }
}

fn is_shell_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || "_-./:=@%+,".contains(c)
}

/// Quotes one argument for a POSIX shell.
pub fn shell_quote(arg: &str) -> String {
    if !arg.is_empty() && arg.chars().all(is_shell_safe) {
        return arg.to_string();
    }
    format!("'{}'", arg.replace('\'', r"'\''"))
}

pub fn quote_command(argv: &[&str]) -> String {
    argv.iter().map(|a| shell_quote(a)).collect::<Vec<_>>().join(" ")
}
