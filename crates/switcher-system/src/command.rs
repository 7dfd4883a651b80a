//! External command helpers.

use std::ffi::OsStr;
use std::io;
use std::process::{Command, Output};

/// Builds a command that never flashes a console window on Windows.
pub(crate) fn command<S: AsRef<OsStr>>(program: S) -> Command {
    #[allow(unused_mut)]
    let mut cmd = Command::new(program);

    #[cfg(target_os = "windows")]
    {
        use std::os::windows::process::CommandExt;
        const CREATE_NO_WINDOW: u32 = 0x08000000;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }

    cmd
}

/// Runs a command and returns its stdout, failing on a non-zero exit status.
pub(crate) fn run<I, S>(program: &str, args: I) -> io::Result<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let output = command(program).args(args).output()?;
    check_status(program, output)
}

fn check_status(program: &str, output: Output) -> io::Result<String> {
    if output.status.success() {
        return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(io::Error::other(format!(
        "{} exited with {}: {}",
        program,
        output.status,
        stderr.trim()
    )))
}
