//! Invocation of the external room compressor.

use std::{io::Write, path::Path, process::Command};

use log::{debug, warn};

use crate::{error::CodecError, state::GlobalConfig};

#[derive(Clone, Debug)]
pub struct Compressor {
    pub program: String,
    /// Arguments placed before the input and output paths.
    pub args: Vec<String>,
}

impl From<&GlobalConfig> for Compressor {
    fn from(config: &GlobalConfig) -> Self {
        Compressor {
            program: config.compressor.clone(),
            args: config.compressor_args.clone(),
        }
    }
}

impl Compressor {
    /// Compresses `data` into `out_path`, retrying once if the tool fails.
    pub fn compress_room(&self, room: usize, data: &[u8], out_path: &Path) -> Result<(), CodecError> {
        let mut input = tempfile::NamedTempFile::new().map_err(|e| self.failure(room, e.to_string()))?;
        input
            .write_all(data)
            .and_then(|_| input.flush())
            .map_err(|e| self.failure(room, e.to_string()))?;

        match self.run(input.path(), out_path) {
            Ok(()) => Ok(()),
            Err(first) => {
                warn!("Compressing room {:02X} failed ({}), retrying", room, first);
                self.run(input.path(), out_path)
                    .map_err(|message| self.failure(room, message))
            }
        }
    }

    fn run(&self, input: &Path, output: &Path) -> Result<(), String> {
        debug!(
            "Running {} {:?} {} {}",
            self.program,
            self.args,
            input.display(),
            output.display()
        );
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(input)
            .arg(output)
            .status()
            .map_err(|e| format!("could not run `{}`: {}", self.program, e))?;
        if !status.success() {
            return Err(format!(
                "`{}` exited with status {}",
                self.program,
                status
                    .code()
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "unknown".to_string())
            ));
        }
        Ok(())
    }

    fn failure(&self, room: usize, message: String) -> CodecError {
        CodecError::ExternalTool { room, message }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn passes_buffer_through_tool() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("00.bin");
        let cp = Compressor {
            program: "cp".to_string(),
            args: vec![],
        };
        cp.compress_room(0, &[1, 2, 3, 0xFF], &out).unwrap();
        assert_eq!(std::fs::read(&out).unwrap(), vec![1, 2, 3, 0xFF]);
    }

    #[test]
    fn retries_once_after_failure() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("02.bin");
        let marker = dir.path().join("first-run");
        // Fails the first time it runs, then copies.
        let script = format!(
            "if [ -e '{0}' ]; then cp \"$1\" \"$2\"; else touch '{0}'; exit 1; fi",
            marker.display()
        );
        let flaky = Compressor {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script, "sh".to_string()],
        };
        flaky.compress_room(2, &[9, 8, 7], &out).unwrap();
        assert!(marker.exists());
        assert_eq!(std::fs::read(&out).unwrap(), vec![9, 8, 7]);
    }

    #[test]
    fn reports_failing_tool() {
        let dir = tempfile::tempdir().unwrap();
        let tool = Compressor {
            program: "false".to_string(),
            args: vec![],
        };
        let err = tool.compress_room(3, &[0], &dir.path().join("03.bin")).unwrap_err();
        assert!(matches!(err, CodecError::ExternalTool { room: 3, .. }));
    }

    #[test]
    fn reports_missing_tool() {
        let dir = tempfile::tempdir().unwrap();
        let tool = Compressor {
            program: "definitely-not-a-compressor".to_string(),
            args: vec![],
        };
        let err = tool.compress_room(1, &[0], &dir.path().join("01.bin")).unwrap_err();
        assert!(err.to_string().contains("could not run"));
    }
}
