use crate::error::{RenderError, Result};
use crate::runner::ExecutionResult;

/// Decide whether a renderer run produced an image.
///
/// Any stderr output is a failure, even with a zero exit code and image data
/// on stdout: under `--quiet` a clean wkhtmltoimage run writes nothing there.
/// Stderr is checked before stdout so a diagnostic always wins over
/// [`RenderError::EmptyOutput`].
pub fn interpret(result: ExecutionResult, command: &str) -> Result<Vec<u8>> {
    if !result.stderr.is_empty() {
        return Err(RenderError::RendererError {
            message: result.stderr_text(),
            command: command.to_string(),
        });
    }

    if result.stdout.is_empty() {
        return Err(RenderError::EmptyOutput);
    }

    Ok(result.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMMAND: &str = "/bin/echo --format 'jpg' --quiet - -";

    #[test]
    fn test_stdout_returned() {
        let result = ExecutionResult {
            stdout: b"output".to_vec(),
            ..Default::default()
        };
        assert_eq!(interpret(result, COMMAND).unwrap(), b"output");
    }

    #[test]
    fn test_stderr_wins_over_stdout() {
        let result = ExecutionResult {
            stdout: b"image".to_vec(),
            stderr: b"wrong".to_vec(),
            exit_code: Some(0),
        };

        match interpret(result, COMMAND).unwrap_err() {
            RenderError::RendererError { message, command } => {
                assert_eq!(message, "wrong");
                assert_eq!(command, COMMAND);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_stderr_wins_over_empty_stdout() {
        let result = ExecutionResult {
            stderr: b"wrong".to_vec(),
            ..Default::default()
        };
        let err = interpret(result, COMMAND).unwrap_err();
        assert!(err.to_string().contains("System error \"wrong\" when executing command"));
    }

    #[test]
    fn test_empty_output() {
        let result = ExecutionResult {
            exit_code: Some(0),
            ..Default::default()
        };
        assert!(matches!(interpret(result, COMMAND), Err(RenderError::EmptyOutput)));
    }

    #[test]
    fn test_exit_code_ignored() {
        let result = ExecutionResult {
            stdout: b"partial".to_vec(),
            stderr: Vec::new(),
            exit_code: Some(1),
        };
        assert_eq!(interpret(result, COMMAND).unwrap(), b"partial");
    }
}
