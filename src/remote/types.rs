/// How a streamed command is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Log the command line before running it.
    pub echo: bool,
    /// Treat a non-zero exit as an error.
    pub check: bool,
    /// Pass `-t` to `ssh` when the command is forwarded to the login node.
    pub force_tty: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            echo: true,
            check: true,
            force_tty: false,
        }
    }
}

impl RunOptions {
    pub fn quiet() -> Self {
        Self {
            echo: false,
            ..Self::default()
        }
    }

    pub fn unchecked(self) -> Self {
        Self {
            check: false,
            ..self
        }
    }
}
