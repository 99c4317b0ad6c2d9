/// Settings for the companion thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanionConfig {
    thread_name: String,
    stack_size: Option<usize>,
}

/// Default thread name, matching what shows up in debuggers and `top -H`
pub const DEFAULT_THREAD_NAME: &str = "STW Companion Thread";

impl Default for CompanionConfig {
    fn default() -> Self {
        CompanionConfig {
            thread_name: DEFAULT_THREAD_NAME.to_owned(),
            stack_size: None,
        }
    }
}

impl CompanionConfig {
    /// Use a different name for the companion thread
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Give the companion thread a specific stack size in bytes instead of
    /// the platform default
    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    /// Name the companion thread will run under
    pub fn thread_name(&self) -> &str {
        &self.thread_name
    }

    /// Requested stack size, if any
    pub fn stack_size(&self) -> Option<usize> {
        self.stack_size
    }
}
