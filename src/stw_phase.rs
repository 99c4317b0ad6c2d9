use std::fmt;

/// Whether mutator threads are (or should be) halted.
#[derive(Debug, Hash, PartialEq, Eq, Clone, Copy)]
pub enum StwPhase {
    /// All mutator threads are halted at a safepoint
    Suspended,
    /// Mutator threads are running
    Resumed,
}

impl fmt::Display for StwPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StwPhase::Suspended => f.write_str("suspended"),
            StwPhase::Resumed => f.write_str("resumed"),
        }
    }
}
