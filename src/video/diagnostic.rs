//! Reports of caller mistakes that the renderer absorbs without changing control flow.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// A handle that is stale, foreign or was never minted.
    InvalidHandle,
    /// A framebuffer kind the device can not render into.
    UnsupportedFramebuffer,
    /// A draw without an attached target.
    NoTarget,
    EmptyIndices,
    /// An index beyond the vertices of the bound buffer.
    IndexOutOfRange,
    UnknownProgram,
    /// More lights enabled than the device can shade at once.
    TooManyLights,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Diagnostic {
    pub operation: &'static str,
    pub kind: DiagnosticKind,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{}] {:?}", self.operation, self.kind)
    }
}

pub type DiagnosticHook = Box<dyn FnMut(&Diagnostic)>;

/// Logs diagnostics and forwards them to an optional hook.
#[derive(Default)]
pub struct Diagnostics {
    hook: Option<DiagnosticHook>,
}

impl Diagnostics {
    pub fn set_hook(&mut self, hook: Option<DiagnosticHook>) {
        self.hook = hook;
    }

    pub fn report(&mut self, operation: &'static str, kind: DiagnosticKind) {
        let diagnostic = Diagnostic { operation, kind };
        warn!("[Renderer] {}", diagnostic);

        if let Some(ref mut hook) = self.hook {
            hook(&diagnostic);
        }
    }
}
