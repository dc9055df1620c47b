//! Execution context handed to plugin handlers.

use weaver_core::CanonicalMessage;
use weaver_core::transport::BoxedTransport;

/// Everything a handler invocation needs, built fresh per dispatch and
/// discarded when the handler returns.
#[derive(Clone)]
pub struct ExecutionContext {
    /// The canonical message that triggered the command. Its bound
    /// actions (reply, react, download, …) carry the transport handle.
    pub message: CanonicalMessage,
    /// Arguments after the command token, in original case and order.
    pub args: Vec<String>,
    /// The resolved command token (one of the plugin's aliases).
    pub command: String,
    /// The prefix the command was invoked with.
    pub prefix: String,
    /// The raw transport handle, for anything the bound actions and the
    /// client helpers do not cover.
    pub transport: BoxedTransport,
}

impl ExecutionContext {
    /// Joins the arguments back into the text after the command token.
    pub fn arg_text(&self) -> String {
        self.args.join(" ")
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("command", &self.command)
            .field("args", &self.args)
            .field("prefix", &self.prefix)
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}
