/// Classification for retry policy.
///
/// Used by recorders to decide how to respond to a provider error.
///
/// | Class | Retry same provider? |
/// |-------|----------------------|
/// | `Never` | No |
/// | `WithBackoff` | Yes, after an exponential pause |
/// | `NextProvider` | No, another provider might succeed |
/// | `CircuitOpen` | No, the provider is being skipped |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// Bad symbol, validation error, or terminal failure.
    Never,

    /// Transient failure such as rate limiting (429) or a timeout.
    WithBackoff,

    /// This provider cannot serve the request.
    NextProvider,

    /// Provider is temporarily excluded.
    CircuitOpen,
}
