//! Notification-to-draft pipeline.
//!
//! Every admitted notification flows through:
//! 1. `DedupGuard::acquire` — single-flight + cool-down per message id
//! 2. `ContextAssembler::assemble` — prior correspondence (degrades to empty)
//! 3. `select` — pure similarity ranking, single best match + digests
//! 4. `ReplySynthesizer::synthesize` — prompt assembly + generation call
//! 5. `verify_and_filter` — drop sentences with unsupported risky claims
//! 6. Draft persistence + `DraftLog` record + `DedupGuard::release`

pub mod context;
pub mod orchestrator;
pub mod select;
pub mod synth;
pub mod types;
pub mod verify;
