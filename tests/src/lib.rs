//! Cross-component end-to-end scenarios, one module per scenario in
//! the testable-properties list. Each drives the fully assembled
//! router via `tower::ServiceExt::oneshot` rather than calling
//! handlers or managers directly, so a regression anywhere in the
//! request path — routing, auth, validation, or a manager's own
//! invariant checks — shows up here.

#[cfg(test)]
mod support;

#[cfg(test)]
mod integration;
