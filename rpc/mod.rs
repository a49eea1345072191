// ============================================================================
// RPC Module - Typed call/query surface of the settlement engine
// ============================================================================
//
// Callers never address the engine by method-name strings. Every operation
// is a variant of `Command` (mutating) or `Query` (read-only), dispatched
// through a single match.
//
// Components:
//   - commands: Command / Query envelopes and their typed results
//   - dispatch: routing of each variant onto the router and markets
//
// ============================================================================

pub mod commands;
pub mod dispatch;

pub use commands::*;
