//! Stack growth for the recursive parser and evaluator.
//!
//! Deeply nested source and deep user recursion both recurse on the
//! native stack. Wrapping the recursive entry points of each stage keeps
//! them from overflowing it.

/// If less than this remains, the stack is grown before recursing.
const RED_ZONE: usize = 100 * 1024;

/// Size of each new stack segment.
const STACK_PER_RECURSION: usize = 1024 * 1024;

#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
  stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

#[inline]
#[cfg(target_arch = "wasm32")]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
  f()
}
