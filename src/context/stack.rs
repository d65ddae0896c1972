//! Coroutine-local stack of active request contexts.
//!
//! Each `may` coroutine gets its own stack; code running on a plain thread
//! falls back to a thread-local one. The stack is never shared, so it needs
//! no locking. Borrows of the stack never outlive a single call here, so
//! user code running against the top context can push and pop freely.

use std::cell::RefCell;
use std::sync::Arc;
use tracing::{debug, error};

use super::core::RequestContext;
use super::error::ContextError;

may::coroutine_local!(static STACK: RefCell<Vec<Arc<RequestContext>>> = RefCell::new(Vec::new()));

/// Make `ctx` the current context.
pub fn push(ctx: Arc<RequestContext>) {
    let request_id = ctx.request_id();
    let depth = STACK.with(|stack| {
        let mut stack = stack.borrow_mut();
        stack.push(ctx);
        stack.len()
    });
    debug!(request_id = %request_id, depth = depth, "Request context pushed");
}

/// Pop the current context, which must be `expected` itself.
///
/// Identity is the allocation, not the request id: clients choose their
/// own `X-Request-Id`, so two live contexts may share one.
///
/// # Errors
///
/// `StackMismatch` when the top is another context (or the stack is empty);
/// the stack is left untouched in that case.
pub fn pop(expected: &Arc<RequestContext>) -> Result<Arc<RequestContext>, ContextError> {
    STACK.with(|stack| {
        let mut stack = stack.borrow_mut();
        match stack.last() {
            Some(top) if Arc::ptr_eq(top, expected) => {}
            top => {
                let found = top.map(|ctx| ctx.request_id());
                error!(
                    expected = %expected.request_id(),
                    found = ?found.map(|id| id.to_string()),
                    "Request context stack mismatch"
                );
                return Err(ContextError::StackMismatch {
                    expected: expected.request_id(),
                    found,
                });
            }
        }
        let ctx = stack.pop().ok_or(ContextError::OutsideRequestContext)?;
        debug!(request_id = %ctx.request_id(), depth = stack.len(), "Request context popped");
        Ok(ctx)
    })
}

/// The current context, if any.
#[must_use]
pub fn top() -> Option<Arc<RequestContext>> {
    STACK.with(|stack| stack.borrow().last().cloned())
}

/// Number of contexts on this unit of execution's stack.
#[must_use]
pub fn depth() -> usize {
    STACK.with(|stack| stack.borrow().len())
}
