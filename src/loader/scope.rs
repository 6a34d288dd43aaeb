//! Copyright © 2025-2026 Wenze Wei. All Rights Reserved.
//!
//! This file is part of Zimod.
//! The Zimod project belongs to the Dunimd Team.
//!
//! Licensed under the Apache License, Version 2.0 (the "License");
//! You may not use this file except in compliance with the License.
//! You may obtain a copy of the License at
//!
//!     http://www.apache.org/licenses/LICENSE-2.0
//!
//! Unless required by applicable law or agreed to in writing, software
//! distributed under the License is distributed on an "AS IS" BASIS,
//! WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//! See the License for the specific language governing permissions and
//! limitations under the License.

//! Per-thread active resolution scope.

use std::marker::PhantomData;

use crate::loader::context::ZiCLoadingContext;

thread_local! {
    static ACTIVE_CONTEXTS: std::cell::RefCell<Vec<ZiCLoadingContext>> =
        std::cell::RefCell::new(Vec::new());
}

/// Keeps a context active on the current thread until dropped.
///
/// Guards nest; dropping one restores whatever was active before it.
#[derive(Debug)]
pub struct ZiCActiveContextGuard {
    depth: usize,
    // Tied to the thread whose stack it pushed onto.
    _not_send: PhantomData<*const ()>,
}

impl Drop for ZiCActiveContextGuard {
    fn drop(&mut self) {
        ACTIVE_CONTEXTS.with(|stack| {
            stack.borrow_mut().truncate(self.depth);
        });
    }
}

/// Makes `context` the active scope of the current thread.
#[allow(non_snake_case)]
pub fn ZiFEnterContext(context: &ZiCLoadingContext) -> ZiCActiveContextGuard {
    let depth = ACTIVE_CONTEXTS.with(|stack| {
        let mut stack = stack.borrow_mut();
        let depth = stack.len();
        stack.push(context.clone());
        depth
    });
    ZiCActiveContextGuard {
        depth,
        _not_send: PhantomData,
    }
}

/// The innermost active context of the current thread, if any.
#[allow(non_snake_case)]
pub fn ZiFCurrentContext() -> Option<ZiCLoadingContext> {
    ACTIVE_CONTEXTS.with(|stack| stack.borrow().last().cloned())
}

impl ZiCLoadingContext {
    #[allow(non_snake_case)]
    pub fn ZiFEnter(&self) -> ZiCActiveContextGuard {
        ZiFEnterContext(self)
    }
}
