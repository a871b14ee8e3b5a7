// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 异步结果模块
//!
//! `AsyncAdapterResult` 把管道侧的异步工作包装成宿主熟悉的 Begin/End 回调模型：
//! 它记录工作是否完成、是否同步完成，以及调用方传入的不透明状态值。
//! 除完成结果外，其余字段在对外可见之前一次性设置完毕，之后只读。

use std::{
    fmt,
    sync::{Arc, Condvar, Mutex},
};

use crate::{exception::Exception, util::lock_or_recover};

/// Begin 调用的完成回调，在工作完成后被调用且只调用一次
pub type AsyncCallback<S> = Box<dyn FnOnce(Arc<AsyncAdapterResult<S>>) + Send + 'static>;

/// 一次 Begin 调用的异步结果
pub struct AsyncAdapterResult<S> {
    outcome: Mutex<Option<Result<(), Exception>>>,
    ready: Condvar,
    state: S,
    completed_synchronously: bool,
}

impl<S> AsyncAdapterResult<S> {
    /// 在 Begin 返回前就已经完成的结果
    pub(crate) fn completed(state: S, outcome: Result<(), Exception>) -> Self {
        Self {
            outcome: Mutex::new(Some(outcome)),
            ready: Condvar::new(),
            state,
            completed_synchronously: true,
        }
    }

    /// 尚未完成、将在后台任务中完成的结果
    pub(crate) fn pending(state: S) -> Self {
        Self {
            outcome: Mutex::new(None),
            ready: Condvar::new(),
            state,
            completed_synchronously: false,
        }
    }

    /// 记录完成结果并唤醒等待者。只有第一次调用生效。
    pub(crate) fn complete(&self, outcome: Result<(), Exception>) {
        let mut slot = lock_or_recover(&self.outcome, "AsyncAdapterResult");
        if slot.is_none() {
            *slot = Some(outcome);
            self.ready.notify_all();
        }
    }

    /// 调用方传入的不透明状态值
    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn completed_synchronously(&self) -> bool {
        self.completed_synchronously
    }

    pub fn is_completed(&self) -> bool {
        lock_or_recover(&self.outcome, "AsyncAdapterResult").is_some()
    }

    /// 阻塞当前线程直到工作完成，返回完成结果。
    ///
    /// 不要在异步运行时的工作线程上对未完成的结果调用此方法。
    pub fn wait(&self) -> Result<(), Exception> {
        let mut slot = lock_or_recover(&self.outcome, "AsyncAdapterResult");
        loop {
            if let Some(outcome) = slot.as_ref() {
                return outcome.clone();
            }
            slot = match self.ready.wait(slot) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
    }
}

impl<S: fmt::Debug> fmt::Debug for AsyncAdapterResult<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncAdapterResult")
            .field("state", &self.state)
            .field("completed_synchronously", &self.completed_synchronously)
            .field("is_completed", &self.is_completed())
            .finish()
    }
}
