// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 管道调用模块
//!
//! - `Pipeline`：接收一个 `PipelineRequest` 与取消信号，异步产生 `PipelineResponse`。
//! - `InvokerSlot`：进程级的管道调用器槽位，第一次使用时构造且只构造一次，
//!   之后在宿主生命周期内只读共享。构造时显式传入桥接层，而不是隐式的全局静态量。

use std::{
    fmt,
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, OnceLock,
    },
};

use log::info;

use crate::{
    exception::Exception,
    message::{PipelineRequest, PipelineResponse},
};

/// 管道调用返回的 future
pub type PipelineFuture =
    Pin<Box<dyn Future<Output = Result<PipelineResponse, Exception>> + Send + 'static>>;

/// 协作式取消信号。`CancelSignal::none()` 表示永远不会被取消。
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    flag: Option<Arc<AtomicBool>>,
}

impl CancelSignal {
    /// 可取消的信号
    pub fn new() -> Self {
        Self {
            flag: Some(Arc::new(AtomicBool::new(false))),
        }
    }

    /// 不可取消的信号
    pub fn none() -> Self {
        Self { flag: None }
    }

    pub fn can_be_canceled(&self) -> bool {
        self.flag.is_some()
    }

    pub fn cancel(&self) {
        if let Some(flag) = &self.flag {
            flag.store(true, Ordering::SeqCst);
        }
    }

    pub fn is_canceled(&self) -> bool {
        self.flag
            .as_ref()
            .map_or(false, |flag| flag.load(Ordering::SeqCst))
    }
}

/// 消息处理管道
pub trait Pipeline: Send + Sync {
    fn send(&self, request: PipelineRequest, cancel: CancelSignal) -> PipelineFuture;
}

/// 由闭包实现的管道
pub struct FnPipeline<F> {
    f: F,
}

/// 用闭包构造管道
pub fn pipeline_fn<F, Fut>(f: F) -> FnPipeline<F>
where
    F: Fn(PipelineRequest, CancelSignal) -> Fut + Send + Sync,
    Fut: Future<Output = Result<PipelineResponse, Exception>> + Send + 'static,
{
    FnPipeline { f }
}

impl<F, Fut> Pipeline for FnPipeline<F>
where
    F: Fn(PipelineRequest, CancelSignal) -> Fut + Send + Sync,
    Fut: Future<Output = Result<PipelineResponse, Exception>> + Send + 'static,
{
    fn send(&self, request: PipelineRequest, cancel: CancelSignal) -> PipelineFuture {
        Box::pin((self.f)(request, cancel))
    }
}

type PipelineFactory = Box<dyn Fn() -> Arc<dyn Pipeline> + Send + Sync>;

/// 一次性初始化的管道调用器槽位。
///
/// `get` 第一次被调用时执行工厂函数，并发调用者会等待同一次初始化完成；
/// 之后的调用都返回同一个实例。槽位没有销毁逻辑，随宿主进程一同结束。
pub struct InvokerSlot {
    cell: OnceLock<Arc<dyn Pipeline>>,
    factory: PipelineFactory,
}

impl InvokerSlot {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Arc<dyn Pipeline> + Send + Sync + 'static,
    {
        Self {
            cell: OnceLock::new(),
            factory: Box::new(factory),
        }
    }

    /// 由现成的管道构造，首次使用时直接放入槽位
    pub fn with_pipeline(pipeline: Arc<dyn Pipeline>) -> Self {
        Self::new(move || Arc::clone(&pipeline))
    }

    pub fn get(&self) -> Arc<dyn Pipeline> {
        let pipeline = self.cell.get_or_init(|| {
            info!("管道调用器首次使用，开始构造");
            (self.factory)()
        });
        Arc::clone(pipeline)
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl fmt::Debug for InvokerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvokerSlot")
            .field("initialized", &self.is_initialized())
            .finish()
    }
}
