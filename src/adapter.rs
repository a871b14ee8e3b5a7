// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 宿主桥接模块
//!
//! 把宿主的同步请求/响应模型桥接到异步消息管道：
//! 1. `convert_request`：宿主请求 → 管道请求（方法规范化、请求体包装、标头分流、属性袋）。
//! 2. `begin_process_request`：调用管道并把“转换响应”接在其后，包装成 `AsyncAdapterResult`。
//! 3. `end_process_request`：取出结果，原样抛出取消或内部原因。
//! 4. `convert_response`：管道响应 → 宿主响应（状态、标头、缓存策略、流式复制消息体），
//!    结束后无条件释放请求与响应。

use std::{
    any::Any,
    future::Future,
    panic::{self, AssertUnwindSafe},
    pin::Pin,
    sync::Arc,
    task::{Context, Poll, Wake, Waker},
};

use log::{debug, error, info, warn};
use tokio::runtime::Handle;

use crate::{
    async_result::{AsyncAdapterResult, AsyncCallback},
    exception::Exception,
    headers::HeaderMap,
    host::{Cacheability, HostContext, HostResponse, RouteData},
    message::{Content, PipelineRequest, PipelineResponse},
    param::{HttpMethod, CACHE_CONTROL, HOST_CONTEXT_KEY, PRINCIPAL_KEY, ROUTE_DATA_KEY},
    pipeline::{CancelSignal, InvokerSlot},
};

/// 默认的消息体复制缓冲区大小
pub const DEFAULT_COPY_BUFFER_SIZE: usize = 8192;

type Work = Pin<Box<dyn Future<Output = Result<(), Exception>> + Send + 'static>>;

/// 宿主请求到管道请求的转换策略
pub trait RequestConverter: Send + Sync {
    fn convert_request(&self, context: &Arc<HostContext>) -> Result<PipelineRequest, Exception>;
}

/// 默认转换策略，见 [`convert_request`]
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultRequestConverter;

impl RequestConverter for DefaultRequestConverter {
    fn convert_request(&self, context: &Arc<HostContext>) -> Result<PipelineRequest, Exception> {
        convert_request(context)
    }
}

/// 把宿主请求转换为管道请求。
///
/// - 未知的方法名保存为 `HttpMethod::Custom`，不会失败。
/// - 每个标头先尝试加入请求标头集合，被拒绝时再加入内容标头集合；两者都拒绝时只记录日志。
/// - 属性袋中放入宿主上下文的反向引用，以及存在时的用户主体。
///
/// 只有打开宿主输入流失败时才返回错误。
pub fn convert_request(context: &Arc<HostContext>) -> Result<PipelineRequest, Exception> {
    let id = context.id();
    let host = context.request();

    let request = PipelineRequest::new(HttpMethod::parse(host.method()), host.url());
    request.set_content(Content::from_stream(host.input_stream()?))?;

    for (name, value) in host.headers() {
        if request.try_add_header(&name, &value).is_ok() {
            continue;
        }
        if let Err(e) = request.try_add_content_header(&name, &value) {
            warn!("[ID{}]标头{}无法加入管道请求，已忽略：{}", id, name, e);
        }
    }

    request.set_property(HOST_CONTEXT_KEY, Arc::clone(context))?;
    if let Some(principal) = host.principal() {
        request.set_property(PRINCIPAL_KEY, Arc::new(principal))?;
    }
    debug!("[ID{}]宿主请求已转换：{} {}", id, request.method(), request.uri());
    Ok(request)
}

/// 在作用域结束时释放请求范围内的资源、请求与响应。
///
/// 无论消息体复制成功、失败还是 future 被丢弃，都会执行且只执行一次。
struct DisposeGuard {
    id: u128,
    request: PipelineRequest,
    response: Option<PipelineResponse>,
}

impl Drop for DisposeGuard {
    fn drop(&mut self) {
        self.request.dispose_request_resources();
        self.request.dispose();
        if let Some(response) = &self.response {
            response.dispose();
        }
        debug!("[ID{}]管道请求与响应已释放", self.id);
    }
}

fn copy_headers(headers: &HeaderMap, host: &mut dyn HostResponse) -> Result<(), Exception> {
    for (name, values) in headers.iter() {
        for value in values {
            host.append_header(name, value)?;
        }
    }
    Ok(())
}

/// 把管道响应写入宿主响应。
///
/// 未显式携带 `Cache-Control` 的响应会被标记为 `no-cache`，
/// 因为宿主默认允许缓存。存在消息体时关闭宿主的输出缓冲并流式复制。
/// 结束后无论成败都释放请求与响应。
pub async fn convert_response(
    context: &HostContext,
    response: PipelineResponse,
    request: PipelineRequest,
    copy_buffer_size: usize,
) -> Result<(), Exception> {
    let _guard = DisposeGuard {
        id: context.id(),
        request,
        response: Some(response.clone()),
    };
    write_response(context, &response, copy_buffer_size).await
}

async fn write_response(
    context: &HostContext,
    response: &PipelineResponse,
    copy_buffer_size: usize,
) -> Result<(), Exception> {
    let id = context.id();
    let mut host = context.response().lock().await;
    host.set_status_code(response.status_code());
    host.set_reason_phrase(&response.reason_phrase());
    host.set_skip_custom_errors(true);

    let headers = response.headers();
    copy_headers(&headers, &mut *host)?;
    if !headers.contains(CACHE_CONTROL) {
        host.set_cacheability(Cacheability::NoCache);
    }

    match response.take_content()? {
        Some(mut content) => {
            copy_headers(content.headers(), &mut *host)?;
            host.set_buffer_output(false);
            let copied = content
                .copy_to(host.output_stream(), copy_buffer_size)
                .await?;
            debug!("[ID{}]响应消息体写入宿主完成，{} 字节", id, copied);
        }
        None => debug!("[ID{}]管道响应没有消息体", id),
    }
    info!(
        "[ID{}] {}, {}",
        id,
        response.status_code(),
        response.reason_phrase()
    );
    Ok(())
}

/// 后台工作的完成器，随后台任务一起被丢弃时完成结果并调用回调。
///
/// 任务在记录结果之前被丢弃（例如运行时关闭）时按取消处理，
/// 保证 `end_process_request` 不会永远阻塞。
struct Completion<S> {
    id: u128,
    result: Arc<AsyncAdapterResult<S>>,
    callback: Option<AsyncCallback<S>>,
    outcome: Option<Result<(), Exception>>,
}

impl<S> Drop for Completion<S> {
    fn drop(&mut self) {
        let outcome = match self.outcome.take() {
            Some(outcome) => outcome,
            None => {
                warn!("[ID{}]后台工作在完成之前被丢弃，按取消处理", self.id);
                Err(Exception::OperationCanceled)
            }
        };
        self.result.complete(outcome);
        if let Some(callback) = self.callback.take() {
            callback(Arc::clone(&self.result));
        }
    }
}

struct NoopWaker;

impl Wake for NoopWaker {
    fn wake(self: Arc<Self>) {}
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(msg) => *msg,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(msg) => msg.to_string(),
            Err(_) => "unknown panic".to_string(),
        },
    }
}

/// 宿主与消息管道之间的桥接器
pub struct HostAdapter {
    invoker: Arc<InvokerSlot>,
    route_data: Arc<RouteData>,
    runtime: Handle,
    converter: Arc<dyn RequestConverter>,
    copy_buffer_size: usize,
}

impl HostAdapter {
    /// `invoker` 在整个宿主生命周期内共享；`runtime` 用于执行后台工作与回调。
    pub fn new(invoker: Arc<InvokerSlot>, route_data: RouteData, runtime: Handle) -> Self {
        Self {
            invoker,
            route_data: Arc::new(route_data),
            runtime,
            converter: Arc::new(DefaultRequestConverter),
            copy_buffer_size: DEFAULT_COPY_BUFFER_SIZE,
        }
    }

    pub fn with_converter(mut self, converter: Arc<dyn RequestConverter>) -> Self {
        self.converter = converter;
        self
    }

    pub fn with_copy_buffer_size(mut self, size: usize) -> Self {
        self.copy_buffer_size = size.max(1);
        self
    }

    pub fn route_data(&self) -> &RouteData {
        &self.route_data
    }

    /// 转换请求并组装“调用管道 → 转换响应”的完整工作。
    ///
    /// 请求转换在这里同步执行，错误直接返回给调用者。
    fn build_work(&self, context: Arc<HostContext>) -> Result<Work, Exception> {
        let id = context.id();
        let request = self.converter.convert_request(&context)?;
        request.set_property(ROUTE_DATA_KEY, Arc::clone(&self.route_data))?;

        let pipeline = self.invoker.get();
        let buffer_size = self.copy_buffer_size;
        // 先于管道调用建立，工作被丢弃或 panic 展开时同样释放
        let guard = DisposeGuard {
            id,
            request,
            response: None,
        };

        Ok(Box::pin(async move {
            let mut guard = guard;
            let sending = pipeline.send(guard.request.clone(), CancelSignal::none());
            let response = match sending.await {
                Ok(response) => response,
                Err(e) => {
                    warn!("[ID{}]管道处理失败：{}", id, e);
                    return Err(e);
                }
            };
            guard.response = Some(response.clone());
            write_response(&context, &response, buffer_size).await
        }))
    }

    /// 以异步方式处理一次宿主请求，完成时响应已经完整写入宿主。
    pub async fn process_request(&self, context: Arc<HostContext>) -> Result<(), Exception> {
        self.build_work(context)?.await
    }

    /// 开始处理一次宿主请求。
    ///
    /// 工作在返回前被同步推进一次：如果此时已经完成，结果标记为同步完成，
    /// 回调在本函数返回之前被调用；否则工作转入运行时后台执行，完成后在工作线程上
    /// 调用回调一次。后台执行中的错误不会在此处抛出，而是留给 `end_process_request`。
    pub fn begin_process_request<S>(
        &self,
        context: Arc<HostContext>,
        callback: Option<AsyncCallback<S>>,
        state: S,
    ) -> Result<Arc<AsyncAdapterResult<S>>, Exception>
    where
        S: Send + Sync + 'static,
    {
        let id = context.id();
        let mut work = self.build_work(context)?;

        let _enter = self.runtime.enter();
        let waker = Waker::from(Arc::new(NoopWaker));
        let mut cx = Context::from_waker(&waker);
        let polled = panic::catch_unwind(AssertUnwindSafe(|| work.as_mut().poll(&mut cx)));
        let outcome = match polled {
            Ok(Poll::Ready(outcome)) => Some(outcome),
            Ok(Poll::Pending) => None,
            Err(payload) => Some(Err(Exception::Panicked(panic_message(payload)))),
        };

        if let Some(outcome) = outcome {
            debug!("[ID{}]请求同步完成", id);
            let result = Arc::new(AsyncAdapterResult::completed(state, outcome));
            if let Some(callback) = callback {
                callback(Arc::clone(&result));
            }
            return Ok(result);
        }

        debug!("[ID{}]请求转入后台异步执行", id);
        let result = Arc::new(AsyncAdapterResult::pending(state));
        let running = self.runtime.spawn(work);
        let completion = Completion {
            id,
            result: Arc::clone(&result),
            callback,
            outcome: None,
        };
        self.runtime.spawn(async move {
            let mut completion = completion;
            completion.outcome = Some(match running.await {
                Ok(outcome) => outcome,
                Err(e) if e.is_cancelled() => Err(Exception::OperationCanceled),
                Err(e) => Err(Exception::Panicked(panic_message(e.into_panic()))),
            });
        });
        Ok(result)
    }

    /// 结束一次请求处理，必要时阻塞等待完成。
    ///
    /// 取消返回 `Exception::OperationCanceled`；故障返回工作中产生的原始错误，不做二次包装。
    pub fn end_process_request<S>(&self, result: &AsyncAdapterResult<S>) -> Result<(), Exception> {
        let outcome = result.wait();
        match &outcome {
            Ok(()) => {}
            Err(e) if e.is_canceled() => warn!("请求处理被取消"),
            Err(e) => error!("请求处理失败：{}", e),
        }
        outcome
    }
}
