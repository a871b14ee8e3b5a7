// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 演示宿主
//!
//! 一个最小的同步风格宿主：每个 TCP 连接读取一次 HTTP 请求，
//! 通过 `HostAdapter` 的 Begin/End 调用交给消息管道处理，再把宿主响应写回 Socket。
//!
//! 演示管道提供：
//! - `GET /health`：健康检查
//! - `POST /orders`：把 JSON 请求体绑定为 `Order` 模型并运行验证树，
//!   验证失败返回 400 与按路径分组的错误，成功返回 201

use log::{debug, error, info, warn};
use serde_json::json;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    runtime::Builder,
    sync::{oneshot, Mutex as AsyncMutex},
};

use std::{
    net::{Ipv4Addr, SocketAddrV4},
    sync::Arc,
    time::Instant,
};

use webbridge::{
    async_result::{AsyncAdapterResult, AsyncCallback},
    config::Config,
    host::{HostContext, HostRequest, RouteData, SharedHostResponse},
    message::PipelineResponse,
    metadata::{
        DescriptorMetadataProvider, MetadataProvider, PropertyDescriptor, TypeDescriptor, TypeRegistry,
        ValidationRule,
    },
    model::{ModelValue, FLOAT_TYPE, INT_TYPE, STRING_TYPE},
    param::HttpMethod,
    pipeline::{pipeline_fn, InvokerSlot, Pipeline},
    validation_node::{ValidationContext, ValidationNode},
    validator::{
        validator_fn, CachedValidatorProvider, CompositeValidatorProvider, ModelValidationResult,
        RuleValidatorProvider, TypeValidatorProvider, ValidatorProvider,
    },
    Exception, HostAdapter, PipelineRequest, Request, Response,
};

const CONFIG_PATH: &str = "config/development.toml";

fn main() {
    // 1. 加载配置
    let config = match Config::from_toml(CONFIG_PATH) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return;
        }
    };

    // 2. 初始化日志系统
    if let Err(e) = log4rs::init_file(config.log_config(), Default::default()) {
        eprintln!("无法初始化日志系统：{}", e);
    }
    info!("配置文件已载入");

    // 3. 根据配置分配工作线程数
    let runtime = match Builder::new_multi_thread()
        .worker_threads(config.worker_threads())
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("无法构建异步运行时：{}", e);
            return;
        }
    };

    // 4. 管道调用器在第一个请求到来时构造，之后整个进程共享
    let cache_capacity = config.validator_cache_capacity();
    let invoker = Arc::new(InvokerSlot::new(move || build_pipeline(cache_capacity)));
    let adapter = Arc::new(
        HostAdapter::new(invoker, RouteData::new("{controller}"), runtime.handle().clone())
            .with_copy_buffer_size(config.copy_buffer_size()),
    );

    runtime.block_on(serve(config, adapter));
}

async fn serve(config: Config, adapter: Arc<HostAdapter>) {
    let port: u16 = config.port();
    let address = match config.local() {
        true => Ipv4Addr::new(127, 0, 0, 1),
        false => Ipv4Addr::new(0, 0, 0, 0),
    };
    info!("服务端将在{}:{}上监听Socket连接", address, port);
    let socket = SocketAddrV4::new(address, port);

    let listener = match TcpListener::bind(socket).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("无法绑定端口：{}，错误：{}", port, e);
            return;
        }
    };
    info!("端口{}绑定完成", port);

    let max_request_size = config.max_request_size();
    let mut id: u128 = 0;
    loop {
        let (mut stream, addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!("接受连接失败：{}", e);
                continue;
            }
        };
        debug!("[ID{}]TCP连接已建立：{}", id, addr);

        let adapter = Arc::clone(&adapter);
        tokio::spawn(async move {
            handle_connection(&mut stream, id, adapter, max_request_size).await;
        });
        id += 1;
    }
}

/// 读取一次请求，经 Begin/End 交给管道处理，再写回宿主响应
async fn handle_connection(stream: &mut TcpStream, id: u128, adapter: Arc<HostAdapter>, max_request_size: usize) {
    let mut buffer = vec![0; max_request_size];
    let read = match stream.read(&mut buffer).await {
        Ok(0) => return,
        Ok(n) => n,
        Err(e) => {
            error!("[ID{}]读取TCPStream时遇到错误: {}", id, e);
            return;
        }
    };
    buffer.truncate(read);
    let start_time = Instant::now();

    let request = match Request::try_from(&buffer, id) {
        Ok(request) => request,
        Err(e) => {
            warn!("[ID{}]解析HTTP请求失败: {}，返回400", id, e);
            write_response(stream, id, &Response::from_status_code(400).as_bytes()).await;
            return;
        }
    };
    info!(
        "[ID{}] {}, {}, {}, {}",
        id,
        request.version(),
        request.path(),
        request.method(),
        request.user_agent()
    );

    let response = Arc::new(AsyncMutex::new(Response::new()));
    let shared: SharedHostResponse = response.clone();
    let context = Arc::new(HostContext::new(id, Arc::new(request), shared));

    let (done_tx, done_rx) = oneshot::channel();
    let callback: AsyncCallback<Instant> = Box::new(move |result: Arc<AsyncAdapterResult<Instant>>| {
        debug!("[ID{}]处理完成回调，同步完成: {}", id, result.completed_synchronously());
        let _ = done_tx.send(());
    });

    let result = match adapter.begin_process_request(context, Some(callback), start_time) {
        Ok(result) => result,
        Err(e) => {
            error!("[ID{}]无法开始处理请求：{}", id, e);
            write_response(stream, id, &Response::from_status_code(400).as_bytes()).await;
            return;
        }
    };
    // 回调触发后结果已经完成，End 不会阻塞工作线程
    let _ = done_rx.await;

    let bytes = match adapter.end_process_request(&result) {
        Ok(()) => response.lock().await.as_bytes(),
        Err(Exception::OperationCanceled) => Response::from_status_code(503).as_bytes(),
        Err(_) => Response::from_status_code(500).as_bytes(),
    };
    debug!(
        "[ID{}]HTTP响应构建完成，服务端用时{}ms。",
        id,
        result.state().elapsed().as_millis()
    );
    write_response(stream, id, &bytes).await;
}

async fn write_response(stream: &mut TcpStream, id: u128, bytes: &[u8]) {
    if let Err(e) = stream.write_all(bytes).await {
        error!("[ID{}]发送响应失败: {}", id, e);
        return;
    }
    let _ = stream.flush().await;
}

/// 演示用的模型类型
fn order_types() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    registry.register(
        TypeDescriptor::new("Item")
            .property(
                PropertyDescriptor::new("Sku", STRING_TYPE)
                    .rule(ValidationRule::Required)
                    .rule(ValidationRule::Pattern(r"[A-Z]{3}-\d{4}".to_string())),
            )
            .property(
                PropertyDescriptor::new("Quantity", INT_TYPE)
                    .rule(ValidationRule::Required)
                    .rule(ValidationRule::Range { min: 1.0, max: 1000.0 }),
            )
            .property(
                PropertyDescriptor::new("Price", FLOAT_TYPE)
                    .display("Unit price")
                    .rule(ValidationRule::Range { min: 0.0, max: 100000.0 }),
            ),
    );
    registry.register(
        TypeDescriptor::new("Order")
            .property(
                PropertyDescriptor::new("Customer", STRING_TYPE)
                    .rule(ValidationRule::Required)
                    .rule(ValidationRule::StringLength { min: 1, max: 64 }),
            )
            .property(
                PropertyDescriptor::new("Email", STRING_TYPE)
                    .rule(ValidationRule::Pattern(r"[^@\s]+@[^@\s]+".to_string())),
            )
            .property(PropertyDescriptor::new("Items", "Item[]").rule(ValidationRule::Required)),
    );
    registry
}

fn build_pipeline(cache_capacity: usize) -> Arc<dyn Pipeline> {
    let registry = Arc::new(order_types());
    let metadata_provider = Arc::new(DescriptorMetadataProvider::new(Arc::clone(&registry)));

    let order_rules = TypeValidatorProvider::new().register(
        "Order",
        Arc::new(validator_fn(|metadata, _container| match metadata.model().property("Items") {
            Some(ModelValue::List(items)) if items.is_empty() => vec![ModelValidationResult::for_member(
                "Items",
                "An order must contain at least one item.",
            )],
            _ => Vec::new(),
        })),
    );
    let validator_provider: Arc<dyn ValidatorProvider> = Arc::new(CachedValidatorProvider::new(
        Arc::new(
            CompositeValidatorProvider::new()
                .with(Arc::new(RuleValidatorProvider))
                .with(Arc::new(order_rules)),
        ),
        cache_capacity,
    ));

    Arc::new(pipeline_fn(move |request: PipelineRequest, _cancel| {
        let registry = Arc::clone(&registry);
        let metadata_provider = Arc::clone(&metadata_provider);
        let validator_provider = Arc::clone(&validator_provider);
        async move { route(request, registry, metadata_provider, validator_provider).await }
    }))
}

async fn route(
    request: PipelineRequest,
    registry: Arc<TypeRegistry>,
    metadata_provider: Arc<DescriptorMetadataProvider>,
    validator_provider: Arc<dyn ValidatorProvider>,
) -> Result<PipelineResponse, Exception> {
    let uri = request.uri();
    let path = uri.split('?').next().unwrap_or_default();
    match (request.method(), path) {
        (HttpMethod::Get, "/health") => Ok(PipelineResponse::with_text(200, "ok", "text/plain")),
        (HttpMethod::Post, "/orders") => {
            let body = match request.take_content()? {
                Some(mut content) => content.read_to_bytes().await?,
                None => Default::default(),
            };
            let json = match serde_json::from_slice::<serde_json::Value>(&body) {
                Ok(json) => json,
                Err(e) => {
                    let error = json!({ "error": e.to_string() });
                    return Ok(PipelineResponse::with_text(400, error.to_string(), "application/json"));
                }
            };

            let order = registry.bind(&json, "Order");
            let metadata = Arc::new(metadata_provider.metadata_for_type(order.clone(), "Order"));
            let mut root = ValidationNode::mirror(metadata_provider.as_ref(), metadata, "order");
            root.on_validated(|node, args| {
                debug!(
                    "模型{}验证完成，错误数：{}",
                    node.model_state_key(),
                    args.context.model_state().error_count()
                );
            });

            let mut context = ValidationContext::new(metadata_provider, validator_provider);
            root.validate(&mut context, None);
            let model_state = context.into_model_state();
            if model_state.is_valid() {
                let response = PipelineResponse::with_text(201, order.to_json().to_string(), "application/json");
                response.try_add_header("Location", "/orders/latest")?;
                Ok(response)
            } else {
                Ok(PipelineResponse::with_text(
                    400,
                    model_state.to_json().to_string(),
                    "application/json",
                ))
            }
        }
        _ => Ok(PipelineResponse::with_text(404, "Not Found", "text/plain")),
    }
}
