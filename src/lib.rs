pub mod adapter;
pub mod async_result;
pub mod config;
pub mod exception;
pub mod headers;
pub mod host;
pub mod message;
pub mod metadata;
pub mod model;
pub mod model_state;
pub mod param;
pub mod pipeline;
pub mod request;
pub mod response;
pub mod util;
pub mod validation_node;
pub mod validator;

pub use adapter::{convert_request, convert_response, HostAdapter, RequestConverter};
pub use async_result::{AsyncAdapterResult, AsyncCallback};
pub use exception::Exception;
pub use headers::HeaderMap;
pub use host::{HostContext, HostRequest, HostResponse};
pub use message::{Content, PipelineRequest, PipelineResponse};
pub use model::{ModelObject, ModelValue};
pub use model_state::ModelState;
pub use param::HttpMethod;
pub use pipeline::{CancelSignal, InvokerSlot, Pipeline};
pub use request::Request;
pub use response::Response;
pub use util::HtmlBuilder;
pub use validation_node::{ValidationContext, ValidationNode};
