// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 验证节点树模块
//!
//! 验证树镜像绑定后的模型图：每个节点对应一个逻辑值，持有其元数据、
//! 在模型状态中的路径以及有序的子节点。`validate` 深度优先遍历：
//!
//! 1. 节点被抑制时直接返回，没有任何副作用；
//! 2. 依次调用 validating 处理器，任一处理器请求取消则立即停止；
//! 3. 验证子节点，按需验证没有显式子节点的属性，再验证节点自身的值；
//! 4. 依次调用 validated 处理器。
//!
//! 一次顶层验证在单个线程上同步完成，错误写入共享的 `ModelState`。

use std::{fmt, sync::Arc};

use log::debug;

use crate::{
    metadata::{element_type, MetadataProvider, ModelMetadata},
    model::ModelValue,
    model_state::{index_key, property_key, ModelState},
    validator::ValidatorProvider,
};

/// 没有容器的顶层值为空时记录的错误
pub const VALUE_REQUIRED_MESSAGE: &str = "A value is required but was not present in the request.";

/// 一次顶层验证共享的上下文
pub struct ValidationContext {
    model_state: ModelState,
    metadata_provider: Arc<dyn MetadataProvider>,
    validator_provider: Arc<dyn ValidatorProvider>,
}

impl ValidationContext {
    pub fn new(
        metadata_provider: Arc<dyn MetadataProvider>,
        validator_provider: Arc<dyn ValidatorProvider>,
    ) -> Self {
        Self {
            model_state: ModelState::new(),
            metadata_provider,
            validator_provider,
        }
    }

    pub fn model_state(&self) -> &ModelState {
        &self.model_state
    }

    pub fn model_state_mut(&mut self) -> &mut ModelState {
        &mut self.model_state
    }

    pub fn into_model_state(self) -> ModelState {
        self.model_state
    }

    pub fn metadata_provider(&self) -> &Arc<dyn MetadataProvider> {
        &self.metadata_provider
    }

    pub fn validator_provider(&self) -> &Arc<dyn ValidatorProvider> {
        &self.validator_provider
    }
}

impl fmt::Debug for ValidationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationContext")
            .field("model_state", &self.model_state)
            .finish()
    }
}

/// 验证前事件参数。同一节点的所有处理器共享一份参数，
/// 全部处理器执行完后再检查 `cancel`。
pub struct ValidatingEventArgs<'a> {
    pub context: &'a mut ValidationContext,
    pub parent: Option<&'a ValidationNode>,
    pub cancel: bool,
}

/// 验证后事件参数
pub struct ValidatedEventArgs<'a> {
    pub context: &'a mut ValidationContext,
    pub parent: Option<&'a ValidationNode>,
}

pub type ValidatingHandler = Arc<dyn Fn(&ValidationNode, &mut ValidatingEventArgs<'_>) + Send + Sync>;
pub type ValidatedHandler = Arc<dyn Fn(&ValidationNode, &mut ValidatedEventArgs<'_>) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// 节点被抑制，什么都没有发生
    Suppressed,
    /// validating 处理器请求取消
    Canceled,
    Validated,
}

#[derive(Clone)]
pub struct ValidationNode {
    metadata: Arc<ModelMetadata>,
    model_state_key: String,
    children: Vec<ValidationNode>,
    validate_all_properties: bool,
    suppress_validation: bool,
    validating: Vec<ValidatingHandler>,
    validated: Vec<ValidatedHandler>,
}

impl ValidationNode {
    pub fn new(metadata: Arc<ModelMetadata>, model_state_key: impl Into<String>) -> Self {
        Self {
            metadata,
            model_state_key: model_state_key.into(),
            children: Vec::new(),
            validate_all_properties: false,
            suppress_validation: false,
            validating: Vec::new(),
            validated: Vec::new(),
        }
    }

    pub fn with_children(
        metadata: Arc<ModelMetadata>,
        model_state_key: impl Into<String>,
        children: Vec<ValidationNode>,
    ) -> Self {
        let mut node = Self::new(metadata, model_state_key);
        node.children = children;
        node
    }

    /// 按值的形状构造整棵树：对象按声明属性展开，列表按元素展开（键为 `key[i]`）
    pub fn mirror(
        provider: &dyn MetadataProvider,
        metadata: Arc<ModelMetadata>,
        model_state_key: impl Into<String>,
    ) -> Self {
        let mut node = Self::new(Arc::clone(&metadata), model_state_key);
        match metadata.model() {
            ModelValue::Object(_) => {
                for property in metadata.properties() {
                    let key = property_key(&node.model_state_key, property.property_name().unwrap_or_default());
                    node.add_child(Self::mirror(provider, Arc::clone(property), key));
                }
            }
            ModelValue::List(items) => {
                if let Some(item_type) = element_type(metadata.model_type()) {
                    for (i, item) in items.iter().enumerate() {
                        let item_metadata = provider.metadata_for_type(item.clone(), item_type);
                        let key = index_key(&node.model_state_key, i);
                        node.add_child(Self::mirror(provider, Arc::new(item_metadata), key));
                    }
                }
            }
            _ => {}
        }
        node
    }

    pub fn metadata(&self) -> &Arc<ModelMetadata> {
        &self.metadata
    }

    pub fn model_state_key(&self) -> &str {
        &self.model_state_key
    }

    pub fn children(&self) -> &[ValidationNode] {
        &self.children
    }

    pub fn add_child(&mut self, child: ValidationNode) {
        self.children.push(child);
    }

    pub fn validate_all_properties(&self) -> bool {
        self.validate_all_properties
    }

    pub fn set_validate_all_properties(&mut self, value: bool) {
        self.validate_all_properties = value;
    }

    pub fn suppress_validation(&self) -> bool {
        self.suppress_validation
    }

    pub fn set_suppress_validation(&mut self, value: bool) {
        self.suppress_validation = value;
    }

    pub fn validating_handlers(&self) -> &[ValidatingHandler] {
        &self.validating
    }

    pub fn validated_handlers(&self) -> &[ValidatedHandler] {
        &self.validated
    }

    pub fn on_validating<F>(&mut self, handler: F)
    where
        F: Fn(&ValidationNode, &mut ValidatingEventArgs<'_>) + Send + Sync + 'static,
    {
        self.validating.push(Arc::new(handler));
    }

    pub fn on_validated<F>(&mut self, handler: F)
    where
        F: Fn(&ValidationNode, &mut ValidatedEventArgs<'_>) + Send + Sync + 'static,
    {
        self.validated.push(Arc::new(handler));
    }

    /// 合并另一个节点：追加它的处理器与子节点，不按键去重。
    /// `other` 为空或被抑制时什么也不做，`other` 本身不会被修改。
    pub fn combine_with(&mut self, other: Option<&ValidationNode>) {
        let Some(other) = other.filter(|other| !other.suppress_validation) else {
            return;
        };
        self.validating.extend(other.validating.iter().cloned());
        self.validated.extend(other.validated.iter().cloned());
        self.children.extend(other.children.iter().cloned());
    }

    pub fn validate(&self, context: &mut ValidationContext, parent: Option<&ValidationNode>) -> ValidationOutcome {
        if self.suppress_validation {
            return ValidationOutcome::Suppressed;
        }
        if !self.fire_validating(context, parent) {
            debug!("验证节点 {} 被处理器取消", self.model_state_key);
            return ValidationOutcome::Canceled;
        }

        for child in &self.children {
            child.validate(context, Some(self));
        }
        if self.validate_all_properties {
            self.validate_properties(context);
        }
        self.validate_this(context, parent);

        self.fire_validated(context, parent);
        ValidationOutcome::Validated
    }

    // 返回 false 表示取消
    fn fire_validating(&self, context: &mut ValidationContext, parent: Option<&ValidationNode>) -> bool {
        if self.validating.is_empty() {
            return true;
        }
        let mut args = ValidatingEventArgs {
            context,
            parent,
            cancel: false,
        };
        for handler in &self.validating {
            handler(self, &mut args);
        }
        !args.cancel
    }

    fn fire_validated(&self, context: &mut ValidationContext, parent: Option<&ValidationNode>) {
        if self.validated.is_empty() {
            return;
        }
        let mut args = ValidatedEventArgs { context, parent };
        for handler in &self.validated {
            handler(self, &mut args);
        }
    }

    fn validate_properties(&self, context: &mut ValidationContext) {
        // 每次都按当前值重新解析元数据，不复用节点上的快照
        let metadata_provider = Arc::clone(&context.metadata_provider);
        let validator_provider = Arc::clone(&context.validator_provider);
        let metadata =
            metadata_provider.metadata_for_type(self.metadata.model().clone(), self.metadata.model_type());
        let container = metadata.model();

        for property in metadata.properties() {
            let key = property_key(&self.model_state_key, property.property_name().unwrap_or_default());
            if self
                .children
                .iter()
                .any(|child| child.model_state_key.eq_ignore_ascii_case(&key))
            {
                continue;
            }
            if !context.model_state.is_valid_field(&key) {
                continue;
            }
            for validator in validator_provider.validators_for(property) {
                for result in validator.validate(property, Some(container)) {
                    context
                        .model_state
                        .add_error(&property_key(&key, &result.member_name), result.message);
                }
            }
        }
    }

    fn validate_this(&self, context: &mut ValidationContext, parent: Option<&ValidationNode>) {
        if !context.model_state.is_valid_field(&self.model_state_key) {
            return;
        }

        if parent.is_none() && self.metadata.model().is_null() {
            let key = property_key(&self.model_state_key, &self.metadata.get_display_name());
            context.model_state.add_error(&key, VALUE_REQUIRED_MESSAGE);
            return;
        }

        let container = parent.map(|p| p.metadata.model()).filter(|value| {
            self.metadata
                .container_type()
                .map_or(false, |container_type| value.is_instance_of(container_type))
        });

        let validator_provider = Arc::clone(&context.validator_provider);
        for validator in validator_provider.validators_for(&self.metadata) {
            for result in validator.validate(&self.metadata, container) {
                let key = property_key(&self.model_state_key, &result.member_name);
                context.model_state.add_error(&key, result.message);
            }
        }
    }
}

impl fmt::Debug for ValidationNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationNode")
            .field("model_state_key", &self.model_state_key)
            .field("model_type", &self.metadata.model_type())
            .field("children", &self.children)
            .field("validate_all_properties", &self.validate_all_properties)
            .field("suppress_validation", &self.suppress_validation)
            .field("validating", &self.validating.len())
            .field("validated", &self.validated.len())
            .finish()
    }
}
