// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

#[cfg(test)]
mod validation_tests {
    //! # 验证节点树集成测试
    //!
    //! 从 JSON 绑定模型、镜像出验证树，再检查错误存储、处理器调用与合并行为。

    use std::sync::{Arc, Mutex};

    use mockall::mock;
    use serde_json::json;

    use webbridge::{
        metadata::{
            DescriptorMetadataProvider, MetadataProvider, ModelMetadata, PropertyDescriptor, TypeDescriptor,
            TypeRegistry, ValidationRule,
        },
        model::{ModelObject, ModelValue, FLOAT_TYPE, INT_TYPE, STRING_TYPE},
        validation_node::{ValidationContext, ValidationNode, ValidationOutcome, VALUE_REQUIRED_MESSAGE},
        validator::{ModelValidator, RuleValidatorProvider, ValidatorProvider},
    };

    mock! {
        pub Validators {}

        impl ValidatorProvider for Validators {
            fn validators_for(&self, metadata: &ModelMetadata) -> Vec<Arc<dyn ModelValidator>>;
        }
    }

    mock! {
        pub Metadata {}

        impl MetadataProvider for Metadata {
            fn metadata_for_type(&self, model: ModelValue, model_type: &str) -> ModelMetadata;
        }
    }

    fn registry() -> Arc<TypeRegistry> {
        let mut registry = TypeRegistry::new();
        registry.register(
            TypeDescriptor::new("Item")
                .property(
                    PropertyDescriptor::new("Sku", STRING_TYPE)
                        .rule(ValidationRule::Required)
                        .rule(ValidationRule::Pattern(r"[A-Z]{3}-\d{4}".to_string())),
                )
                .property(
                    PropertyDescriptor::new("Quantity", INT_TYPE).rule(ValidationRule::Range { min: 1.0, max: 10.0 }),
                )
                .property(PropertyDescriptor::new("Price", FLOAT_TYPE).display("Unit price")),
        );
        registry.register(
            TypeDescriptor::new("Order")
                .property(PropertyDescriptor::new("Customer", STRING_TYPE).rule(ValidationRule::Required))
                .property(PropertyDescriptor::new("Items", "Item[]").rule(ValidationRule::Required)),
        );
        Arc::new(registry)
    }

    fn provider() -> Arc<DescriptorMetadataProvider> {
        Arc::new(DescriptorMetadataProvider::new(registry()))
    }

    fn order_tree(provider: &Arc<DescriptorMetadataProvider>, json: serde_json::Value) -> ValidationNode {
        let order = provider.registry().bind(&json, "Order");
        let metadata = Arc::new(provider.metadata_for_type(order, "Order"));
        ValidationNode::mirror(provider.as_ref(), metadata, "order")
    }

    fn rule_context(provider: &Arc<DescriptorMetadataProvider>) -> ValidationContext {
        ValidationContext::new(provider.clone(), Arc::new(RuleValidatorProvider))
    }

    /// 记录被请求验证器的节点：(容器类型, 属性名, 类型)
    #[derive(Default)]
    struct RecordingProvider {
        asked: Mutex<Vec<(Option<String>, Option<String>, String)>>,
    }

    impl ValidatorProvider for RecordingProvider {
        fn validators_for(&self, metadata: &ModelMetadata) -> Vec<Arc<dyn ModelValidator>> {
            self.asked.lock().unwrap().push((
                metadata.container_type().map(str::to_string),
                metadata.property_name().map(str::to_string),
                metadata.model_type().to_string(),
            ));
            RuleValidatorProvider.validators_for(metadata)
        }
    }

    #[test]
    fn test_bound_order_errors_by_path() {
        let provider = provider();
        let root = order_tree(
            &provider,
            json!({
                "Customer": "  ",
                "Items": [
                    {"Sku": "ABC-1234", "Quantity": 2, "Price": 3.5},
                    {"Sku": "bad", "Quantity": 20},
                ]
            }),
        );
        let mut context = rule_context(&provider);
        assert_eq!(root.validate(&mut context, None), ValidationOutcome::Validated);

        let state = context.into_model_state();
        assert_eq!(state.errors("order.Customer"), ["The Customer field is required."]);
        assert_eq!(
            state.errors("order.Items[1].Sku"),
            ["The field Sku must match the regular expression '[A-Z]{3}-\\d{4}'."]
        );
        assert_eq!(
            state.errors("order.Items[1].Quantity"),
            ["The field Quantity must be between 1 and 10."]
        );
        assert!(state.is_valid_field("order.Items[0].Sku"));
        assert_eq!(state.error_count(), 3);
        assert_eq!(
            state.to_json()["order.Customer"],
            json!(["The Customer field is required."])
        );
    }

    /// 被抑制的节点不调用任何处理器，也不留下任何错误，即使子节点有错
    #[test]
    fn test_suppressed_node_has_no_effect() {
        let provider = provider();
        let mut root = order_tree(&provider, json!({"Customer": null, "Items": [{"Sku": null}]}));
        let fired = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&fired);
        root.on_validating(move |_, _| *counter.lock().unwrap() += 1);
        let counter = Arc::clone(&fired);
        root.on_validated(move |_, _| *counter.lock().unwrap() += 1);
        root.set_suppress_validation(true);

        let mut validators = MockValidators::new();
        validators.expect_validators_for().never();
        let mut context = ValidationContext::new(provider.clone(), Arc::new(validators));

        assert_eq!(root.validate(&mut context, None), ValidationOutcome::Suppressed);
        assert!(context.model_state().is_valid());
        assert_eq!(*fired.lock().unwrap(), 0);
    }

    /// 没有父节点且值为空的根节点只记录一条“值必填”错误，不运行普通验证器
    #[test]
    fn test_null_root_records_value_required() {
        let provider = provider();
        let metadata = Arc::new(ModelMetadata::new(ModelValue::Null, "Order").with_display_name("Purchase order"));
        let root = ValidationNode::new(metadata, "order");

        let mut validators = MockValidators::new();
        validators.expect_validators_for().never();
        let mut context = ValidationContext::new(provider.clone(), Arc::new(validators));
        root.validate(&mut context, None);

        let state = context.model_state();
        assert_eq!(state.error_count(), 1);
        assert_eq!(state.errors("order.Purchase order"), [VALUE_REQUIRED_MESSAGE]);
    }

    /// 已经有错误的路径不再运行验证器，但子节点照常验证
    #[test]
    fn test_invalid_path_skips_own_validators_only() {
        let provider = provider();
        let root = order_tree(&provider, json!({"Customer": "Ann", "Items": [{"Sku": "nope", "Quantity": 1}]}));
        let recording = Arc::new(RecordingProvider::default());
        let mut context = ValidationContext::new(provider.clone(), recording.clone());
        context.model_state_mut().add_error("order.Items", "rejected by binder");

        root.validate(&mut context, None);

        let asked = recording.asked.lock().unwrap();
        assert!(!asked
            .iter()
            .any(|(container, property, _)| container.as_deref() == Some("Order")
                && property.as_deref() == Some("Items")));
        assert!(asked.iter().any(|(_, property, _)| property.as_deref() == Some("Sku")));
        assert_eq!(context.model_state().errors("order.Items"), ["rejected by binder"]);
        assert_eq!(context.model_state().errors("order.Items[0].Sku").len(), 1);
    }

    #[test]
    fn test_child_cancellation_is_local() {
        let provider = provider();
        let mut root = order_tree(&provider, json!({"Customer": null, "Items": [{"Sku": null}]}));
        let fired = Arc::new(Mutex::new(Vec::new()));

        let mut items = root.children()[1].clone();
        items.on_validating(|_, args| args.cancel = true);
        let log = Arc::clone(&fired);
        items.on_validated(move |node, _| log.lock().unwrap().push(node.model_state_key().to_string()));
        let mut rebuilt = ValidationNode::new(Arc::clone(root.metadata()), "order");
        rebuilt.add_child(root.children()[0].clone());
        rebuilt.add_child(items);
        let log = Arc::clone(&fired);
        rebuilt.on_validated(move |node, _| log.lock().unwrap().push(node.model_state_key().to_string()));
        root = rebuilt;

        let mut context = rule_context(&provider);
        assert_eq!(root.validate(&mut context, None), ValidationOutcome::Validated);

        let state = context.model_state();
        assert!(!state.is_valid_field("order.Customer"));
        assert!(state.is_valid_field("order.Items[0].Sku"));
        assert_eq!(*fired.lock().unwrap(), vec!["order".to_string()]);
    }

    /// 处理器按注册顺序执行，并收到父节点
    #[test]
    fn test_handlers_run_in_order_with_parent() {
        let provider = provider();
        let root = order_tree(&provider, json!({"Customer": "Ann", "Items": []}));
        let mut customer = root.children()[0].clone();
        let calls = Arc::new(Mutex::new(Vec::new()));

        let log = Arc::clone(&calls);
        customer.on_validating(move |_, args| {
            let parent = args.parent.map(|p| p.model_state_key().to_string());
            log.lock().unwrap().push(format!("validating-1 {:?}", parent));
        });
        let log = Arc::clone(&calls);
        customer.on_validating(move |_, _| log.lock().unwrap().push("validating-2".to_string()));
        let log = Arc::clone(&calls);
        customer.on_validated(move |_, args| {
            let errors = args.context.model_state().error_count();
            log.lock().unwrap().push(format!("validated {}", errors));
        });

        let mut context = rule_context(&provider);
        customer.validate(&mut context, Some(&root));
        assert_eq!(
            *calls.lock().unwrap(),
            vec![
                "validating-1 Some(\"order\")".to_string(),
                "validating-2".to_string(),
                "validated 0".to_string(),
            ]
        );
    }

    /// 验证所有属性时总是按当前值重新解析元数据，并跳过已有子节点的属性
    #[test]
    fn test_validate_all_properties_reresolves_metadata() {
        let registry = registry();
        let real = DescriptorMetadataProvider::new(Arc::clone(&registry));
        let order: ModelValue = ModelObject::new("Order")
            .with("Customer", ModelValue::Null)
            .with("Items", ModelValue::Null)
            .into();

        let fresh = real.metadata_for_type(order.clone(), "Order");
        let mut metadata = MockMetadata::new();
        metadata
            .expect_metadata_for_type()
            .withf(|model, model_type| model.is_instance_of("Order") && model_type.to_string() == "Order")
            .times(1)
            .return_const(fresh);

        // 节点上的快照没有属性信息
        let stale = Arc::new(ModelMetadata::new(order, "Order"));
        let mut root = ValidationNode::new(Arc::clone(&stale), "order");
        let customer_metadata = Arc::new(ModelMetadata::for_property(
            "Order",
            &PropertyDescriptor::new("Customer", STRING_TYPE),
            ModelValue::Null,
        ));
        root.add_child(ValidationNode::new(customer_metadata, "order.Customer"));
        root.set_validate_all_properties(true);

        let mut context = ValidationContext::new(Arc::new(metadata), Arc::new(RuleValidatorProvider));
        root.validate(&mut context, None);

        // Customer 有显式子节点（其元数据没有规则），只有 Items 由属性验证报告
        let state = context.model_state();
        assert_eq!(state.keys().collect::<Vec<_>>(), vec!["order.Items"]);
        assert_eq!(state.errors("order.Items"), ["The Items field is required."]);
    }

    /// 合并：子节点数量相加，处理器列表拼接，`other` 不变
    #[test]
    fn test_combine_with() {
        let provider = provider();
        let mut a = order_tree(&provider, json!({"Customer": "Ann", "Items": []}));
        let mut b = order_tree(&provider, json!({"Customer": null, "Items": []}));
        a.on_validating(|_, _| {});
        b.on_validating(|_, _| {});
        b.on_validated(|_, _| {});
        let b_children = b.children().len();

        let a_children = a.children().len();
        a.combine_with(Some(&b));
        assert_eq!(a.children().len(), a_children + b_children);
        assert_eq!(a.validating_handlers().len(), 2);
        assert_eq!(a.validated_handlers().len(), 1);
        assert_eq!(b.children().len(), b_children);
        assert_eq!(b.validating_handlers().len(), 1);

        // 重复的键都会被遍历
        let keys: Vec<_> = a.children().iter().map(|c| c.model_state_key()).collect();
        assert_eq!(keys.iter().filter(|k| **k == "order.Customer").count(), 2);
        let mut context = rule_context(&provider);
        a.validate(&mut context, None);
        assert_eq!(context.model_state().errors("order.Customer").len(), 1);

        let before = a.children().len();
        a.combine_with(None);
        let mut suppressed = b.clone();
        suppressed.set_suppress_validation(true);
        a.combine_with(Some(&suppressed));
        assert_eq!(a.children().len(), before);
        assert_eq!(a.validating_handlers().len(), 2);
    }
}
