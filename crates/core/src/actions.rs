//! Built-in business actions and the single dispatch point that runs them.

use std::sync::Arc;

use crate::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink};
use crate::domain::complaint::ComplaintEntry;
use crate::domain::phone::{is_valid_phone_number, mask_phone_number};
use crate::domain::product::Product;
use crate::domain::record::{field_text, Record};
use crate::ports::{ExtractorSet, InputError, Prompter, Recommender, RecordStores, StoreError};
use crate::rules::{ExtractorKind, RuleSet};
use crate::session::{fields, ChatHistory, SessionState};

pub const GREETING_MESSAGE: &str = "您好！请问有什么可以帮您？";
pub const PHONE_PROMPT: &str = "请提供您的手机号码以继续查询订单。";
pub const PHONE_RETRY_PROMPT: &str = "抱歉，未能识别有效的手机号码。请重试。请提供您的手机号码以继续查询订单。";
pub const ORDER_NOT_FOUND: &str = "抱歉，未能获取到您的订单信息。";
pub const MEMBERSHIP_NOT_FOUND: &str = "抱歉，未能获取到您的会员信息。";
pub const PHONE_MISSING: &str = "抱歉，还没有您的手机号码，请先提供手机号码。";
pub const PREFERENCE_PROMPT: &str = "请描述一下您想要的产品（例如用途、预算、偏好的功能）。";
pub const COMPLAINT_PROMPT: &str = "请详细描述您遇到的问题，我们会尽快处理。";
pub const RECOMMENDATION_UNAVAILABLE: &str = "抱歉，暂时无法为您推荐产品。";
pub const NO_PRODUCTS: &str = "抱歉，暂时没有可推荐的产品。";
pub const COMPLAINT_MISSING: &str = "抱歉，没有收到您的投诉内容。";

const ORDER_NUMBER_SLOT: &str = "order_number";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionKind {
    Greet,
    CheckPhoneNumber,
    GetOrderInfo,
    GetMembershipInfo,
    QueryOrderStatus,
    CollectPreference,
    RecommendProduct,
    CollectComplaint,
    RecordComplaint,
    Unrecognized(String),
}

impl ActionKind {
    pub fn parse(name: &str) -> Self {
        match name.trim() {
            "greet" => Self::Greet,
            "check_phone_number" => Self::CheckPhoneNumber,
            "get_order_info" => Self::GetOrderInfo,
            "get_membership_info" => Self::GetMembershipInfo,
            "query_order_status" => Self::QueryOrderStatus,
            "collect_preference" => Self::CollectPreference,
            "recommend_product" => Self::RecommendProduct,
            "collect_complaint" => Self::CollectComplaint,
            "record_complaint" => Self::RecordComplaint,
            other => Self::Unrecognized(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Greet => "greet",
            Self::CheckPhoneNumber => "check_phone_number",
            Self::GetOrderInfo => "get_order_info",
            Self::GetMembershipInfo => "get_membership_info",
            Self::QueryOrderStatus => "query_order_status",
            Self::CollectPreference => "collect_preference",
            Self::RecommendProduct => "recommend_product",
            Self::CollectComplaint => "collect_complaint",
            Self::RecordComplaint => "record_complaint",
            Self::Unrecognized(name) => name,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unrecognized(_))
    }
}

/// Action names referenced by `rules` that no built-in action answers to.
/// Each one is logged at `warn`; dispatch still recovers from them.
pub fn unrecognized_actions(rules: &RuleSet) -> Vec<String> {
    let unknown = rules
        .referenced_actions()
        .into_iter()
        .filter(|name| !ActionKind::parse(name).is_recognized())
        .map(str::to_string)
        .collect::<Vec<_>>();
    for name in &unknown {
        tracing::warn!(
            event_name = "rules.unrecognized_action",
            action = %name,
            "rules reference an action with no built-in implementation"
        );
    }
    unknown
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionStatus {
    Succeeded,
    NotFound,
    Failed,
    Unrecognized,
}

impl ActionStatus {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::NotFound => "not_found",
            Self::Failed => "failed",
            Self::Unrecognized => "unrecognized",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionOutcome {
    pub action: ActionKind,
    pub status: ActionStatus,
    pub message: String,
}

impl ActionOutcome {
    fn new(action: &ActionKind, status: ActionStatus, message: impl Into<String>) -> Self {
        Self { action: action.clone(), status, message: message.into() }
    }
}

pub struct ActionDispatcher {
    stores: RecordStores,
    recommender: Arc<dyn Recommender>,
    extractors: ExtractorSet,
    audit: Arc<dyn AuditSink>,
}

impl ActionDispatcher {
    pub fn new(
        stores: RecordStores,
        recommender: Arc<dyn Recommender>,
        extractors: ExtractorSet,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self { stores, recommender, extractors, audit }
    }

    /// Runs one action. Only a failed interactive read is an error; every
    /// business failure is reported through the outcome's message.
    pub fn dispatch(
        &self,
        action: &ActionKind,
        session: &mut SessionState,
        prompter: &mut dyn Prompter,
        context: &AuditContext,
    ) -> Result<ActionOutcome, InputError> {
        let context = context.with_actor("action-dispatcher");
        let outcome = match action {
            ActionKind::Greet => ActionOutcome::new(action, ActionStatus::Succeeded, GREETING_MESSAGE),
            ActionKind::CheckPhoneNumber => self.check_phone_number(action, session, prompter)?,
            ActionKind::GetOrderInfo => self.get_order_info(action, session, &context),
            ActionKind::GetMembershipInfo => self.get_membership_info(action, session, &context),
            ActionKind::QueryOrderStatus => self.query_order_status(action, session, &context),
            ActionKind::CollectPreference => {
                let preference = ask_until_non_empty(session, prompter, PREFERENCE_PROMPT)?;
                session.set_field(fields::PREFERENCE, preference);
                ActionOutcome::new(action, ActionStatus::Succeeded, "已记录您的需求。")
            }
            ActionKind::RecommendProduct => self.recommend_product(action, session, &context),
            ActionKind::CollectComplaint => {
                let complaint = ask_until_non_empty(session, prompter, COMPLAINT_PROMPT)?;
                session.set_field(fields::COMPLAINT, complaint);
                ActionOutcome::new(action, ActionStatus::Succeeded, "已收到您的反馈。")
            }
            ActionKind::RecordComplaint => self.record_complaint(action, session, &context),
            ActionKind::Unrecognized(name) => {
                self.audit.emit(
                    context
                        .event("action.unrecognized", AuditCategory::Action, AuditOutcome::Rejected)
                        .with_metadata("action", name.clone()),
                );
                ActionOutcome::new(
                    action,
                    ActionStatus::Unrecognized,
                    format!("抱歉，我无法执行动作 '{name}'。"),
                )
            }
        };

        self.audit.emit(
            context
                .event("action.dispatched", AuditCategory::Action, audit_outcome(outcome.status))
                .with_metadata("action", action.name())
                .with_metadata("status", outcome.status.as_str()),
        );
        Ok(outcome)
    }

    fn check_phone_number(
        &self,
        action: &ActionKind,
        session: &mut SessionState,
        prompter: &mut dyn Prompter,
    ) -> Result<ActionOutcome, InputError> {
        let mut prompt = PHONE_PROMPT;
        let phone = loop {
            let answer = ask(session, prompter, prompt)?;
            let candidate = self
                .extractors
                .get(ExtractorKind::PhoneNumber)
                .and_then(|extractor| extractor.extract(&ChatHistory::from_user_text(answer)));
            match candidate {
                Some(phone) if is_valid_phone_number(phone.trim()) => break phone.trim().to_string(),
                _ => prompt = PHONE_RETRY_PROMPT,
            }
        };

        let message = format!("已记录您的手机号码：{}", mask_phone_number(&phone));
        session.set_field(fields::PHONE_NUMBER, phone);
        Ok(ActionOutcome::new(action, ActionStatus::Succeeded, message))
    }

    fn get_order_info(
        &self,
        action: &ActionKind,
        session: &SessionState,
        context: &AuditContext,
    ) -> ActionOutcome {
        let Some(phone) = session.lookup_value(fields::PHONE_NUMBER).map(str::to_string) else {
            return ActionOutcome::new(action, ActionStatus::NotFound, PHONE_MISSING);
        };
        if !is_valid_phone_number(&phone) {
            return ActionOutcome::new(action, ActionStatus::NotFound, ORDER_NOT_FOUND);
        }

        match self.read(self.stores.orders.get(&phone), "orders", context) {
            Some(Some(order)) => {
                let mut lines = vec![
                    "您的订单信息如下：".to_string(),
                    format!("手机号码：{}", mask_phone_number(&phone)),
                ];
                push_field(&mut lines, &order, "用户名", &["user_name", "用户名", "name"]);
                push_field(&mut lines, &order, "订单编号", &["order_id", "order_number", "订单编号"]);
                push_field(&mut lines, &order, "订单状态", &["order_status", "status", "订单状态"]);
                ActionOutcome::new(action, ActionStatus::Succeeded, lines.join("\n"))
            }
            Some(None) => ActionOutcome::new(action, ActionStatus::NotFound, ORDER_NOT_FOUND),
            None => ActionOutcome::new(action, ActionStatus::Failed, ORDER_NOT_FOUND),
        }
    }

    fn get_membership_info(
        &self,
        action: &ActionKind,
        session: &SessionState,
        context: &AuditContext,
    ) -> ActionOutcome {
        let Some(phone) = session.lookup_value(fields::PHONE_NUMBER).map(str::to_string) else {
            return ActionOutcome::new(action, ActionStatus::NotFound, PHONE_MISSING);
        };

        match self.read(self.stores.membership.get(&phone), "membership", context) {
            Some(Some(member)) => {
                let mut lines = vec![
                    "您的会员信息如下：".to_string(),
                    format!("手机号码：{}", mask_phone_number(&phone)),
                ];
                push_field(&mut lines, &member, "会员等级", &["level", "会员等级"]);
                push_field(&mut lines, &member, "积分", &["points", "积分"]);
                ActionOutcome::new(action, ActionStatus::Succeeded, lines.join("\n"))
            }
            Some(None) => ActionOutcome::new(action, ActionStatus::NotFound, MEMBERSHIP_NOT_FOUND),
            None => ActionOutcome::new(action, ActionStatus::Failed, MEMBERSHIP_NOT_FOUND),
        }
    }

    fn query_order_status(
        &self,
        action: &ActionKind,
        session: &SessionState,
        context: &AuditContext,
    ) -> ActionOutcome {
        let Some(order_number) = session.slot(ORDER_NUMBER_SLOT).map(str::to_string) else {
            return ActionOutcome::new(action, ActionStatus::Failed, "抱歉，缺少订单号，无法查询。");
        };

        let mut message = format!("正在为您查询订单 {order_number} 的状态... (模拟执行)");
        if let Some(Some(order)) = self.read(self.stores.orders.get(&order_number), "orders", context)
        {
            if let Some(status) = field_text(&order, &["order_status", "status", "订单状态"]) {
                message.push_str(&format!("\n订单状态：{status}"));
            }
        }
        ActionOutcome::new(action, ActionStatus::Succeeded, message)
    }

    fn recommend_product(
        &self,
        action: &ActionKind,
        session: &SessionState,
        context: &AuditContext,
    ) -> ActionOutcome {
        let Some(products) = self.read(self.stores.products.products(), "products", context) else {
            return ActionOutcome::new(action, ActionStatus::Failed, RECOMMENDATION_UNAVAILABLE);
        };
        if products.is_empty() {
            return ActionOutcome::new(action, ActionStatus::NotFound, NO_PRODUCTS);
        }

        let preference = session.field(fields::PREFERENCE).unwrap_or_default();
        match self.recommender.recommend(preference, &products) {
            Some(product) => ActionOutcome::new(
                action,
                ActionStatus::Succeeded,
                format_recommendation(&product),
            ),
            None => ActionOutcome::new(action, ActionStatus::NotFound, NO_PRODUCTS),
        }
    }

    fn record_complaint(
        &self,
        action: &ActionKind,
        session: &SessionState,
        context: &AuditContext,
    ) -> ActionOutcome {
        let raw_input = session
            .field(fields::COMPLAINT)
            .or_else(|| session.history.latest_user_text())
            .map(str::trim)
            .unwrap_or_default()
            .to_string();
        if raw_input.is_empty() {
            return ActionOutcome::new(action, ActionStatus::NotFound, COMPLAINT_MISSING);
        }

        let summary = self
            .extractors
            .get(ExtractorKind::ComplaintSummary)
            .and_then(|extractor| extractor.extract(&ChatHistory::from_user_text(raw_input.clone())))
            .unwrap_or_else(|| raw_input.clone());
        let entry = ComplaintEntry::new(session.id.clone(), raw_input, summary.clone());

        let appended = serde_json::to_value(&entry)
            .map_err(|error| StoreError::Unavailable(error.to_string()))
            .and_then(|value| self.stores.complaints.append(&value));
        if let Err(error) = appended {
            self.audit.emit(
                context
                    .event("store.append_failed", AuditCategory::Storage, AuditOutcome::Failed)
                    .with_metadata("store", "complaints")
                    .with_metadata("error", error.to_string()),
            );
        }

        ActionOutcome::new(
            action,
            ActionStatus::Succeeded,
            format!("您的投诉已记录，我们会尽快处理：{summary}"),
        )
    }

    /// `None` when the store failed; the failure is audited here.
    fn read<T>(
        &self,
        result: Result<T, StoreError>,
        store: &'static str,
        context: &AuditContext,
    ) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(error) => {
                self.audit.emit(
                    context
                        .event("store.read_failed", AuditCategory::Storage, AuditOutcome::Failed)
                        .with_metadata("store", store)
                        .with_metadata("error", error.to_string()),
                );
                None
            }
        }
    }
}

fn audit_outcome(status: ActionStatus) -> AuditOutcome {
    match status {
        ActionStatus::Succeeded => AuditOutcome::Success,
        ActionStatus::NotFound | ActionStatus::Unrecognized => AuditOutcome::Rejected,
        ActionStatus::Failed => AuditOutcome::Failed,
    }
}

fn ask(
    session: &mut SessionState,
    prompter: &mut dyn Prompter,
    prompt: &str,
) -> Result<String, InputError> {
    session.history.push_assistant(prompt);
    let answer = prompter.ask(prompt)?.trim().to_string();
    session.history.push_user(answer.clone());
    Ok(answer)
}

fn ask_until_non_empty(
    session: &mut SessionState,
    prompter: &mut dyn Prompter,
    prompt: &str,
) -> Result<String, InputError> {
    loop {
        let answer = ask(session, prompter, prompt)?;
        if !answer.is_empty() {
            return Ok(answer);
        }
    }
}

fn push_field(lines: &mut Vec<String>, record: &Record, label: &str, keys: &[&str]) {
    if let Some(value) = field_text(record, keys) {
        lines.push(format!("{label}：{value}"));
    }
}

fn format_recommendation(product: &Product) -> String {
    let details = [product.brand.as_str(), product.description.as_str(), product.features.as_str()]
        .into_iter()
        .filter(|part| !part.trim().is_empty())
        .collect::<Vec<_>>();
    if details.is_empty() {
        format!("根据您的需求，推荐您购买：{}", product.name)
    } else {
        format!("根据您的需求，推荐您购买：{}（{}）", product.name, details.join("，"))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, VecDeque};
    use std::sync::{Arc, Mutex};

    use serde_json::{json, Value};

    use super::{
        unrecognized_actions, ActionDispatcher, ActionKind, ActionStatus, COMPLAINT_PROMPT,
        MEMBERSHIP_NOT_FOUND, ORDER_NOT_FOUND, PHONE_PROMPT, PHONE_RETRY_PROMPT,
    };
    use crate::audit::{AuditContext, InMemoryAuditSink};
    use crate::domain::product::Product;
    use crate::domain::record::Record;
    use crate::ports::{
        AppendLog, ExtractorSet, InputError, ProductCatalog, Prompter, Recommender, RecordStore,
        RecordStores, SlotExtractor, StoreError,
    };
    use crate::rules::{ExtractorKind, RuleSet};
    use crate::session::{fields, ChatHistory, SessionId, SessionState};

    struct MapStore(BTreeMap<String, Record>);

    impl RecordStore for MapStore {
        fn get(&self, key: &str) -> Result<Option<Record>, StoreError> {
            Ok(self.0.get(key).cloned())
        }
    }

    struct BrokenStore;

    impl RecordStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<Record>, StoreError> {
            Err(StoreError::Unavailable("disk offline".to_string()))
        }
    }

    impl AppendLog for BrokenStore {
        fn append(&self, _entry: &Value) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("disk full".to_string()))
        }
    }

    #[derive(Default)]
    struct VecLog(Mutex<Vec<Value>>);

    impl AppendLog for VecLog {
        fn append(&self, entry: &Value) -> Result<(), StoreError> {
            self.0.lock().expect("log lock").push(entry.clone());
            Ok(())
        }
    }

    struct Catalog(Vec<Product>);

    impl ProductCatalog for Catalog {
        fn products(&self) -> Result<Vec<Product>, StoreError> {
            Ok(self.0.clone())
        }
    }

    struct FirstProduct;

    impl Recommender for FirstProduct {
        fn recommend(&self, _preference: &str, products: &[Product]) -> Option<Product> {
            products.first().cloned()
        }
    }

    struct Digits;

    impl SlotExtractor for Digits {
        fn extract(&self, history: &ChatHistory) -> Option<String> {
            let digits = history
                .latest_user_text()?
                .chars()
                .filter(char::is_ascii_digit)
                .collect::<String>();
            (!digits.is_empty()).then_some(digits)
        }
    }

    struct Summary;

    impl SlotExtractor for Summary {
        fn extract(&self, history: &ChatHistory) -> Option<String> {
            history.latest_user_text().map(|text| format!("用户投诉：{text}"))
        }
    }

    struct Scripted {
        answers: VecDeque<&'static str>,
        prompts: Vec<String>,
    }

    impl Scripted {
        fn new(answers: &[&'static str]) -> Self {
            Self { answers: answers.iter().copied().collect(), prompts: Vec::new() }
        }
    }

    impl Prompter for Scripted {
        fn ask(&mut self, prompt: &str) -> Result<String, InputError> {
            self.prompts.push(prompt.to_string());
            self.answers.pop_front().map(str::to_string).ok_or(InputError::Closed)
        }
    }

    fn record(value: Value) -> Record {
        value.as_object().cloned().expect("object fixture")
    }

    fn orders() -> MapStore {
        MapStore(BTreeMap::from([
            (
                "13812345678".to_string(),
                record(json!({"user_name": "张三", "order_status": "配送中"})),
            ),
            ("ORD12345".to_string(), record(json!({"status": "已发货"}))),
        ]))
    }

    fn membership() -> MapStore {
        MapStore(BTreeMap::from([(
            "13999999999".to_string(),
            record(json!({"phone": "13999999999", "level": "Diamond", "points": 5000})),
        )]))
    }

    fn dispatcher_with(
        complaints: Arc<dyn AppendLog>,
        orders_store: Arc<dyn RecordStore>,
        sink: &InMemoryAuditSink,
    ) -> ActionDispatcher {
        ActionDispatcher::new(
            RecordStores {
                orders: orders_store,
                membership: Arc::new(membership()),
                products: Arc::new(Catalog(vec![Product {
                    name: "小米14".to_string(),
                    category: "手机".to_string(),
                    brand: "小米".to_string(),
                    popularity: 100,
                    description: "旗舰性能".to_string(),
                    features: "拍照强".to_string(),
                }])),
                complaints,
            },
            Arc::new(FirstProduct),
            ExtractorSet::default()
                .with(ExtractorKind::PhoneNumber, Digits)
                .with(ExtractorKind::ComplaintSummary, Summary),
            Arc::new(sink.clone()),
        )
    }

    fn dispatcher(sink: &InMemoryAuditSink) -> ActionDispatcher {
        dispatcher_with(Arc::new(VecLog::default()), Arc::new(orders()), sink)
    }

    fn context() -> AuditContext {
        AuditContext::new(SessionId::from("s-1"), "turn-1", "test")
    }

    #[test]
    fn action_names_round_trip_and_unknown_names_are_preserved() {
        for name in ["greet", "check_phone_number", "get_order_info", "record_complaint"] {
            assert_eq!(ActionKind::parse(name).name(), name);
        }
        let unknown = ActionKind::parse("launch_rocket");
        assert_eq!(unknown, ActionKind::Unrecognized("launch_rocket".to_string()));
        assert!(!unknown.is_recognized());
    }

    #[test]
    fn unknown_action_names_are_listed_not_rejected() {
        let rules = RuleSet::from_yaml_str(
            r#"
intents:
  DEFAULT: { description: "兜底" }
  MIXED: { description: "混合" }
rules:
  MIXED: { action_type: actions, actions: [greet, launch_rocket] }
"#,
        )
        .expect("unknown actions still load");

        assert_eq!(unrecognized_actions(&rules), vec!["launch_rocket".to_string()]);
    }

    #[test]
    fn malformed_phone_numbers_reprompt_identically_until_valid() {
        let sink = InMemoryAuditSink::default();
        let dispatcher = dispatcher(&sink);
        let mut session = SessionState::new(SessionId::from("s-1"));
        let mut prompter = Scripted::new(&["abc", "123", "13812345678"]);

        let outcome = dispatcher
            .dispatch(&ActionKind::CheckPhoneNumber, &mut session, &mut prompter, &context())
            .expect("collects phone");

        assert_eq!(prompter.prompts, vec![PHONE_PROMPT, PHONE_RETRY_PROMPT, PHONE_RETRY_PROMPT]);
        assert_eq!(session.field(fields::PHONE_NUMBER), Some("13812345678"));
        assert_eq!(outcome.message, "已记录您的手机号码：138****5678");
        assert_eq!(session.history.len(), 6);
    }

    #[test]
    fn order_lookup_formats_masked_summary() {
        let sink = InMemoryAuditSink::default();
        let dispatcher = dispatcher(&sink);
        let mut session = SessionState::new(SessionId::from("s-1"));
        session.set_field(fields::PHONE_NUMBER, "13812345678");

        let outcome = dispatcher
            .dispatch(&ActionKind::GetOrderInfo, &mut session, &mut Scripted::new(&[]), &context())
            .expect("lookup");

        assert_eq!(outcome.status, ActionStatus::Succeeded);
        assert!(outcome.message.contains("138****5678"));
        assert!(!outcome.message.contains("13812345678"));
        assert!(outcome.message.contains("用户名：张三"));
        assert!(outcome.message.contains("订单状态：配送中"));
    }

    #[test]
    fn unknown_phone_yields_fixed_apology() {
        let sink = InMemoryAuditSink::default();
        let dispatcher = dispatcher(&sink);
        let mut session = SessionState::new(SessionId::from("s-1"));
        session.set_field(fields::PHONE_NUMBER, "13000000000");

        let order = dispatcher
            .dispatch(&ActionKind::GetOrderInfo, &mut session, &mut Scripted::new(&[]), &context())
            .expect("lookup");
        let member = dispatcher
            .dispatch(
                &ActionKind::GetMembershipInfo,
                &mut session,
                &mut Scripted::new(&[]),
                &context(),
            )
            .expect("lookup");

        assert_eq!(order.status, ActionStatus::NotFound);
        assert_eq!(order.message, ORDER_NOT_FOUND);
        assert_eq!(member.message, MEMBERSHIP_NOT_FOUND);
    }

    #[test]
    fn store_read_failure_is_apologetic_and_logged() {
        let sink = InMemoryAuditSink::default();
        let dispatcher = dispatcher_with(Arc::new(VecLog::default()), Arc::new(BrokenStore), &sink);
        let mut session = SessionState::new(SessionId::from("s-1"));
        session.set_field(fields::PHONE_NUMBER, "13812345678");

        let outcome = dispatcher
            .dispatch(&ActionKind::GetOrderInfo, &mut session, &mut Scripted::new(&[]), &context())
            .expect("lookup");

        assert_eq!(outcome.status, ActionStatus::Failed);
        assert_eq!(outcome.message, ORDER_NOT_FOUND);
        assert_eq!(sink.events_of_type("store.read_failed").len(), 1);
    }

    #[test]
    fn membership_lookup_reports_level_and_points() {
        let sink = InMemoryAuditSink::default();
        let dispatcher = dispatcher(&sink);
        let mut session = SessionState::new(SessionId::from("s-1"));
        session.fill_slot(fields::PHONE_NUMBER, "13999999999");

        let outcome = dispatcher
            .dispatch(
                &ActionKind::GetMembershipInfo,
                &mut session,
                &mut Scripted::new(&[]),
                &context(),
            )
            .expect("lookup");

        assert!(outcome.message.contains("会员等级：Diamond"));
        assert!(outcome.message.contains("积分：5000"));
    }

    #[test]
    fn query_order_status_mentions_order_number_and_known_status() {
        let sink = InMemoryAuditSink::default();
        let dispatcher = dispatcher(&sink);
        let mut session = SessionState::new(SessionId::from("s-1"));
        session.fill_slot("order_number", "ORD12345");

        let outcome = dispatcher
            .dispatch(&ActionKind::QueryOrderStatus, &mut session, &mut Scripted::new(&[]), &context())
            .expect("query");

        assert!(outcome.message.contains("ORD12345"));
        assert!(outcome.message.contains("订单状态：已发货"));
        assert_eq!(session.slot("order_number"), Some("ORD12345"));
    }

    #[test]
    fn collection_asks_until_non_empty() {
        let sink = InMemoryAuditSink::default();
        let dispatcher = dispatcher(&sink);
        let mut session = SessionState::new(SessionId::from("s-1"));
        let mut prompter = Scripted::new(&["", "   ", "快递太慢了"]);

        dispatcher
            .dispatch(&ActionKind::CollectComplaint, &mut session, &mut prompter, &context())
            .expect("collects");

        assert_eq!(prompter.prompts, vec![COMPLAINT_PROMPT; 3]);
        assert_eq!(session.field(fields::COMPLAINT), Some("快递太慢了"));
    }

    #[test]
    fn recording_appends_structured_entry() {
        let sink = InMemoryAuditSink::default();
        let log = Arc::new(VecLog::default());
        let dispatcher = dispatcher_with(log.clone(), Arc::new(orders()), &sink);
        let mut session = SessionState::new(SessionId::from("s-1"));
        session.set_field(fields::COMPLAINT, "快递太慢了");

        let outcome = dispatcher
            .dispatch(&ActionKind::RecordComplaint, &mut session, &mut Scripted::new(&[]), &context())
            .expect("records");

        assert_eq!(outcome.status, ActionStatus::Succeeded);
        let entries = log.0.lock().expect("log lock").clone();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["raw_input"], "快递太慢了");
        assert_eq!(entries[0]["summary"], "用户投诉：快递太慢了");
        assert_eq!(entries[0]["session_id"], "s-1");
        assert!(entries[0]["recorded_at"].is_string());
    }

    #[test]
    fn recording_failure_still_confirms_to_user() {
        let sink = InMemoryAuditSink::default();
        let dispatcher = dispatcher_with(Arc::new(BrokenStore), Arc::new(orders()), &sink);
        let mut session = SessionState::new(SessionId::from("s-1"));
        session.set_field(fields::COMPLAINT, "客服态度差");

        let outcome = dispatcher
            .dispatch(&ActionKind::RecordComplaint, &mut session, &mut Scripted::new(&[]), &context())
            .expect("records");

        assert_eq!(outcome.status, ActionStatus::Succeeded);
        assert!(outcome.message.starts_with("您的投诉已记录"));
        assert_eq!(sink.events_of_type("store.append_failed").len(), 1);
    }

    #[test]
    fn recommendation_names_the_product() {
        let sink = InMemoryAuditSink::default();
        let dispatcher = dispatcher(&sink);
        let mut session = SessionState::new(SessionId::from("s-1"));
        session.set_field(fields::PREFERENCE, "拍照好的手机");

        let outcome = dispatcher
            .dispatch(&ActionKind::RecommendProduct, &mut session, &mut Scripted::new(&[]), &context())
            .expect("recommends");

        assert_eq!(outcome.message, "根据您的需求，推荐您购买：小米14（小米，旗舰性能，拍照强）");
    }

    #[test]
    fn unrecognized_action_is_reported_not_fatal() {
        let sink = InMemoryAuditSink::default();
        let dispatcher = dispatcher(&sink);
        let mut session = SessionState::new(SessionId::from("s-1"));

        let outcome = dispatcher
            .dispatch(
                &ActionKind::parse("launch_rocket"),
                &mut session,
                &mut Scripted::new(&[]),
                &context(),
            )
            .expect("reported");

        assert_eq!(outcome.status, ActionStatus::Unrecognized);
        assert_eq!(outcome.message, "抱歉，我无法执行动作 'launch_rocket'。");
        assert_eq!(sink.events_of_type("action.unrecognized").len(), 1);
    }

    #[test]
    fn closed_input_aborts_collection() {
        let sink = InMemoryAuditSink::default();
        let dispatcher = dispatcher(&sink);
        let mut session = SessionState::new(SessionId::from("s-1"));

        let error = dispatcher
            .dispatch(&ActionKind::CheckPhoneNumber, &mut session, &mut Scripted::new(&["abc"]), &context())
            .expect_err("input closes");

        assert_eq!(error, InputError::Closed);
        assert!(session.field(fields::PHONE_NUMBER).is_none());
    }
}
