pub mod actions;
pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod ports;
pub mod rules;
pub mod service;
pub mod session;
pub mod workflow;

pub use actions::{ActionDispatcher, ActionKind, ActionOutcome, ActionStatus};
pub use audit::{AuditContext, AuditEvent, AuditSink, InMemoryAuditSink, TracingAuditSink};
pub use config::{AppConfig, ConfigError, LoadOptions, LogFormat};
pub use domain::complaint::ComplaintEntry;
pub use domain::product::Product;
pub use domain::record::Record;
pub use errors::{ApplicationError, DomainError, InterfaceError, TurnError};
pub use ports::{
    AppendLog, ClassifierError, ExtractorSet, InputError, IntentClassifier, ProductCatalog,
    Prompter, Recommender, RecordStore, RecordStores, SlotExtractor, StoreError,
};
pub use rules::{Rule, RuleSet, RulesError, SlotSpec};
pub use service::{ChatService, TurnReply};
pub use session::{ChatHistory, SessionId, SessionState};
pub use workflow::WorkflowEngine;
