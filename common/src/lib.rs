//! Deal Scout Common Library
//!
//! CLIとWeb(WASM)で共有するリスト分類器とディール一覧のユーティリティ

pub mod catalog;
pub mod category;
pub mod classifier;
pub mod clock;
pub mod deals;
pub mod error;
pub mod identity;
pub mod ledger;
pub mod observer;
pub mod record;
pub mod rules;
pub mod scheduler;

pub use catalog::{
    filter_sections, group_by_bucket, paginate, parse_price, sort_deals, DealFilter, Section,
    SectionPage, Sections, SortOrder, ViewMode,
};
pub use category::Category;
pub use classifier::{ClassifierOptions, ErrorReporter, ListClassifier, Published};
pub use clock::{Clock, ManualClock};
pub use deals::{Deal, DealSnapshot};
pub use error::{Error, Result};
pub use identity::{default_extractor, Identify, IdentityExtractor, ItemKey};
pub use ledger::{InteractionLedger, Reconciliation};
pub use observer::{AttachHandle, ManualViewport, ViewportObserver, VisibilityEntry, WatchToken};
pub use record::{InteractionRecord, RecordSnapshot};
pub use rules::{classify, OverrideError, OverrideRule, PRIORITY_CLICKS};
pub use scheduler::{BatchScheduler, FRAME_DELAY};
