//! 外部コラボレーターの実装
//!
//! URL が設定されていれば HTTP アダプター、なければローカルのフォールバックを使う。

pub mod http;
pub mod local;

pub use http::{HttpAssistant, HttpCodeExecutor, HttpContentAnalyzer, HttpSessionService};
pub use local::{
    NoopContentAnalyzer, NoopStatusUpdater, OpenAccessChecker, UnavailableAssistant,
    UnavailableExecutor,
};
