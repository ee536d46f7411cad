//! 网络层：共享会话与查询构造。

pub mod filters;
pub mod session;

pub use filters::{Filter, FilterKind, PageTarget, QueryTarget};
pub use session::{HeaderGuard, Session, SessionConfig};
