//! Permission system for Anvil
//!
//! - `pattern`: 도구 이름 패턴 (exact / glob / `re:` regex)
//! - `types`: Disposition, RuleScope, PermissionRule, Resolution
//! - `resolver`: 세션별 불변 권한 결정기
//!
//! ## 사용 예시
//!
//! ```rust,ignore
//! use anvil_foundation::permission::{PermissionResolver, RuleConfig};
//!
//! let resolver = PermissionResolver::from_configs(
//!     &[RuleConfig::always("fetch_*")],
//!     &[RuleConfig::deny("bash")],
//!     true,
//! )?;
//! let resolution = resolver.resolve(&descriptor, &Requester::TopLevel);
//! ```

mod pattern;
mod resolver;
mod types;

pub use pattern::{any_matches, Specificity, ToolPattern, REGEX_PREFIX};
pub use resolver::{is_trusted_directory, PermissionResolver};
pub use types::{
    Disposition, PermissionRule, Resolution, ResolutionSource, RuleConfig, RuleScope,
};
