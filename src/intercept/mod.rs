// Intercept module - forbidden calls and tagged return values inside the child
//
// A resolved policy is rendered into a per-dialect prelude that runs ahead of the
// code unit. The child reports what it saw through a JSON-lines event file.

pub mod error;
pub mod guard;
pub mod policy;
pub mod prelude;
pub mod surface;

pub use error::{InterceptError, Result};
pub use guard::{CallInterceptor, InstalledInterceptor};
pub use policy::{
    InterceptPolicy, MetadataPredicate, PolicySpec, SurfaceRule, TagRule, TaggedCallable,
};
pub use prelude::EVENTS_ENV;
pub use surface::{CallSurface, CallableMeta, PythonSurface, StaticSurface};

/// Exit status of a child stopped by a forbidden call
pub const FORBIDDEN_EXIT_CODE: i32 = 86;
/// Exit status of a child that raised an uncaught error
pub const FAULT_EXIT_CODE: i32 = 87;
