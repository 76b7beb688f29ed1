//! Cross-repository verification and republishing of NuGet CI artifacts.
//!
//! The crate locates a job inside a source repository's workflow run, waits
//! for it to complete, scans its log for publish markers, checks the
//! downloaded artifact's hash against the marker, and pushes the verified
//! package to the destination repository's GitHub Packages feed.

pub mod config;
pub mod env;
pub mod error;
pub mod github;
pub mod pipeline;

/// A shorthand to define a statically allocated variable using a [`std::sync::LazyLock`].
///
/// # Examples
///
/// ```rust
/// # use nuget_relay::static_lazy_lock;
/// # use std::sync::LazyLock;
/// static_lazy_lock!{
///     pub VAR_1: String = String::from("a static variable");
/// }
/// // ...equals to...
/// pub static VAR_2: LazyLock<String> = LazyLock::new(|| String::from("a static variable"));
/// ```
#[macro_export]
macro_rules! static_lazy_lock {
    ($(#[$meta:meta])* $vis:vis $name:ident: $type:ty = $expr:expr $(;)?) => {
        $(#[$meta])*
        $vis static $name: $crate::__priv_macro_use::LazyLock<$type> =
            $crate::__priv_macro_use::LazyLock::new(|| $expr);
    };
}

#[doc(hidden)]
pub mod __priv_macro_use {
    pub use std::sync::LazyLock;
}
