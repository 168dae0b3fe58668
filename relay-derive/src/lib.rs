mod access;
mod attrs;
mod builders;
mod class;
mod diagnostic;
mod infer;
mod isolation;
mod markers;
mod memoized;
mod observable;
mod properties;
mod publishable;
mod relayed;
mod superclass;

/// Add a companion property publisher to a struct expanded by `#[observable]`.
///
/// Must be placed above `#[observable]`. Accepts `isolation = Actor` and
/// `has_superclass = bool`. Attached to an inherent impl block of the same struct, it adds
/// publishers for the block's computed properties and memoized methods.
#[proc_macro_attribute]
pub fn publishable(
    args: proc_macro::TokenStream,
    input: proc_macro::TokenStream,
) -> proc_macro::TokenStream {
    publishable::publishable(args, input)
}

/// Track a struct's stored properties for both observation and publishing.
///
/// Accepts `isolation = Actor` and `has_superclass = bool`, and the same impl block attachment
/// as `#[publishable]`.
#[proc_macro_attribute]
pub fn relayed(
    args: proc_macro::TokenStream,
    input: proc_macro::TokenStream,
) -> proc_macro::TokenStream {
    relayed::relayed(args, input)
}

/// Track a struct's stored properties for observation.
#[proc_macro_attribute]
pub fn observable(
    args: proc_macro::TokenStream,
    input: proc_macro::TokenStream,
) -> proc_macro::TokenStream {
    observable::observable(args, input)
}

/// Cache the result of a `&self` method behind a generated accessor, invalidated when any
/// tracked property the method read is about to change.
#[proc_macro_attribute]
pub fn memoized(
    args: proc_macro::TokenStream,
    input: proc_macro::TokenStream,
) -> proc_macro::TokenStream {
    memoized::memoized(args, input)
}

/// Exclude a member from observation tracking
#[proc_macro_attribute]
pub fn observation_ignored(
    args: proc_macro::TokenStream,
    input: proc_macro::TokenStream,
) -> proc_macro::TokenStream {
    markers::marker("observation_ignored", args, input)
}

/// Exclude a member from observation tracking, as seen by the relay macros only
#[proc_macro_attribute]
pub fn observation_suppressed(
    args: proc_macro::TokenStream,
    input: proc_macro::TokenStream,
) -> proc_macro::TokenStream {
    markers::marker("observation_suppressed", args, input)
}

/// Exclude a member from its class's property publisher
#[proc_macro_attribute]
pub fn publisher_ignored(
    args: proc_macro::TokenStream,
    input: proc_macro::TokenStream,
) -> proc_macro::TokenStream {
    markers::marker("publisher_ignored", args, input)
}

/// Exclude a member from its class's property publisher, as seen by the relay macros only
#[proc_macro_attribute]
pub fn publisher_suppressed(
    args: proc_macro::TokenStream,
    input: proc_macro::TokenStream,
) -> proc_macro::TokenStream {
    markers::marker("publisher_suppressed", args, input)
}

#[doc(hidden)]
#[deprecated(note = "renamed to `publisher_suppressed`")]
#[proc_macro_attribute]
pub fn publisher_supressed(
    args: proc_macro::TokenStream,
    input: proc_macro::TokenStream,
) -> proc_macro::TokenStream {
    markers::marker("publisher_supressed", args, input)
}
