//! `#[memoized]`: cache a method's result until one of the properties it read changes.
//!
//! ```ignore
//! #[memoized]
//! fn calculate_area(&self) -> f64 {
//!     self.side() * self.side()
//! }
//! ```
//!
//! keeps `calculate_area` and adds an accessor `area(&self) -> f64`. The accessor's name is the
//! method's name without its first word, unless one is given explicitly.

use proc_macro2::{Span, TokenStream};
use quote::quote;
use syn::ext::IdentExt;
use syn::spanned::Spanned;

use crate::access::AccessControlLevel;
use crate::attrs::{self, attr_name, Channel, MarkerKind, Markers, MemberOptions, MemoizedParameters};
use crate::builders::memoized::MemoizedAccessorBuilder;
use crate::diagnostic::Diagnostic;
use crate::isolation::GlobalActorIsolation;
use crate::properties::is_owned_value;

/// A validated `#[memoized]` method
#[derive(Clone)]
pub(crate) struct MemoizedMethod {
    method: syn::ImplItemFn,
    property: syn::Ident,
    return_type: syn::Type,
    access: AccessControlLevel,
    isolation: Option<GlobalActorIsolation>,
    markers: Markers,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum MemoizedError {
    #[error("#[memoized] can only be applied to methods")]
    NotAMethod(Span),
    #[error("memoized methods must take `&self`")]
    Receiver(Span),
    #[error("memoized methods cannot take parameters")]
    Parameters(Span),
    #[error("memoized methods cannot be async")]
    Async(Span),
    #[error("memoized methods cannot be unsafe")]
    Unsafe(Span),
    #[error("memoized methods cannot be const")]
    Const(Span),
    #[error("memoized methods cannot be generic")]
    Generic(Span),
    #[error("memoized methods must return a value")]
    NoReturnValue(Span),
    #[error("memoized methods cannot return `impl Trait`")]
    ImplTrait(Span),
    #[error("memoized methods must return an owned value")]
    Borrowed(Span),
    #[error("#[memoized] cannot be applied to a method marked `overrides`")]
    Overrides(Span),
    #[error("the property name cannot be empty")]
    EmptyName(Span),
    #[error("#[memoized] requires a method name with at least two words or explicit property name")]
    NoDerivedName(Span),
    #[error("`{1}` is not a valid property name")]
    InvalidName(Span, String),
    #[error("the property name must differ from the method name")]
    SameName(Span),
    #[error(transparent)]
    Parse(#[from] syn::Error),
}

impl MemoizedError {
    pub(crate) fn span(&self) -> Span {
        match self {
            Self::NotAMethod(span)
            | Self::Receiver(span)
            | Self::Parameters(span)
            | Self::Async(span)
            | Self::Unsafe(span)
            | Self::Const(span)
            | Self::Generic(span)
            | Self::NoReturnValue(span)
            | Self::ImplTrait(span)
            | Self::Borrowed(span)
            | Self::Overrides(span)
            | Self::EmptyName(span)
            | Self::NoDerivedName(span)
            | Self::InvalidName(span, _)
            | Self::SameName(span) => *span,
            Self::Parse(e) => e.span(),
        }
    }

    fn fix_it(&self) -> Option<&'static str> {
        match self {
            Self::Receiver(_) => Some("take `&self`"),
            Self::NoDerivedName(_) | Self::SameName(_) => {
                Some("pass a name explicitly, e.g. #[memoized(\"value\")]")
            }
            Self::Overrides(_) => Some("remove #[memoized]"),
            _ => None,
        }
    }
}

impl From<MemoizedError> for Diagnostic {
    fn from(e: MemoizedError) -> Self {
        let diagnostic = Diagnostic::error(e.span(), e.to_string());
        match e.fix_it() {
            Some(fix_it) => diagnostic.with_fix_it(fix_it),
            None => diagnostic,
        }
    }
}

impl MemoizedMethod {
    /// Validate `method` against the parameters given to `#[memoized]`
    pub(crate) fn extract(
        params: MemoizedParameters,
        mut method: syn::ImplItemFn,
    ) -> Result<Self, MemoizedError> {
        validate_signature(&method.sig)?;
        let options = MemberOptions::for_method(&method.attrs)?;
        if options.overrides() {
            return Err(MemoizedError::Overrides(method.sig.ident.span()));
        }
        let syn::ReturnType::Type(_, return_type) = &method.sig.output else {
            return Err(MemoizedError::NoReturnValue(method.sig.span()));
        };
        let return_type = (**return_type).clone();

        let property = match &params.name {
            Some(name) => explicit_property_name(name)?,
            None => derived_property_name(&method.sig.ident)?,
        };
        if property.unraw() == method.sig.ident.unraw() {
            return Err(MemoizedError::SameName(property.span()));
        }

        let access = match &params.vis {
            Some(vis) => AccessControlLevel::of(vis).min(AccessControlLevel::of(&method.vis)),
            None => AccessControlLevel::of(&method.vis),
        };
        let markers = Markers::from_attrs(&method.attrs);
        method
            .attrs
            .retain(|attr| !is_memoized(attr) && MarkerKind::from_attr(attr).is_none());
        attrs::strip_helpers(&mut method.attrs);

        Ok(Self {
            method,
            property,
            return_type,
            access,
            isolation: params.isolation,
            markers,
        })
    }

    /// The memoized method among the items of an impl block, if `item` is one
    pub(crate) fn from_impl_item(item: &syn::ImplItem) -> Option<Result<Self, MemoizedError>> {
        let syn::ImplItem::Fn(method) = item else {
            return None;
        };
        let attr = method.attrs.iter().find(|attr| is_memoized(attr))?;
        Some(
            MemoizedParameters::from_attr(attr)
                .map_err(MemoizedError::from)
                .and_then(|params| Self::extract(params, method.clone())),
        )
    }

    /// The method itself, without the attributes consumed by the expansion
    pub(crate) fn method(&self) -> &syn::ImplItemFn {
        &self.method
    }

    pub(crate) fn method_ident(&self) -> &syn::Ident {
        &self.method.sig.ident
    }

    pub(crate) fn property_ident(&self) -> &syn::Ident {
        &self.property
    }

    /// The cache key and key path name
    pub(crate) fn property_name(&self) -> String {
        self.property.unraw().to_string()
    }

    pub(crate) fn return_type(&self) -> &syn::Type {
        &self.return_type
    }

    pub(crate) fn access(&self) -> &AccessControlLevel {
        &self.access
    }

    /// The explicit isolation, `None` to inherit the class's
    pub(crate) fn isolation(&self) -> Option<&GlobalActorIsolation> {
        self.isolation.as_ref()
    }

    pub(crate) fn is_observation_tracked(&self) -> bool {
        !self.markers.excludes(Channel::Observation)
    }

    pub(crate) fn is_publisher_tracked(&self) -> bool {
        !self.markers.excludes(Channel::Publisher)
    }

    pub(crate) fn cfgs(&self) -> Vec<syn::Attribute> {
        attrs::cfgs(&self.method.attrs)
    }

    pub(crate) fn availability(&self) -> Vec<syn::Attribute> {
        attrs::availability(&self.method.attrs)
    }

    pub(crate) fn deprecation_warnings(&self) -> Vec<Diagnostic> {
        self.markers.deprecation_warnings().collect()
    }
}

pub(crate) fn is_memoized(attr: &syn::Attribute) -> bool {
    attr_name(attr).as_deref() == Some("memoized")
}

fn validate_signature(sig: &syn::Signature) -> Result<(), MemoizedError> {
    if let Some(asyncness) = &sig.asyncness {
        return Err(MemoizedError::Async(asyncness.span()));
    }
    if let Some(unsafety) = &sig.unsafety {
        return Err(MemoizedError::Unsafe(unsafety.span()));
    }
    if let Some(constness) = &sig.constness {
        return Err(MemoizedError::Const(constness.span()));
    }
    if !sig.generics.params.is_empty() || sig.generics.where_clause.is_some() {
        return Err(MemoizedError::Generic(sig.generics.span()));
    }
    let mut inputs = sig.inputs.iter();
    match inputs.next() {
        Some(syn::FnArg::Receiver(receiver))
            if receiver.reference.is_some() && receiver.mutability.is_none() && receiver.colon_token.is_none() => {}
        Some(other) => return Err(MemoizedError::Receiver(other.span())),
        None => return Err(MemoizedError::Receiver(sig.ident.span())),
    }
    if let Some(parameter) = inputs.next() {
        return Err(MemoizedError::Parameters(parameter.span()));
    }
    let syn::ReturnType::Type(_, ty) = &sig.output else {
        return Err(MemoizedError::NoReturnValue(sig.ident.span()));
    };
    match &**ty {
        syn::Type::Tuple(tuple) if tuple.elems.is_empty() => {
            Err(MemoizedError::NoReturnValue(ty.span()))
        }
        syn::Type::ImplTrait(_) => Err(MemoizedError::ImplTrait(ty.span())),
        ty if !is_owned_value(ty) => Err(MemoizedError::Borrowed(ty.span())),
        _ => Ok(()),
    }
}

fn explicit_property_name(name: &syn::LitStr) -> Result<syn::Ident, MemoizedError> {
    let value = name.value();
    if value.trim().is_empty() {
        return Err(MemoizedError::EmptyName(name.span()));
    }
    parse_property_ident(&value, name.span())
}

/// `calculate_area` becomes `area`, `compute_total_price` becomes `total_price`
fn derived_property_name(method: &syn::Ident) -> Result<syn::Ident, MemoizedError> {
    let name = method.unraw().to_string();
    let words: Vec<&str> = name.split('_').filter(|word| !word.is_empty()).collect();
    if words.len() < 2 {
        return Err(MemoizedError::NoDerivedName(method.span()));
    }
    parse_property_ident(&words[1..].join("_"), method.span())
}

fn parse_property_ident(name: &str, span: Span) -> Result<syn::Ident, MemoizedError> {
    match syn::parse_str::<syn::Ident>(name) {
        Ok(ident) => Ok(syn::Ident::new(&ident.to_string(), span)),
        Err(_) => Err(MemoizedError::InvalidName(span, name.to_string())),
    }
}

pub fn memoized(
    args: proc_macro::TokenStream,
    input: proc_macro::TokenStream,
) -> proc_macro::TokenStream {
    proc_macro::TokenStream::from(expand(args.into(), input.into()))
}

fn expand(args: TokenStream, input: TokenStream) -> TokenStream {
    let method = match syn::parse2::<syn::ImplItemFn>(input.clone()) {
        Ok(method) => method,
        Err(e) => {
            let e = MemoizedError::NotAMethod(e.span());
            let error = Diagnostic::from(e).to_tokens();
            return quote!(#error #input);
        }
    };
    let result = syn::parse2::<MemoizedParameters>(args)
        .map_err(MemoizedError::from)
        .and_then(|params| MemoizedMethod::extract(params, method.clone()));
    match result {
        Ok(memoized) => {
            let original = memoized.method();
            let accessor = MemoizedAccessorBuilder::new(&memoized).accessor();
            quote! {
                #original
                #accessor
            }
        }
        Err(e) => {
            let error = Diagnostic::from(e).to_tokens();
            let mut method = method;
            method
                .attrs
                .retain(|attr| !is_memoized(attr) && MarkerKind::from_attr(attr).is_none());
            attrs::strip_helpers(&mut method.attrs);
            quote! {
                #method
                #error
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use quote::quote;

    use super::*;

    fn extract(params: TokenStream, method: TokenStream) -> Result<MemoizedMethod, MemoizedError> {
        let params: MemoizedParameters = syn::parse2(params).unwrap();
        let method: syn::ImplItemFn = syn::parse2(method).unwrap();
        MemoizedMethod::extract(params, method)
    }

    #[test]
    fn property_name_drops_the_first_word() {
        let memoized = extract(quote!(), quote!(fn calculate_area(&self) -> f64 { 0.0 })).unwrap();
        assert_eq!(memoized.property_name(), "area");

        let memoized = extract(
            quote!(),
            quote!(fn compute_total_price(&self) -> u64 { 0 }),
        )
        .unwrap();
        assert_eq!(memoized.property_name(), "total_price");
    }

    #[test]
    fn single_word_names_need_an_explicit_name() {
        let e = extract(quote!(), quote!(fn area(&self) -> f64 { 0.0 }))
            .err()
            .unwrap();
        assert!(matches!(e, MemoizedError::NoDerivedName(_)));
        assert_eq!(
            e.to_string(),
            "#[memoized] requires a method name with at least two words or explicit property name"
        );

        let memoized = extract(quote!("surface"), quote!(fn area(&self) -> f64 { 0.0 })).unwrap();
        assert_eq!(memoized.property_name(), "surface");
    }

    #[test]
    fn explicit_names_are_validated() {
        let empty = extract(quote!(""), quote!(fn calculate_area(&self) -> f64 { 0.0 }));
        assert!(matches!(empty, Err(MemoizedError::EmptyName(_))));

        let invalid = extract(quote!("two words"), quote!(fn calculate_area(&self) -> f64 { 0.0 }));
        assert!(matches!(invalid, Err(MemoizedError::InvalidName(_, _))));

        let keyword = extract(quote!("type"), quote!(fn calculate_area(&self) -> f64 { 0.0 }));
        assert!(matches!(keyword, Err(MemoizedError::InvalidName(_, _))));
    }

    #[test]
    fn invalid_signatures_are_rejected() {
        let cases = [
            quote!(fn calculate_area(self) -> f64 { 0.0 }),
            quote!(fn calculate_area(&mut self) -> f64 { 0.0 }),
            quote!(fn calculate_area() -> f64 { 0.0 }),
            quote!(fn calculate_area(&self, scale: f64) -> f64 { scale }),
            quote!(async fn calculate_area(&self) -> f64 { 0.0 }),
            quote!(unsafe fn calculate_area(&self) -> f64 { 0.0 }),
            quote!(fn calculate_area<T>(&self) -> f64 { 0.0 }),
            quote!(fn calculate_area(&self) {}),
            quote!(fn calculate_area(&self) -> () {}),
            quote!(fn calculate_area(&self) -> impl Copy { 0.0 }),
            quote!(fn calculate_area(&self) -> &str { "" }),
            quote!(#[relay(overrides)] fn calculate_area(&self) -> f64 { 0.0 }),
        ];
        for case in cases {
            assert!(extract(quote!(), case.clone()).is_err(), "{}", case);
        }
    }

    #[test]
    fn explicit_visibility_never_widens_the_method() {
        let narrowed = extract(quote!(pub(crate)), quote!(pub fn calculate_area(&self) -> f64 { 0.0 }))
            .unwrap();
        assert_eq!(narrowed.access(), &AccessControlLevel::Crate);

        let clamped = extract(quote!(pub), quote!(fn calculate_area(&self) -> f64 { 0.0 })).unwrap();
        assert_eq!(clamped.access(), &AccessControlLevel::Private);
    }

    #[test]
    fn markers_are_consumed() {
        let memoized = extract(
            quote!(isolation = nonisolated),
            quote! {
                #[publisher_ignored]
                #[memoized]
                fn calculate_area(&self) -> f64 { 0.0 }
            },
        )
        .unwrap();
        assert!(memoized.is_observation_tracked());
        assert!(!memoized.is_publisher_tracked());
        assert!(memoized.method().attrs.is_empty());
        assert_eq!(memoized.isolation(), Some(&GlobalActorIsolation::Nonisolated));
    }
}
