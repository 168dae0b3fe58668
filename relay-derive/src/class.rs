//! Validation shared by the class-level attributes `#[publishable]`, `#[relayed]` and
//! `#[observable]`.
//!
//! Each of them attaches to a struct, to expand its stored properties, and optionally to the
//! struct's inherent impl blocks, to publish computed properties and memoized methods.

use proc_macro2::{Span, TokenStream};
use quote::{quote, ToTokens};
use syn::spanned::Spanned;

use crate::attrs::{self, attr_name, Accepts, ClassParameters, MarkerKind};
use crate::builders::property_publisher::computed_publishers;
use crate::diagnostic::{Diagnostic, Diagnostics};
use crate::memoized::{is_memoized, MemoizedMethod};
use crate::properties::PropertiesList;

/// What a class-level attribute was attached to
pub(crate) enum Target {
    Struct(syn::ItemStruct),
    Impl(syn::ItemImpl),
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum ClassError {
    #[error("#[{name}] can only be applied to a struct or to its inherent impl block")]
    WrongTarget { name: &'static str, span: Span },
    #[error("#[{name}] cannot be applied to a generic struct")]
    Generic { name: &'static str, span: Span },
    #[error("#[{name}] requires a struct with named fields")]
    NotNamed { name: &'static str, span: Span },
    #[error("#[{name}] cannot be applied to a trait implementation")]
    TraitImpl { name: &'static str, span: Span },
    #[error("#[{name}] cannot be applied to a generic impl block")]
    GenericImpl { name: &'static str, span: Span },
    #[error("#[{name}] must be applied to an impl block of a named struct")]
    UnnamedSelf { name: &'static str, span: Span },
    #[error("#[{first}] cannot be combined with #[{second}]")]
    Combined {
        first: &'static str,
        second: &'static str,
        span: Span,
    },
    #[error(transparent)]
    Parse(#[from] syn::Error),
}

impl ClassError {
    pub(crate) fn span(&self) -> Span {
        match self {
            Self::WrongTarget { span, .. }
            | Self::Generic { span, .. }
            | Self::NotNamed { span, .. }
            | Self::TraitImpl { span, .. }
            | Self::GenericImpl { span, .. }
            | Self::UnnamedSelf { span, .. }
            | Self::Combined { span, .. } => *span,
            Self::Parse(e) => e.span(),
        }
    }
}

impl From<ClassError> for Diagnostic {
    fn from(e: ClassError) -> Self {
        let diagnostic = Diagnostic::error(e.span(), e.to_string());
        match &e {
            ClassError::Combined { second, .. } => {
                diagnostic.with_fix_it(format!("remove #[{}]", second))
            }
            _ => diagnostic,
        }
    }
}

impl From<ClassError> for Diagnostics {
    fn from(e: ClassError) -> Self {
        Diagnostic::from(e).into()
    }
}

impl Target {
    pub(crate) fn parse(input: TokenStream, name: &'static str) -> Result<Self, ClassError> {
        match syn::parse2::<syn::Item>(input) {
            Ok(syn::Item::Struct(item)) => Ok(Self::Struct(item)),
            Ok(syn::Item::Impl(item)) => Ok(Self::Impl(item)),
            Ok(other) => Err(ClassError::WrongTarget {
                name,
                span: item_span(&other),
            }),
            Err(e) => Err(ClassError::WrongTarget {
                name,
                span: e.span(),
            }),
        }
    }
}

fn item_span(item: &syn::Item) -> Span {
    match item {
        syn::Item::Enum(item) => item.ident.span(),
        syn::Item::Union(item) => item.ident.span(),
        syn::Item::Fn(item) => item.sig.ident.span(),
        syn::Item::Trait(item) => item.ident.span(),
        other => other.span(),
    }
}

/// The named fields of a non-generic struct
pub(crate) fn named_fields<'a>(
    item: &'a mut syn::ItemStruct,
    name: &'static str,
) -> Result<&'a mut syn::FieldsNamed, ClassError> {
    if !item.generics.params.is_empty() || item.generics.where_clause.is_some() {
        return Err(ClassError::Generic {
            name,
            span: item.generics.span(),
        });
    }
    let span = item.ident.span();
    match &mut item.fields {
        syn::Fields::Named(fields) => Ok(fields),
        _ => Err(ClassError::NotNamed { name, span }),
    }
}

/// The struct an inherent, non-generic impl block is for
pub(crate) fn impl_self_ident(
    item: &syn::ItemImpl,
    name: &'static str,
) -> Result<syn::Ident, ClassError> {
    if let Some((_, path, _)) = &item.trait_ {
        return Err(ClassError::TraitImpl {
            name,
            span: path.span(),
        });
    }
    if !item.generics.params.is_empty() {
        return Err(ClassError::GenericImpl {
            name,
            span: item.generics.span(),
        });
    }
    let syn::Type::Path(path) = &*item.self_ty else {
        return Err(ClassError::UnnamedSelf {
            name,
            span: item.self_ty.span(),
        });
    };
    match path.path.segments.last() {
        Some(segment) if path.qself.is_none() && segment.arguments.is_empty() => {
            Ok(segment.ident.clone())
        }
        _ => Err(ClassError::UnnamedSelf {
            name,
            span: item.self_ty.span(),
        }),
    }
}

/// Error out if another class-level attribute that cannot be combined with `name` is present
pub(crate) fn reject_combined(
    attrs: &[syn::Attribute],
    name: &'static str,
    others: &[&'static str],
) -> Result<(), ClassError> {
    for attr in attrs {
        if let Some(other) = others
            .iter()
            .find(|other| attr_name(attr).as_deref() == Some(**other))
        {
            return Err(ClassError::Combined {
                first: name,
                second: *other,
                span: attr.span(),
            });
        }
    }
    Ok(())
}

/// A struct that is also a model of a persistence framework compiles, but its storage is
/// managed by the framework, which bypasses the generated accessors
pub(crate) fn model_warning(item: &syn::ItemStruct, name: &'static str) -> Option<Diagnostic> {
    let model = item.attrs.iter().find(|attr| {
        if attr_name(attr).as_deref() == Some("model") {
            return true;
        }
        if !attr.path().is_ident("derive") {
            return false;
        }
        let mut found = false;
        let _ = attr.parse_nested_meta(|meta| {
            let derived = meta.path.segments.last().map(|s| s.ident.to_string());
            if matches!(derived.as_deref(), Some("Model" | "DeriveEntityModel")) {
                found = true;
            }
            Ok(())
        });
        found
    })?;
    Some(
        Diagnostic::warning(
            model.span(),
            format!(
                "#[{}] on a model type: the model framework manages its storage and changes made \
                 through it are not published",
                name
            ),
        )
        .with_fix_it(format!("remove #[{}]", name)),
    )
}

/// The attributes of a struct as re-emitted: helper attributes of the class-level macros are
/// consumed
pub(crate) fn strip_struct_helpers(item: &mut syn::ItemStruct) {
    attrs::strip_helpers(&mut item.attrs);
    for field in item.fields.iter_mut() {
        attrs::strip_helpers(&mut field.attrs);
    }
}

/// Prepare an inherent impl block for re-emission.
///
/// Markers on ordinary methods have been read and are removed. `#[memoized]` methods keep their
/// markers, which the memoized expansion reads, so they are rewritten to absolute paths that
/// resolve whether or not the user imported them.
pub(crate) fn prepare_impl(item: &mut syn::ItemImpl) {
    for impl_item in item.items.iter_mut() {
        let syn::ImplItem::Fn(method) = impl_item else {
            continue;
        };
        if !method.attrs.iter().any(is_memoized) {
            attrs::strip_helpers(&mut method.attrs);
            continue;
        }
        let mut memoized = Vec::new();
        let mut markers = Vec::new();
        let mut rest = Vec::new();
        for attr in method.attrs.drain(..) {
            if is_memoized(&attr) {
                memoized.push(absolute(attr));
            } else if MarkerKind::from_attr(&attr).is_some() {
                markers.push(absolute(attr));
            } else {
                rest.push(attr);
            }
        }
        method.attrs = rest;
        method.attrs.extend(memoized);
        method.attrs.extend(markers);
    }
}

/// `#[memoized(..)]` as `#[::relay::memoized(..)]`
fn absolute(mut attr: syn::Attribute) -> syn::Attribute {
    let Some(name) = attr.path().segments.last().map(|segment| segment.ident.clone()) else {
        return attr;
    };
    let path: syn::Path = syn::parse_quote!(::relay::#name);
    match &mut attr.meta {
        syn::Meta::Path(existing) => *existing = path,
        syn::Meta::List(list) => list.path = path,
        syn::Meta::NameValue(name_value) => name_value.path = path,
    }
    attr
}

/// The memoized methods of an impl block. Invalid ones are skipped; their own expansion reports
/// them.
pub(crate) fn memoized_methods(item: &syn::ItemImpl) -> Vec<MemoizedMethod> {
    item.items
        .iter()
        .filter_map(MemoizedMethod::from_impl_item)
        .filter_map(Result::ok)
        .collect()
}

/// The impl attachment of `#[publishable]` and `#[relayed]`: publishers for the block's computed
/// properties and memoized methods, next to the block itself
pub(crate) fn expand_publishing_impl(
    args: TokenStream,
    mut item: syn::ItemImpl,
    name: &'static str,
) -> Result<TokenStream, Diagnostics> {
    let class = impl_self_ident(&item, name)?;
    ClassParameters::parse(
        args,
        Accepts {
            has_superclass: true,
            registrar: false,
        },
    )?;
    let properties = PropertiesList::from_impl(&item)?;
    let memoized = memoized_methods(&item);
    let computed = properties
        .computed()
        .filter(|property| property.is_computed_publisher_tracked())
        .collect::<Vec<_>>();
    let memoized = memoized
        .iter()
        .filter(|method| method.is_publisher_tracked())
        .collect::<Vec<_>>();
    let publishers = computed_publishers(&class, &computed, &memoized);

    let mut diagnostics = Diagnostics::new();
    diagnostics.extend(properties.deprecation_warnings());
    let warnings = diagnostics.to_tokens();

    prepare_impl(&mut item);
    Ok(quote! {
        #item
        #publishers
        #warnings
    })
}

/// Re-emit `item` after a failed expansion, so that only the expansion's own errors are
/// reported
pub(crate) fn reemit(target: Target, diagnostics: Diagnostics) -> TokenStream {
    let errors = diagnostics.to_tokens();
    let item = match target {
        Target::Struct(mut item) => {
            strip_struct_helpers(&mut item);
            item.into_token_stream()
        }
        Target::Impl(mut item) => {
            for impl_item in item.items.iter_mut() {
                if let syn::ImplItem::Fn(method) = impl_item {
                    method.attrs.retain(|attr| !is_memoized(attr));
                    attrs::strip_helpers(&mut method.attrs);
                }
            }
            item.into_token_stream()
        }
    };
    quote! {
        #errors
        #item
    }
}
