use proc_macro2::Span;
use syn::parse::{Parse, ParseStream};
use syn::spanned::Spanned;

use crate::diagnostic::Diagnostic;
use crate::isolation::GlobalActorIsolation;

/// The last segment of an attribute's path, so that `#[relay::publisher_ignored]` and
/// `#[publisher_ignored]` are recognised alike
pub(crate) fn attr_name(attr: &syn::Attribute) -> Option<String> {
    attr.path()
        .segments
        .last()
        .map(|segment| segment.ident.to_string())
}

pub(crate) fn has_attr(attrs: &[syn::Attribute], name: &str) -> bool {
    attrs.iter().any(|attr| attr_name(attr).as_deref() == Some(name))
}

pub(crate) fn find_attr<'a>(attrs: &'a [syn::Attribute], name: &str) -> Option<&'a syn::Attribute> {
    attrs
        .iter()
        .find(|attr| attr_name(attr).as_deref() == Some(name))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum MarkerKind {
    ObservationIgnored,
    ObservationSuppressed,
    PublisherIgnored,
    PublisherSuppressed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Channel {
    Observation,
    Publisher,
}

impl MarkerKind {
    /// Every accepted spelling, with whether it is a deprecated alias
    const SPELLINGS: &'static [(&'static str, MarkerKind, bool)] = &[
        ("observation_ignored", MarkerKind::ObservationIgnored, false),
        ("observation_suppressed", MarkerKind::ObservationSuppressed, false),
        ("publisher_ignored", MarkerKind::PublisherIgnored, false),
        ("publisher_suppressed", MarkerKind::PublisherSuppressed, false),
        ("publisher_supressed", MarkerKind::PublisherSuppressed, true),
    ];

    pub(crate) fn from_name(name: &str) -> Option<(Self, bool)> {
        Self::SPELLINGS
            .iter()
            .find(|(spelling, _, _)| *spelling == name)
            .map(|(_, kind, deprecated)| (*kind, *deprecated))
    }

    pub(crate) fn from_attr(attr: &syn::Attribute) -> Option<(Self, bool)> {
        attr_name(attr).and_then(|name| Self::from_name(&name))
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            Self::ObservationIgnored => "observation_ignored",
            Self::ObservationSuppressed => "observation_suppressed",
            Self::PublisherIgnored => "publisher_ignored",
            Self::PublisherSuppressed => "publisher_suppressed",
        }
    }

    pub(crate) fn channel(self) -> Channel {
        match self {
            Self::ObservationIgnored | Self::ObservationSuppressed => Channel::Observation,
            Self::PublisherIgnored | Self::PublisherSuppressed => Channel::Publisher,
        }
    }
}

/// The opt-out markers found on one member
#[derive(Clone, Debug, Default)]
pub(crate) struct Markers {
    kinds: Vec<MarkerKind>,
    deprecated: Vec<(Span, MarkerKind)>,
}

impl Markers {
    pub(crate) fn from_attrs(attrs: &[syn::Attribute]) -> Self {
        let mut markers = Markers::default();
        for attr in attrs {
            if let Some((kind, deprecated)) = MarkerKind::from_attr(attr) {
                if deprecated {
                    markers.deprecated.push((attr.span(), kind));
                }
                if !markers.kinds.contains(&kind) {
                    markers.kinds.push(kind);
                }
            }
        }
        markers
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, kind: MarkerKind) -> bool {
        self.kinds.contains(&kind)
    }

    /// Whether the member opted out of `channel`, either by being ignored or suppressed
    pub(crate) fn excludes(&self, channel: Channel) -> bool {
        self.kinds.iter().any(|kind| kind.channel() == channel)
    }

    pub(crate) fn deprecation_warnings(&self) -> impl Iterator<Item = Diagnostic> + '_ {
        self.deprecated.iter().map(|(span, kind)| {
            Diagnostic::warning(*span, "`publisher_supressed` is deprecated")
                .with_fix_it(format!("use `#[{}]` instead", kind.name()))
        })
    }
}

/// Attributes consumed by the class-level macros. They are stripped from the output.
const HELPERS: &[&str] = &[
    "isolated",
    "nonisolated",
    "superclass",
    "relayed_property",
    "relay",
];

pub(crate) fn is_helper(attr: &syn::Attribute) -> bool {
    MarkerKind::from_attr(attr).is_some()
        || attr_name(attr).is_some_and(|name| HELPERS.contains(&name.as_str()))
}

pub(crate) fn strip_helpers(attrs: &mut Vec<syn::Attribute>) {
    attrs.retain(|attr| !is_helper(attr));
}

/// Attributes which describe availability and are copied onto generated accessors
pub(crate) fn availability(attrs: &[syn::Attribute]) -> Vec<syn::Attribute> {
    attrs
        .iter()
        .filter(|attr| {
            attr.path().is_ident("deprecated")
                || (attr.path().is_ident("doc") && is_doc_cfg(attr))
        })
        .cloned()
        .collect()
}

fn is_doc_cfg(attr: &syn::Attribute) -> bool {
    match &attr.meta {
        syn::Meta::List(list) => list
            .tokens
            .clone()
            .into_iter()
            .next()
            .is_some_and(|token| token.to_string() == "cfg"),
        _ => false,
    }
}

/// `#[cfg(..)]` attributes, copied onto everything generated for a member
pub(crate) fn cfgs(attrs: &[syn::Attribute]) -> Vec<syn::Attribute> {
    attrs
        .iter()
        .filter(|attr| attr.path().is_ident("cfg"))
        .cloned()
        .collect()
}

pub(crate) fn docs(attrs: &[syn::Attribute]) -> Vec<syn::Attribute> {
    attrs
        .iter()
        .filter(|attr| attr.path().is_ident("doc") && !is_doc_cfg(attr))
        .cloned()
        .collect()
}

/// Options given in `#[relay(..)]` on a field or method
#[derive(Clone, Default)]
pub(crate) struct MemberOptions {
    span: Option<Span>,
    default: Option<syn::Expr>,
    immutable: bool,
    overrides: bool,
}

impl MemberOptions {
    pub(crate) fn from_attrs(attrs: &[syn::Attribute]) -> syn::parse::Result<Self> {
        let mut result: Option<MemberOptions> = None;
        for attr in attrs {
            if !attr.path().is_ident("relay") {
                continue;
            }
            if result.is_some() {
                return Err(syn::parse::Error::new(
                    attr.span(),
                    "duplicate relay attribute",
                ));
            }
            let mut options = MemberOptions {
                span: Some(attr.span()),
                ..Default::default()
            };
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("default") {
                    options.default = Some(meta.value()?.parse()?);
                } else if meta.path.is_ident("immutable") {
                    options.immutable = true;
                } else if meta.path.is_ident("overrides") {
                    options.overrides = true;
                } else {
                    return Err(meta.error("unknown attribute"));
                }
                Ok(())
            })?;
            result = Some(options);
        }
        Ok(result.unwrap_or_default())
    }

    pub(crate) fn for_method(attrs: &[syn::Attribute]) -> syn::parse::Result<Self> {
        let options = Self::from_attrs(attrs)?;
        if let Some(span) = options.span {
            if options.default.is_some() {
                return Err(syn::parse::Error::new(
                    span,
                    "'default' is only allowed on fields",
                ));
            }
            if options.immutable {
                return Err(syn::parse::Error::new(
                    span,
                    "'immutable' is only allowed on fields",
                ));
            }
        }
        Ok(options)
    }

    pub(crate) fn default(&self) -> Option<&syn::Expr> {
        self.default.as_ref()
    }

    pub(crate) fn immutable(&self) -> bool {
        self.immutable
    }

    pub(crate) fn overrides(&self) -> bool {
        self.overrides
    }
}

/// The parameters of `#[publishable(..)]`, `#[relayed(..)]` and `#[observable(..)]`
#[derive(Clone, Default)]
pub(crate) struct ClassParameters {
    pub(crate) isolation: Option<GlobalActorIsolation>,
    pub(crate) has_superclass: Option<bool>,
    pub(crate) registrar: Option<syn::Path>,
}

/// Which parameters a class-level macro accepts
#[derive(Clone, Copy)]
pub(crate) struct Accepts {
    pub(crate) has_superclass: bool,
    pub(crate) registrar: bool,
}

impl ClassParameters {
    pub(crate) fn parse(args: proc_macro2::TokenStream, accepts: Accepts) -> syn::parse::Result<Self> {
        use syn::parse::Parser;

        let mut result = ClassParameters::default();
        let parser = syn::meta::parser(|meta| {
            if meta.path.is_ident("isolation") {
                if result.isolation.is_some() {
                    return Err(meta.error("duplicate 'isolation' parameter"));
                }
                let path: syn::Path = meta.value()?.parse()?;
                result.isolation = Some(GlobalActorIsolation::from_path(path));
            } else if meta.path.is_ident("has_superclass") && accepts.has_superclass {
                if result.has_superclass.is_some() {
                    return Err(meta.error("duplicate 'has_superclass' parameter"));
                }
                let value: syn::LitBool = meta.value()?.parse()?;
                result.has_superclass = Some(value.value);
            } else if meta.path.is_ident("registrar") && accepts.registrar {
                if result.registrar.is_some() {
                    return Err(meta.error("duplicate 'registrar' parameter"));
                }
                result.registrar = Some(meta.value()?.parse()?);
            } else {
                return Err(meta.error("unknown parameter"));
            }
            Ok(())
        });
        parser.parse2(args)?;
        Ok(result)
    }
}

/// The parameters of `#[memoized(..)]`: an optional visibility, an optional property name and an
/// optional isolation, in any order, e.g. `#[memoized(pub(crate), "area", isolation = MainActor)]`
#[derive(Clone, Default)]
pub(crate) struct MemoizedParameters {
    pub(crate) vis: Option<syn::Visibility>,
    pub(crate) name: Option<syn::LitStr>,
    pub(crate) isolation: Option<GlobalActorIsolation>,
}

impl Parse for MemoizedParameters {
    fn parse(input: ParseStream) -> syn::parse::Result<Self> {
        let mut result = MemoizedParameters::default();
        while !input.is_empty() {
            if input.peek(syn::Token![pub]) {
                let vis: syn::Visibility = input.parse()?;
                if result.vis.is_some() {
                    return Err(syn::parse::Error::new(vis.span(), "duplicate visibility"));
                }
                result.vis = Some(vis);
            } else if input.peek(syn::LitStr) {
                let name: syn::LitStr = input.parse()?;
                if result.name.is_some() {
                    return Err(syn::parse::Error::new(name.span(), "duplicate property name"));
                }
                result.name = Some(name);
            } else {
                let ident: syn::Ident = input.parse()?;
                input.parse::<syn::Token![=]>()?;
                if ident == "isolation" {
                    if result.isolation.is_some() {
                        return Err(syn::parse::Error::new(
                            ident.span(),
                            "duplicate 'isolation' parameter",
                        ));
                    }
                    let path: syn::Path = input.parse()?;
                    result.isolation = Some(GlobalActorIsolation::from_path(path));
                } else if ident == "name" {
                    if result.name.is_some() {
                        return Err(syn::parse::Error::new(ident.span(), "duplicate property name"));
                    }
                    result.name = Some(input.parse()?);
                } else {
                    return Err(syn::parse::Error::new(ident.span(), "unknown parameter"));
                }
            }
            if input.is_empty() {
                break;
            }
            input.parse::<syn::Token![,]>()?;
        }
        Ok(result)
    }
}

impl MemoizedParameters {
    pub(crate) fn from_attr(attr: &syn::Attribute) -> syn::parse::Result<Self> {
        match &attr.meta {
            syn::Meta::Path(_) => Ok(Self::default()),
            syn::Meta::List(list) => list.parse_args(),
            syn::Meta::NameValue(name_value) => Err(syn::parse::Error::new(
                name_value.span(),
                "expected #[memoized] or #[memoized(..)]",
            )),
        }
    }
}
