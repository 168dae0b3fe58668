use proc_macro2::TokenStream;
use quote::quote;
use syn::spanned::Spanned;

use crate::attrs::attr_name;

/// The concurrency domain generated members are confined to
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum GlobalActorIsolation {
    Nonisolated,
    Isolated(syn::Path),
}

impl GlobalActorIsolation {
    /// `nonisolated` and `None` spell the absence of a domain; any other path names a
    /// `relay::GlobalActor`
    pub(crate) fn from_path(path: syn::Path) -> Self {
        if path.is_ident("nonisolated") || path.is_ident("None") {
            Self::Nonisolated
        } else {
            Self::Isolated(path)
        }
    }

    /// Read `#[isolated(Actor)]` or `#[nonisolated]` from a declaration's attributes
    pub(crate) fn from_attrs(attrs: &[syn::Attribute]) -> syn::parse::Result<Option<Self>> {
        let mut result: Option<(Self, proc_macro2::Span)> = None;
        for attr in attrs {
            let found = match attr_name(attr).as_deref() {
                Some("isolated") => {
                    let path: syn::Path = attr.parse_args()?;
                    Self::from_path(path)
                }
                Some("nonisolated") => {
                    attr.meta.require_path_only()?;
                    Self::Nonisolated
                }
                _ => continue,
            };
            if let Some((_, first)) = &result {
                let mut e = syn::parse::Error::new(attr.span(), "conflicting isolation attributes");
                e.combine(syn::parse::Error::new(*first, "first isolation attribute here"));
                return Err(e);
            }
            result = Some((found, attr.span()));
        }
        Ok(result.map(|(isolation, _)| isolation))
    }

    /// An explicit parameter wins over attributes, which win over no isolation at all
    pub(crate) fn resolve(
        explicit: Option<&GlobalActorIsolation>,
        attrs: &[syn::Attribute],
    ) -> syn::parse::Result<Self> {
        let from_attrs = Self::from_attrs(attrs)?;
        Ok(explicit
            .cloned()
            .or(from_attrs)
            .unwrap_or(GlobalActorIsolation::Nonisolated))
    }

    /// The `relay::GlobalActor` implementing this isolation
    pub(crate) fn actor_type(&self) -> TokenStream {
        match self {
            Self::Nonisolated => quote!(::relay::Nonisolated),
            Self::Isolated(path) => quote!(#path),
        }
    }

    /// The parameter spelling, for passing an isolation on to `#[observable]`
    pub(crate) fn to_parameter(&self) -> TokenStream {
        match self {
            Self::Nonisolated => quote!(isolation = nonisolated),
            Self::Isolated(path) => quote!(isolation = #path),
        }
    }

    /// Wrap `body` so that it runs after asserting that the current thread is inside the domain
    pub(crate) fn assume_isolated_if_needed(&self, body: TokenStream) -> TokenStream {
        match self {
            Self::Nonisolated => quote!({ #body }),
            Self::Isolated(path) => quote! {
                <#path as ::relay::GlobalActor>::assume_isolated(|| { #body })
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(tokens: TokenStream) -> Vec<syn::Attribute> {
        let item: syn::ItemStruct = syn::parse2(quote! {
            #tokens
            struct Probe;
        })
        .unwrap();
        item.attrs
    }

    #[test]
    fn explicit_parameter_wins() {
        let explicit = GlobalActorIsolation::Nonisolated;
        let resolved =
            GlobalActorIsolation::resolve(Some(&explicit), &attrs(quote!(#[isolated(MainActor)])))
                .unwrap();
        assert_eq!(resolved, GlobalActorIsolation::Nonisolated);
    }

    #[test]
    fn attributes_win_over_the_default() {
        let resolved =
            GlobalActorIsolation::resolve(None, &attrs(quote!(#[isolated(MainActor)]))).unwrap();
        assert_eq!(
            resolved.actor_type().to_string(),
            quote!(MainActor).to_string()
        );
        let default = GlobalActorIsolation::resolve(None, &[]).unwrap();
        assert_eq!(default, GlobalActorIsolation::Nonisolated);
    }

    #[test]
    fn conflicting_attributes_are_rejected() {
        let result = GlobalActorIsolation::from_attrs(&attrs(quote! {
            #[isolated(MainActor)]
            #[nonisolated]
        }));
        assert!(result.is_err());
    }
}
