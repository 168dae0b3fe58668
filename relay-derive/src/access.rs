use proc_macro2::TokenStream;
use quote::quote;

/// How visible a declaration is, from least to most visible.
///
/// Generated declarations never expose more than the declarations they are derived from, so
/// every computed visibility goes through [`AccessControlLevel::min`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum AccessControlLevel {
    Private,
    Super,
    Restricted(syn::Path),
    Crate,
    Public,
}

impl AccessControlLevel {
    pub(crate) fn of(vis: &syn::Visibility) -> Self {
        match vis {
            syn::Visibility::Public(_) => Self::Public,
            syn::Visibility::Inherited => Self::Private,
            syn::Visibility::Restricted(restricted) => {
                let path = restricted.path.as_ref();
                if path.is_ident("crate") {
                    Self::Crate
                } else if path.is_ident("super") {
                    Self::Super
                } else if path.is_ident("self") {
                    Self::Private
                } else {
                    Self::Restricted(path.clone())
                }
            }
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Private => 0,
            Self::Super => 1,
            Self::Restricted(_) => 2,
            Self::Crate => 3,
            Self::Public => 4,
        }
    }

    /// The less visible of the two levels. On a tie `self` wins.
    pub(crate) fn min(self, other: Self) -> Self {
        if other.rank() < self.rank() {
            other
        } else {
            self
        }
    }

    /// The visibility of a declaration generated next to `member`, in the same scope
    pub(crate) fn for_sibling(member: &syn::Visibility) -> Self {
        Self::of(member).min(Self::Public)
    }

    /// The visibility of a declaration generated inside a companion type, which is itself no more
    /// visible than `context`
    pub(crate) fn for_peer(member: &syn::Visibility, context: &syn::Visibility) -> Self {
        Self::of(member).min(Self::of(context))
    }

    pub(crate) fn to_tokens(&self) -> TokenStream {
        match self {
            Self::Private => TokenStream::new(),
            Self::Super => quote!(pub(super)),
            Self::Restricted(path) => quote!(pub(in #path)),
            Self::Crate => quote!(pub(crate)),
            Self::Public => quote!(pub),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vis(tokens: &str) -> syn::Visibility {
        syn::parse_str(tokens).unwrap()
    }

    #[test]
    fn levels_are_read_from_visibilities() {
        assert_eq!(AccessControlLevel::of(&vis("pub")), AccessControlLevel::Public);
        assert_eq!(AccessControlLevel::of(&vis("pub(crate)")), AccessControlLevel::Crate);
        assert_eq!(AccessControlLevel::of(&vis("pub(super)")), AccessControlLevel::Super);
        assert_eq!(AccessControlLevel::of(&vis("pub(self)")), AccessControlLevel::Private);
        assert_eq!(AccessControlLevel::of(&vis("")), AccessControlLevel::Private);
        assert!(matches!(
            AccessControlLevel::of(&vis("pub(in crate::model)")),
            AccessControlLevel::Restricted(_)
        ));
    }

    #[test]
    fn peers_are_clamped_to_their_context() {
        assert_eq!(
            AccessControlLevel::for_peer(&vis("pub"), &vis("pub(crate)")),
            AccessControlLevel::Crate
        );
        assert_eq!(
            AccessControlLevel::for_peer(&vis(""), &vis("pub")),
            AccessControlLevel::Private
        );
        assert_eq!(
            AccessControlLevel::for_sibling(&vis("pub(crate)")),
            AccessControlLevel::Crate
        );
    }

    #[test]
    fn private_renders_as_nothing() {
        assert!(AccessControlLevel::Private.to_tokens().is_empty());
        assert_eq!(
            AccessControlLevel::Crate.to_tokens().to_string(),
            quote!(pub(crate)).to_string()
        );
    }
}
