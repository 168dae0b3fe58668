use proc_macro2::TokenStream;
use quote::quote;

use super::observable::HiddenField;
use super::Context;

/// The lazily created companion publisher: its hidden field, the `publisher()` accessor and the
/// `relay::Publishable` conformance
pub(crate) struct PublisherBuilder<'a> {
    ctx: &'a Context<'a>,
}

impl<'a> PublisherBuilder<'a> {
    pub(crate) fn new(ctx: &'a Context<'a>) -> Self {
        Self { ctx }
    }

    fn field_type(&self) -> TokenStream {
        let publisher = self.ctx.publisher_ident();
        quote!(::std::sync::OnceLock<#publisher>)
    }

    /// The field as added directly to a struct whose layout this expansion owns
    pub(crate) fn hidden_field(&self) -> HiddenField {
        let ty = self.field_type();
        HiddenField {
            declaration: quote!(__publisher: #ty),
            init: quote!(__publisher: ::std::sync::OnceLock::new()),
        }
    }

    /// The field as injected into a struct whose layout `#[observable]` owns: untracked by either
    /// channel and initialized by its default
    pub(crate) fn injected_field(&self) -> syn::parse::Result<syn::Field> {
        use syn::parse::Parser;

        let ty = self.field_type();
        syn::Field::parse_named.parse2(quote! {
            #[observation_ignored]
            #[publisher_ignored]
            #[relay(default = ::std::sync::OnceLock::new())]
            __publisher: #ty
        })
    }

    pub(crate) fn accessor(&self) -> TokenStream {
        let publisher = self.ctx.publisher_ident();
        let vis = self.ctx.vis;
        let superclass = self.ctx.superclass.map(|superclass| {
            let field = superclass.field();
            quote!(, ::std::sync::Arc::clone(&self.#field))
        });
        quote! {
            /// The publisher of this object's property changes
            #vis fn publisher(&self) -> &#publisher {
                self.__publisher.get_or_init(|| {
                    #publisher::__new(::relay::Observable::downgrade(self) #superclass)
                })
            }
        }
    }

    pub(crate) fn conformance(&self) -> TokenStream {
        let class = self.ctx.ident;
        let publisher = self.ctx.publisher_ident();
        quote! {
            impl ::relay::Publishable for #class {
                type PropertyPublisher = #publisher;

                fn publisher(&self) -> &Self::PropertyPublisher {
                    #class::publisher(self)
                }
            }
        }
    }
}
