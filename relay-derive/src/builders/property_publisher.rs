use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::ext::IdentExt;

use super::relayed_property::RelayedPropertyBuilder;
use super::{replace_self, snake_case, Context};
use crate::access::AccessControlLevel;
use crate::memoized::MemoizedMethod;
use crate::properties::Property;

/// The companion `{T}PropertyPublisher`: one subject per published stored property, the shared
/// will/did change streams, and completion of every subject when it is dropped.
///
/// Computed and memoized publishers live in a separate impl block emitted from the class's impl
/// attachment, see [`computed_publishers`].
pub(crate) struct PropertyPublisherBuilder<'a> {
    ctx: &'a Context<'a>,
    published: Vec<&'a Property>,
}

impl<'a> PropertyPublisherBuilder<'a> {
    /// `published` are the stored properties that get a subject, in declaration order
    pub(crate) fn new(ctx: &'a Context<'a>, published: Vec<&'a Property>) -> Self {
        let published = published
            .into_iter()
            .filter(|property| property.inferred_type().is_some())
            .collect();
        Self { ctx, published }
    }

    pub(crate) fn build(&self) -> TokenStream {
        let declaration = self.declaration();
        let deref = self.deref();
        let inherent = self.inherent();
        let drop = self.drop_impl();
        quote! {
            #declaration
            #deref
            #inherent
            #drop
        }
    }

    fn declaration(&self) -> TokenStream {
        let class = self.ctx.ident;
        let publisher = self.ctx.publisher_ident();
        let vis = self.ctx.vis;
        let base = match self.ctx.superclass {
            Some(superclass) => {
                let base = superclass.base();
                quote!(::std::sync::Arc<#base>)
            }
            None => quote!(::relay::AnyPropertyPublisher),
        };
        let subjects = self.published.iter().map(|property| {
            let cfgs = property.cfgs();
            let storage = RelayedPropertyBuilder::storage_ident(property);
            let ty = property.inferred_type();
            quote! {
                #(#cfgs)*
                #storage: ::relay::PassthroughSubject<#ty>
            }
        });
        let doc = format!("Streams of changes to the properties of [`{}`]", class);
        quote! {
            #[doc = #doc]
            #vis struct #publisher {
                base: #base,
                object: ::std::sync::Weak<#class>,
                #(#subjects,)*
            }

            impl ::std::fmt::Debug for #publisher {
                fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                    f.debug_struct(::std::stringify!(#publisher)).finish_non_exhaustive()
                }
            }
        }
    }

    fn deref(&self) -> TokenStream {
        let publisher = self.ctx.publisher_ident();
        let (target, body) = match self.ctx.superclass {
            Some(superclass) => (superclass.base_publisher(), quote!(self.base.publisher())),
            None => (quote!(::relay::AnyPropertyPublisher), quote!(&self.base)),
        };
        quote! {
            impl ::std::ops::Deref for #publisher {
                type Target = #target;

                fn deref(&self) -> &Self::Target {
                    #body
                }
            }
        }
    }

    fn inherent(&self) -> TokenStream {
        let class = self.ctx.ident;
        let publisher = self.ctx.publisher_ident();
        let vis = self.ctx.vis;
        let snake = snake_case(&class.to_string());
        let will_change = format_ident!("{}_will_change", snake);
        let did_change = format_ident!("{}_did_change", snake);

        let (superclass_param, base_init) = match self.ctx.superclass {
            Some(superclass) => {
                let base = superclass.base();
                (
                    quote!(, superclass: ::std::sync::Arc<#base>),
                    quote!(superclass),
                )
            }
            None => (quote!(), quote!(::relay::AnyPropertyPublisher::new())),
        };
        let subject_inits = self.published.iter().map(|property| {
            let cfgs = property.cfgs();
            let storage = RelayedPropertyBuilder::storage_ident(property);
            quote!(#(#cfgs)* #storage: ::relay::PassthroughSubject::new())
        });
        let accessors = self.published.iter().map(|property| {
            let cfgs = property.cfgs();
            let availability = property.availability();
            let name = property.name();
            let ty = property.inferred_type();
            let storage = RelayedPropertyBuilder::storage_ident(property);
            let key_path_fn = RelayedPropertyBuilder::key_path_fn(property);
            let vis = AccessControlLevel::for_peer(property.vis(), self.ctx.vis).to_tokens();
            let doc = format!(
                "The current value of `{}`, followed by every change to it",
                name.unraw()
            );
            quote! {
                #(#cfgs)*
                #[doc = #doc]
                #(#availability)*
                #vis fn #name(&self) -> ::relay::AnyPublisher<#ty> {
                    ::relay::remove_duplicates_if_equatable!(
                        #ty,
                        ::relay::AnyPropertyPublisher::stored_property_publisher::<#class, #ty>(
                            self,
                            &self.#storage,
                            #class::#key_path_fn(),
                            &self.object,
                        )
                    )
                }
            }
        });

        quote! {
            #[allow(deprecated)]
            impl #publisher {
                #[doc(hidden)]
                #vis fn __new(object: ::std::sync::Weak<#class> #superclass_param) -> Self {
                    Self {
                        base: #base_init,
                        object,
                        #(#subject_inits,)*
                    }
                }

                #[doc(hidden)]
                #vis fn __object(&self) -> &::std::sync::Weak<#class> {
                    &self.object
                }

                /// Emits the object before the first of its properties changes
                #vis fn #will_change(&self) -> ::relay::AnyPublisher<::std::sync::Arc<#class>> {
                    let object = ::std::clone::Clone::clone(&self.object);
                    ::relay::AnyPropertyPublisher::will_change(self)
                        .filter_map(move |()| object.upgrade())
                }

                /// Emits the object after the last of its properties changed
                #vis fn #did_change(&self) -> ::relay::AnyPublisher<::std::sync::Arc<#class>> {
                    let object = ::std::clone::Clone::clone(&self.object);
                    ::relay::AnyPropertyPublisher::did_change(self)
                        .filter_map(move |()| object.upgrade())
                }

                #(#accessors)*
            }
        }
    }

    fn drop_impl(&self) -> TokenStream {
        let publisher = self.ctx.publisher_ident();
        let completions = self.published.iter().map(|property| {
            let cfgs = property.cfgs();
            let storage = RelayedPropertyBuilder::storage_ident(property);
            quote! {
                #(#cfgs)*
                {
                    self.#storage.send_completion(::relay::Completion::Finished);
                }
            }
        });
        quote! {
            impl ::std::ops::Drop for #publisher {
                fn drop(&mut self) {
                    #(#completions)*
                }
            }
        }
    }
}

/// Publishers for the computed properties and memoized methods of `class`, emitted from the
/// class's impl attachment
pub(crate) fn computed_publishers(
    class: &syn::Ident,
    computed: &[&Property],
    memoized: &[&MemoizedMethod],
) -> TokenStream {
    let publisher = super::publisher_ident(class);
    let computed = computed.iter().filter_map(|property| {
        let ty = replace_self(quote::ToTokens::to_token_stream(property.inferred_type()?), class);
        let name = property.name();
        // the impl block does not carry the struct's visibility; the companion type, declared
        // with it, caps these methods
        let vis = AccessControlLevel::for_sibling(property.vis()).to_tokens();
        Some(computed_publisher(
            class,
            name,
            &ty,
            vis,
            property.cfgs(),
            property.availability(),
        ))
    });
    let memoized = memoized.iter().map(|method| {
        let ty = replace_self(quote::ToTokens::to_token_stream(method.return_type()), class);
        let vis = method.access().to_tokens();
        computed_publisher(
            class,
            method.property_ident(),
            &ty,
            vis,
            method.cfgs(),
            method.availability(),
        )
    });
    quote! {
        #[allow(deprecated)]
        impl #publisher {
            #(#computed)*
            #(#memoized)*
        }
    }
}

fn computed_publisher(
    class: &syn::Ident,
    name: &syn::Ident,
    ty: &TokenStream,
    vis: TokenStream,
    cfgs: Vec<syn::Attribute>,
    availability: Vec<syn::Attribute>,
) -> TokenStream {
    let doc = format!(
        "The current value of `{}`, followed by its new value whenever a change to its inputs \
         completes",
        name.unraw()
    );
    quote! {
        #(#cfgs)*
        #[doc = #doc]
        #(#availability)*
        #vis fn #name(&self) -> ::relay::AnyPublisher<#ty> {
            ::relay::remove_duplicates_if_equatable!(
                #ty,
                ::relay::AnyPropertyPublisher::computed_property_publisher::<#class, #ty>(
                    self,
                    self.__object(),
                    |object: &#class| object.#name(),
                )
            )
        }
    }
}
