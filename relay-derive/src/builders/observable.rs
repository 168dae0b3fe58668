use proc_macro2::TokenStream;
use quote::quote;

use super::relayed_property::RelayedPropertyBuilder;
use super::Context;
use crate::attrs;
use crate::properties::Property;

/// Which stored properties get relayed storage and through which channels
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum Tracking {
    /// `#[observable]`: observation only; publishing, if any, goes through the registrar
    Observation,
    /// `#[relayed]`: both channels, driven by the accessors themselves
    ObservationAndPublisher,
}

impl Tracking {
    pub(crate) fn observation(self, property: &Property) -> bool {
        property.is_stored_observation_tracked()
    }

    pub(crate) fn publisher(self, property: &Property) -> bool {
        self == Tracking::ObservationAndPublisher && property.is_stored_publisher_tracked()
    }

    pub(crate) fn is_relayed(self, property: &Property) -> bool {
        self.observation(property) || self.publisher(property)
    }
}

/// An extra hidden field, with its initializer
pub(crate) struct HiddenField {
    pub(crate) declaration: TokenStream,
    pub(crate) init: TokenStream,
}

/// The storage rewrite, constructor and `relay::Observable` conformance shared by
/// `#[observable]` and `#[relayed]`
pub(crate) struct ObservableBuilder<'a> {
    ctx: &'a Context<'a>,
    tracking: Tracking,
    registrar: Option<TokenStream>,
    extra_fields: Vec<HiddenField>,
}

impl<'a> ObservableBuilder<'a> {
    pub(crate) fn new(
        ctx: &'a Context<'a>,
        tracking: Tracking,
        registrar: Option<TokenStream>,
        extra_fields: Vec<HiddenField>,
    ) -> Self {
        Self {
            ctx,
            tracking,
            registrar,
            extra_fields,
        }
    }

    fn relayed(&self) -> impl Iterator<Item = RelayedPropertyBuilder<'a>> + '_ {
        self.ctx.properties.stored().filter_map(move |property| {
            if !self.tracking.is_relayed(property) {
                return None;
            }
            RelayedPropertyBuilder::new(
                property,
                self.tracking.observation(property),
                self.tracking.publisher(property),
            )
        })
    }

    /// The struct's fields: relayed storage in place of tracked fields, the rest unchanged apart
    /// from their types being filled in, then the hidden runtime fields
    pub(crate) fn fields(&self) -> TokenStream {
        let fields = self.ctx.properties.stored().map(|property| {
            if self.tracking.is_relayed(property) {
                if let Some(builder) = RelayedPropertyBuilder::new(
                    property,
                    self.tracking.observation(property),
                    self.tracking.publisher(property),
                ) {
                    return builder.storage_field();
                }
            }
            let mut attrs = property.attrs().to_vec();
            attrs::strip_helpers(&mut attrs);
            let vis = property.vis();
            let name = property.name();
            let ty = property.inferred_type();
            quote! {
                #(#attrs)*
                #vis #name: #ty
            }
        });
        let extra = self.extra_fields.iter().map(|field| &field.declaration);
        let class = self.ctx.ident;
        quote! {
            #(#fields,)*
            __observation_registrar: ::relay::ObservationRegistrar,
            __memoized: ::relay::MemoizedStorage,
            __this: ::std::sync::Weak<#class>,
            #(#extra,)*
        }
    }

    pub(crate) fn accessors(&self) -> TokenStream {
        self.relayed().map(|builder| builder.accessors()).collect()
    }

    /// `new(..) -> Arc<Self>`, taking every field without a default in declaration order
    pub(crate) fn constructor(&self) -> TokenStream {
        let mut params = Vec::new();
        let mut inits = Vec::new();
        for property in self.ctx.properties.stored() {
            let cfgs = property.cfgs();
            let name = property.name();
            let value = match property.default() {
                Some(default) => quote!(#default),
                None => {
                    let ty = property.inferred_type();
                    params.push(quote!(#(#cfgs)* #name: #ty));
                    quote!(#name)
                }
            };
            if self.tracking.is_relayed(property) && property.inferred_type().is_some() {
                let storage = RelayedPropertyBuilder::storage_ident(property);
                let init_fn = RelayedPropertyBuilder::init_fn(property);
                inits.push(quote!(#(#cfgs)* #storage: Self::#init_fn(#value)));
            } else {
                inits.push(quote!(#(#cfgs)* #name: #value));
            }
        }
        let extra = self.extra_fields.iter().map(|field| &field.init);
        let vis = self.ctx.vis;
        quote! {
            /// Create a new instance, shared behind an `Arc` so that generated publishers and
            /// memoized properties can refer back to it.
            #[allow(clippy::too_many_arguments)]
            #vis fn new(#(#params),*) -> ::std::sync::Arc<Self> {
                ::std::sync::Arc::new_cyclic(|this| Self {
                    #(#inits,)*
                    __observation_registrar: ::relay::ObservationRegistrar::new(),
                    __memoized: ::relay::MemoizedStorage::new(),
                    __this: ::std::clone::Clone::clone(this),
                    #(#extra,)*
                })
            }
        }
    }

    /// `impl relay::Observable`. A class with a publisher, either relayed or with a registrar
    /// injected by `#[publishable]`, also routes the modification hooks to it so that memoized
    /// properties bracket their invalidation.
    pub(crate) fn conformance(&self) -> TokenStream {
        let class = self.ctx.ident;
        let isolation = self.ctx.isolation.actor_type();
        let registrar = self
            .registrar
            .clone()
            .unwrap_or_else(|| quote!(::relay::NativeObservationRegistrar));
        let publishes = self.tracking == Tracking::ObservationAndPublisher || self.registrar.is_some();
        let hooks = publishes.then(|| {
            quote! {
                fn begin_modifications(&self) {
                    ::relay::AnyPropertyPublisher::begin_modifications(self.publisher())
                }

                fn end_modifications(&self) {
                    ::relay::AnyPropertyPublisher::end_modifications(self.publisher())
                }
            }
        });
        quote! {
            impl ::relay::Observable for #class {
                type Isolation = #isolation;
                type Registrar = #registrar;

                const REGISTRAR: Self::Registrar = #registrar;

                fn observation_registrar(&self) -> &::relay::ObservationRegistrar {
                    &self.__observation_registrar
                }

                fn downgrade(&self) -> ::std::sync::Weak<Self> {
                    ::std::clone::Clone::clone(&self.__this)
                }

                fn memoized_storage(&self) -> &::relay::MemoizedStorage {
                    &self.__memoized
                }

                #hooks
            }
        }
    }

    /// `Deref` to the base object held by the `#[superclass]` field
    pub(crate) fn superclass_deref(&self) -> Option<TokenStream> {
        let link = self.ctx.superclass?;
        let class = self.ctx.ident;
        let field = link.field();
        let base = link.base();
        Some(quote! {
            impl ::std::ops::Deref for #class {
                type Target = #base;

                fn deref(&self) -> &Self::Target {
                    &self.#field
                }
            }
        })
    }

    /// A subclass must be isolated to the same domain as its base
    pub(crate) fn isolation_assertion(&self) -> Option<TokenStream> {
        let link = self.ctx.superclass?;
        let base = link.base();
        let isolation = self.ctx.isolation.actor_type();
        Some(quote! {
            const _: () = ::relay::__private::assert_same_isolation::<
                #isolation,
                <#base as ::relay::Observable>::Isolation,
            >();
        })
    }
}
