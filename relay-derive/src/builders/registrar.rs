use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::ext::IdentExt;

use super::relayed_property::RelayedPropertyBuilder;
use super::{replace_self, Context};
use crate::properties::{type_key, PropertiesList, Property};

/// The `{T}ObservationRegistrar` strategy injected into `#[observable]` by `#[publishable]`.
///
/// It forwards every operation to the object's native registrar and additionally brackets each
/// write in the publisher's modification bracket, sending the new value on the property's
/// subject once it is stored.
pub(crate) struct RegistrarBuilder<'a> {
    ctx: &'a Context<'a>,
    published: Vec<&'a Property>,
}

impl<'a> RegistrarBuilder<'a> {
    pub(crate) fn new(ctx: &'a Context<'a>, published: Vec<&'a Property>) -> Self {
        let published = published
            .into_iter()
            .filter(|property| property.inferred_type().is_some())
            .collect();
        Self { ctx, published }
    }

    pub(crate) fn build(&self) -> TokenStream {
        let class = self.ctx.ident;
        let registrar = self.ctx.registrar_ident();
        let vis = self.ctx.vis;
        let bridge = self.ctx.isolation.assume_isolated_if_needed(quote!(operation()));
        let publish = self.publish();
        let subjects_for = self.subjects_for();

        quote! {
            #[doc(hidden)]
            #[derive(Debug, Clone, Copy, Default)]
            #vis struct #registrar;

            #[allow(deprecated)]
            impl #registrar {
                fn assume_isolated_if_needed<R>(operation: impl ::std::ops::FnOnce() -> R) -> R {
                    #bridge
                }

                #subjects_for

                #publish
            }

            impl ::relay::PublishableObservationRegistrar<#class> for #registrar {
                fn access<Value: 'static>(
                    &self,
                    object: &#class,
                    key_path: &::relay::KeyPath<#class, Value>,
                ) {
                    Self::assume_isolated_if_needed(|| {
                        ::relay::Observable::observation_registrar(object).access(object, key_path)
                    })
                }

                fn will_set<Value: 'static>(
                    &self,
                    object: &#class,
                    key_path: &::relay::KeyPath<#class, Value>,
                ) {
                    Self::assume_isolated_if_needed(|| {
                        ::relay::AnyPropertyPublisher::begin_modifications(object.publisher());
                        ::relay::Observable::observation_registrar(object).will_set(object, key_path);
                    })
                }

                fn did_set<Value: 'static>(
                    &self,
                    object: &#class,
                    key_path: &::relay::KeyPath<#class, Value>,
                ) {
                    Self::assume_isolated_if_needed(|| {
                        ::relay::Observable::observation_registrar(object).did_set(object, key_path);
                        Self::publish(object, key_path);
                        ::relay::AnyPropertyPublisher::end_modifications(object.publisher());
                    })
                }

                fn with_mutation<Value: 'static, R, F: ::std::ops::FnOnce() -> R>(
                    &self,
                    object: &#class,
                    key_path: &::relay::KeyPath<#class, Value>,
                    mutation: F,
                ) -> R {
                    Self::assume_isolated_if_needed(|| {
                        ::relay::AnyPropertyPublisher::begin_modifications(object.publisher());
                        let _published = ::relay::__private::defer(|| {
                            Self::publish(object, key_path);
                            ::relay::AnyPropertyPublisher::end_modifications(object.publisher());
                        });
                        ::relay::Observable::observation_registrar(object)
                            .with_mutation(object, key_path, mutation)
                    })
                }
            }
        }
    }

    /// Whether every published property has a type no other published property shares
    fn has_distinct_types(&self) -> bool {
        PropertiesList::unique_types(self.published.iter().copied()).len() == self.published.len()
    }

    /// The published properties grouped by type, in order of first appearance
    fn groups(&self) -> Vec<(&'a syn::Type, Vec<&'a Property>)> {
        let mut groups: Vec<(&syn::Type, Vec<&Property>)> = Vec::new();
        for property in self.published.iter().copied() {
            let Some(ty) = property.inferred_type() else {
                continue;
            };
            let key = type_key(ty);
            match groups.iter_mut().find(|(other, _)| type_key(*other) == key) {
                Some((_, members)) => members.push(property),
                None => groups.push((ty, vec![property])),
            }
        }
        groups
    }

    fn subjects_for(&self) -> Option<TokenStream> {
        if self.has_distinct_types() {
            return None;
        }
        let class = self.ctx.ident;
        let publisher = self.ctx.publisher_ident();
        let helpers = self.groups().into_iter().enumerate().map(|(index, (ty, members))| {
            let helper = format_ident!("subject_for_{}", index);
            let ty = replace_self(quote!(#ty), class);
            let arms = members.iter().map(|property| {
                let cfgs = property.cfgs();
                let name = property.name().unraw().to_string();
                let storage = RelayedPropertyBuilder::storage_ident(property);
                quote!(#(#cfgs)* #name => ::std::option::Option::Some(&publisher.#storage),)
            });
            quote! {
                fn #helper<'a>(
                    publisher: &'a #publisher,
                    key_path: &::relay::KeyPath<#class, #ty>,
                ) -> ::std::option::Option<&'a ::relay::PassthroughSubject<#ty>> {
                    match key_path.name() {
                        #(#arms)*
                        _ => ::std::option::Option::None,
                    }
                }
            }
        });
        Some(quote!(#(#helpers)*))
    }

    fn publish(&self) -> TokenStream {
        let class = self.ctx.ident;
        let body = if self.has_distinct_types() {
            let arms = self.published.iter().map(|property| {
                let cfgs = property.cfgs();
                let name = property.name().unraw().to_string();
                let storage = RelayedPropertyBuilder::storage_ident(property);
                let key_path_fn = RelayedPropertyBuilder::key_path_fn(property);
                quote! {
                    #(#cfgs)*
                    #name => publisher.#storage.send(#class::#key_path_fn().get(object)),
                }
            });
            quote! {
                let publisher = object.publisher();
                match key_path.name() {
                    #(#arms)*
                    _ => {}
                }
            }
        } else {
            let branches = self.groups().into_iter().enumerate().map(|(index, (ty, _))| {
                let helper = format_ident!("subject_for_{}", index);
                let ty = replace_self(quote!(#ty), class);
                quote! {
                    if let ::std::option::Option::Some(key_path) =
                        key_path.downcast_ref::<::relay::KeyPath<#class, #ty>>()
                    {
                        if let ::std::option::Option::Some(subject) = Self::#helper(publisher, key_path) {
                            subject.send(key_path.get(object));
                        }
                        return;
                    }
                }
            });
            quote! {
                let publisher = object.publisher();
                let key_path: &dyn ::std::any::Any = key_path;
                #(#branches)*
            }
        };
        quote! {
            #[allow(unused_variables)]
            fn publish<Value: 'static>(object: &#class, key_path: &::relay::KeyPath<#class, Value>) {
                #body
            }
        }
    }
}
