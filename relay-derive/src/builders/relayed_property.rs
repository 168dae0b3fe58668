use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::ext::IdentExt;

use crate::access::AccessControlLevel;
use crate::properties::Property;

/// Accessors for one tracked stored property.
///
/// The field itself becomes private `relay::Storage`, read and written through `name()`,
/// `set_name()` and `modify_name()`. Which notifications the accessors send depends on the two
/// tracking channels:
///
/// | observation | publisher | reads                 | writes                                    |
/// |-------------|-----------|-----------------------|-------------------------------------------|
/// | yes         | yes       | `access`              | begin, `will_set`, store, `did_set`, send, end |
/// | yes         | no        | `access`              | `will_set`, store, `did_set`              |
/// | no          | yes       | -                     | begin, store, send, end                   |
pub(crate) struct RelayedPropertyBuilder<'a> {
    property: &'a Property,
    ty: &'a syn::Type,
    observation: bool,
    publisher: bool,
}

impl<'a> RelayedPropertyBuilder<'a> {
    /// `None` when the property has no type; the entry point reports that separately
    pub(crate) fn new(property: &'a Property, observation: bool, publisher: bool) -> Option<Self> {
        Some(Self {
            property,
            ty: property.inferred_type()?,
            observation,
            publisher,
        })
    }

    pub(crate) fn storage_ident(property: &Property) -> syn::Ident {
        format_ident!("_{}", property.name().unraw())
    }

    pub(crate) fn key_path_fn(property: &Property) -> syn::Ident {
        format_ident!("__key_path_{}", property.name().unraw())
    }

    pub(crate) fn init_fn(property: &Property) -> syn::Ident {
        format_ident!("__init_{}", property.name().unraw())
    }

    /// The private storage field replacing the declared one
    pub(crate) fn storage_field(&self) -> TokenStream {
        let cfgs = self.property.cfgs();
        let storage = Self::storage_ident(self.property);
        let ty = self.ty;
        quote! {
            #(#cfgs)*
            #storage: ::relay::Storage<#ty>
        }
    }

    pub(crate) fn accessors(&self) -> TokenStream {
        let name = self.property.name();
        let key = name.unraw().to_string();
        let ty = self.ty;
        let storage = Self::storage_ident(self.property);
        let key_path_fn = Self::key_path_fn(self.property);
        let init_fn = Self::init_fn(self.property);
        let setter = format_ident!("set_{}", name.unraw());
        let modifier = format_ident!("modify_{}", name.unraw());

        let cfgs = self.property.cfgs();
        let availability = self.property.availability();
        let docs = self.property.docs();
        let vis = AccessControlLevel::for_sibling(self.property.vis()).to_tokens();

        let access = self.observation.then(|| {
            quote! {
                ::relay::PublishableObservationRegistrar::access(
                    &<Self as ::relay::Observable>::REGISTRAR,
                    self,
                    &Self::#key_path_fn(),
                );
            }
        });
        let will_set = self.observation.then(|| {
            quote! {
                ::relay::PublishableObservationRegistrar::will_set(
                    &<Self as ::relay::Observable>::REGISTRAR,
                    self,
                    &key_path,
                );
            }
        });
        let did_set = self.observation.then(|| {
            quote! {
                ::relay::PublishableObservationRegistrar::did_set(
                    &<Self as ::relay::Observable>::REGISTRAR,
                    self,
                    &key_path,
                );
            }
        });
        let begin = self.publisher.then(|| {
            quote!(::relay::AnyPropertyPublisher::begin_modifications(self.publisher());)
        });
        let send = self
            .publisher
            .then(|| quote!(self.publisher().#storage.send(self.#storage.get());));
        let end = self.publisher.then(|| {
            quote!(::relay::AnyPropertyPublisher::end_modifications(self.publisher());)
        });
        let key_path = self.observation.then(|| {
            quote!(let key_path = Self::#key_path_fn();)
        });
        // runs after the write even if it unwinds, so the bracket stays balanced
        let did_write = quote! {
            let _did_write = ::relay::__private::defer(|| {
                #did_set
                #send
                #end
            });
        };

        quote! {
            #(#cfgs)*
            #[doc(hidden)]
            #[allow(dead_code)]
            fn #key_path_fn() -> ::relay::KeyPath<Self, #ty> {
                ::relay::KeyPath::new(#key, |object: &Self| object.#storage.get())
            }

            #(#cfgs)*
            #[doc(hidden)]
            fn #init_fn(initial_value: #ty) -> ::relay::Storage<#ty> {
                ::relay::Storage::new(initial_value)
            }

            #(#cfgs)*
            #(#docs)*
            #(#availability)*
            #vis fn #name(&self) -> #ty {
                #access
                self.#storage.get()
            }

            #(#cfgs)*
            #(#availability)*
            #vis fn #setter(&self, new_value: #ty) {
                let should_notify = self
                    .#storage
                    .with(|current| ::relay::should_notify_observers!(#ty, current, &new_value));
                if !should_notify {
                    self.#storage.set(new_value);
                    return;
                }
                #key_path
                #begin
                #will_set
                #did_write
                self.#storage.set(new_value);
            }

            #(#cfgs)*
            #(#availability)*
            #vis fn #modifier<R>(&self, modify: impl ::std::ops::FnOnce(&mut #ty) -> R) -> R {
                #access
                #key_path
                #begin
                #will_set
                #did_write
                self.#storage.with_mut(modify)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use quote::quote;

    use super::*;
    use crate::properties::PropertiesList;

    fn property(tokens: TokenStream) -> Property {
        let fields: syn::FieldsNamed = syn::parse2(tokens).unwrap();
        let list = PropertiesList::from_fields(&fields, None).unwrap();
        let property = list.stored().next().cloned().unwrap();
        property
    }

    #[test]
    fn storage_is_renamed_and_keeps_cfg() {
        let property = property(quote!({
            #[cfg(feature = "extra")]
            #[deprecated]
            pub r#type: String,
        }));
        let builder = RelayedPropertyBuilder::new(&property, true, true).unwrap();
        assert_eq!(
            builder.storage_field().to_string(),
            quote!(#[cfg(feature = "extra")] _type: ::relay::Storage<String>).to_string()
        );
    }

    #[test]
    fn observation_only_accessors_do_not_publish() {
        let property = property(quote!({ age: u32 }));
        let accessors = RelayedPropertyBuilder::new(&property, true, false)
            .unwrap()
            .accessors()
            .to_string();
        assert!(accessors.contains("will_set"));
        assert!(!accessors.contains("begin_modifications"));
        assert!(!accessors.contains("publisher"));
    }

    #[test]
    fn publisher_only_accessors_do_not_observe() {
        let property = property(quote!({ age: u32 }));
        let accessors = RelayedPropertyBuilder::new(&property, false, true)
            .unwrap()
            .accessors()
            .to_string();
        assert!(!accessors.contains("will_set"));
        assert!(!accessors.contains(":: relay :: PublishableObservationRegistrar :: access"));
        assert!(accessors.contains("begin_modifications"));
        assert!(accessors.contains("end_modifications"));
    }

    #[test]
    fn writes_are_closed_by_a_deferred_block() {
        let property = property(quote!({ age: u32 }));
        let accessors = RelayedPropertyBuilder::new(&property, true, true)
            .unwrap()
            .accessors()
            .to_string();
        let modifier = &accessors[accessors.find("fn modify_age").unwrap()..];
        let access = modifier
            .find(":: relay :: PublishableObservationRegistrar :: access")
            .unwrap();
        let begin = modifier.find("begin_modifications").unwrap();
        let deferred = modifier.find(":: relay :: __private :: defer").unwrap();
        let end = modifier.find("end_modifications").unwrap();
        let write = modifier.find("with_mut (modify)").unwrap();
        assert!(access < begin);
        assert!(begin < deferred);
        assert!(deferred < end);
        assert!(end < write);
        assert_eq!(accessors.matches(":: relay :: __private :: defer").count(), 2);
    }
}
