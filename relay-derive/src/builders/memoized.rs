use proc_macro2::TokenStream;
use quote::quote;

use crate::isolation::GlobalActorIsolation;
use crate::memoized::MemoizedMethod;

/// The accessor of one `#[memoized]` method.
///
/// A cached value is returned as is. Otherwise the method runs inside a tracking scope and its
/// result is cached until one of the properties it read is about to change; the invalidation
/// callback holds the object only weakly.
pub(crate) struct MemoizedAccessorBuilder<'a> {
    memoized: &'a MemoizedMethod,
}

impl<'a> MemoizedAccessorBuilder<'a> {
    pub(crate) fn new(memoized: &'a MemoizedMethod) -> Self {
        Self { memoized }
    }

    fn key_path(&self) -> TokenStream {
        let name = self.memoized.property_name();
        let property = self.memoized.property_ident();
        let ty = self.memoized.return_type();
        quote!(::relay::KeyPath::<Self, #ty>::new(#name, |object: &Self| object.#property()))
    }

    /// Runs `body` in the method's domain: the explicit one, none at all, or the class's
    fn assume_isolated(&self, body: TokenStream) -> TokenStream {
        match self.memoized.isolation() {
            Some(isolation @ GlobalActorIsolation::Isolated(_)) => {
                isolation.assume_isolated_if_needed(body)
            }
            Some(GlobalActorIsolation::Nonisolated) => quote!({ #body }),
            None => quote! {
                <<Self as ::relay::Observable>::Isolation as ::relay::GlobalActor>::assume_isolated(
                    || { #body },
                )
            },
        }
    }

    fn invalidate(&self) -> TokenStream {
        let name = self.memoized.property_name();
        let observed = self.memoized.is_observation_tracked();
        let published = self.memoized.is_publisher_tracked();

        let key_path = observed.then(|| {
            let key_path = self.key_path();
            quote!(let key_path = #key_path;)
        });
        let begin = published.then(|| quote!(::relay::Observable::begin_modifications(&*this);));
        let will_set = observed.then(|| {
            quote! {
                ::relay::Observable::observation_registrar(&*this).will_set(&*this, &key_path);
            }
        });
        let did_set = observed.then(|| {
            quote! {
                ::relay::Observable::observation_registrar(&*this).did_set(&*this, &key_path);
            }
        });
        let end = published.then(|| quote!(::relay::Observable::end_modifications(&*this);));

        let body = quote! {
            let Some(this) = this.upgrade() else {
                return;
            };
            #key_path
            #begin
            #will_set
            ::relay::Observable::memoized_storage(&*this).remove(#name);
            #did_set
            #end
        };
        self.assume_isolated(body)
    }

    pub(crate) fn accessor(&self) -> TokenStream {
        let name = self.memoized.property_name();
        let property = self.memoized.property_ident();
        let method = self.memoized.method_ident();
        let ty = self.memoized.return_type();
        let vis = self.memoized.access().to_tokens();
        let cfgs = self.memoized.cfgs();
        let availability = self.memoized.availability();
        let warnings = self
            .memoized
            .deprecation_warnings()
            .iter()
            .map(|warning| warning.to_tokens())
            .collect::<TokenStream>();

        let access = self.memoized.is_observation_tracked().then(|| {
            let key_path = self.key_path();
            quote! {
                ::relay::Observable::observation_registrar(self).access(self, &#key_path);
            }
        });
        let invalidate = self.invalidate();
        let doc = format!(
            "The result of [`{}`](Self::{}), cached until one of the properties it reads changes",
            method, method
        );

        quote! {
            #(#cfgs)*
            #[doc = #doc]
            #(#availability)*
            #vis fn #property(&self) -> #ty {
                #warnings
                if let ::std::option::Option::Some(cached) =
                    ::relay::Observable::memoized_storage(self).get::<#ty>(#name)
                {
                    #access
                    return cached;
                }
                let this = ::relay::Observable::downgrade(self);
                ::relay::with_observation_tracking(
                    || {
                        let result = self.#method();
                        ::relay::Observable::memoized_storage(self)
                            .insert(#name, ::std::clone::Clone::clone(&result));
                        result
                    },
                    move || #invalidate,
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use quote::quote;

    use super::*;
    use crate::attrs::MemoizedParameters;

    fn accessor(params: TokenStream, method: TokenStream) -> String {
        let params: MemoizedParameters = syn::parse2(params).unwrap();
        let method: syn::ImplItemFn = syn::parse2(method).unwrap();
        let memoized = MemoizedMethod::extract(params, method).unwrap();
        MemoizedAccessorBuilder::new(&memoized).accessor().to_string()
    }

    #[test]
    fn inherits_the_class_isolation_by_default() {
        let accessor = accessor(quote!(), quote!(pub fn calculate_area(&self) -> f64 { 0.0 }));
        assert!(accessor.contains(&quote!(pub fn area(&self) -> f64).to_string()));
        assert!(accessor.contains(
            &quote!(<<Self as ::relay::Observable>::Isolation as ::relay::GlobalActor>::assume_isolated)
                .to_string()
        ));
    }

    #[test]
    fn explicit_isolation_overrides_the_class() {
        let isolated = accessor(
            quote!(isolation = MainActor),
            quote!(fn calculate_area(&self) -> f64 { 0.0 }),
        );
        assert!(isolated.contains(&quote!(<MainActor as ::relay::GlobalActor>::assume_isolated).to_string()));

        let nonisolated = accessor(
            quote!(isolation = nonisolated),
            quote!(fn calculate_area(&self) -> f64 { 0.0 }),
        );
        assert!(!nonisolated.contains("assume_isolated"));
    }

    #[test]
    fn ignored_channels_are_skipped() {
        let accessor = accessor(
            quote!(),
            quote! {
                #[observation_ignored]
                #[publisher_ignored]
                fn calculate_area(&self) -> f64 { 0.0 }
            },
        );
        assert!(!accessor.contains("will_set"));
        assert!(!accessor.contains("begin_modifications"));
        assert!(accessor.contains("remove"));
    }
}
