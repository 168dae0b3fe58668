//! `#[observable]`: native change tracking for a struct's stored properties.
//!
//! Tracked fields are replaced by private storage behind generated accessors which report reads
//! and writes to the object's `relay::ObservationRegistrar`. `#[publishable]` builds on this
//! expansion by passing in its own registrar strategy.

use proc_macro2::TokenStream;
use quote::quote;
use syn::spanned::Spanned;

use crate::attrs::{Accepts, ClassParameters};
use crate::builders::observable::{ObservableBuilder, Tracking};
use crate::builders::Context;
use crate::class::{self, ClassError, Target};
use crate::diagnostic::{Diagnostic, Diagnostics};
use crate::isolation::GlobalActorIsolation;
use crate::properties::PropertiesList;
use crate::superclass::Superclass;

const NAME: &str = "observable";

pub fn observable(
    args: proc_macro::TokenStream,
    input: proc_macro::TokenStream,
) -> proc_macro::TokenStream {
    proc_macro::TokenStream::from(expand(args.into(), input.into()))
}

fn expand(args: TokenStream, input: TokenStream) -> TokenStream {
    let target = match Target::parse(input.clone(), NAME) {
        Ok(target) => target,
        Err(e) => {
            let error = Diagnostic::from(e).to_tokens();
            return quote!(#error #input);
        }
    };
    match target {
        Target::Struct(item) => match expand_struct(args, item.clone()) {
            Ok(expanded) => expanded,
            Err(diagnostics) => class::reemit(Target::Struct(item), diagnostics),
        },
        Target::Impl(mut item) => match class::impl_self_ident(&item, NAME) {
            Ok(_) => {
                class::prepare_impl(&mut item);
                quote!(#item)
            }
            Err(e) => class::reemit(Target::Impl(item), e.into()),
        },
    }
}

fn expand_struct(args: TokenStream, mut item: syn::ItemStruct) -> Result<TokenStream, Diagnostics> {
    class::reject_combined(&item.attrs, NAME, &["relayed"])?;
    let params = ClassParameters::parse(
        args,
        Accepts {
            has_superclass: false,
            registrar: true,
        },
    )
    .map_err(ClassError::from)?;
    if let Some(publishable) = crate::attrs::find_attr(&item.attrs, "publishable") {
        return Err(Diagnostic::error(
            publishable.span(),
            "#[publishable] must be placed above #[observable]",
        )
        .with_fix_it("move #[publishable] above #[observable]")
        .into());
    }

    let isolation = GlobalActorIsolation::resolve(params.isolation.as_ref(), &item.attrs)
        .map_err(ClassError::from)?;
    let fields = class::named_fields(&mut item, NAME)?.clone();
    let superclass = Superclass::marked(&fields).map_err(Diagnostic::from)?;
    let properties = PropertiesList::from_fields(&fields, superclass.as_ref().map(Superclass::field))
        .map_err(ClassError::from)?;

    let mut diagnostics = Diagnostics::new();
    diagnostics.extend(properties.type_errors());
    if diagnostics.has_errors() {
        return Err(diagnostics);
    }
    diagnostics.extend(properties.deprecation_warnings());

    let ctx = Context {
        ident: &item.ident,
        vis: &item.vis,
        properties: &properties,
        isolation: &isolation,
        superclass: superclass.as_ref(),
    };
    let registrar = params.registrar.as_ref().map(|path| quote!(#path));
    let builder = ObservableBuilder::new(&ctx, Tracking::Observation, registrar, Vec::new());
    let fields = builder.fields();
    let constructor = builder.constructor();
    let accessors = builder.accessors();
    let conformance = builder.conformance();
    let deref = builder.superclass_deref();
    let isolation_assertion = builder.isolation_assertion();
    let warnings = diagnostics.to_tokens();

    class::strip_struct_helpers(&mut item);
    let attrs = &item.attrs;
    let vis = &item.vis;
    let ident = &item.ident;
    Ok(quote! {
        #(#attrs)*
        #vis struct #ident {
            #fields
        }

        impl #ident {
            #constructor
            #accessors
        }

        #conformance
        #deref
        #isolation_assertion
        #warnings
    })
}

#[cfg(test)]
mod tests {
    use quote::quote;

    use super::*;

    #[test]
    fn publishable_below_observable_is_rejected() {
        let output = expand(
            quote!(),
            quote! {
                #[publishable]
                struct Person { name: String }
            },
        )
        .to_string();
        assert!(output.contains("must be placed above"));
    }

    #[test]
    fn relayed_cannot_be_combined() {
        let output = expand(
            quote!(),
            quote! {
                #[relayed]
                struct Person { name: String }
            },
        )
        .to_string();
        assert!(output.contains("cannot be combined with"));
        assert!(output.contains("remove #[relayed]"));
    }

    #[test]
    fn uninferable_fields_are_errors() {
        let output = expand(
            quote!(),
            quote! {
                struct Person {
                    #[relay(default = Default::default())]
                    name: _,
                }
            },
        )
        .to_string();
        assert!(output.contains("cannot infer the type of `name`"));
    }

    #[test]
    fn injected_registrar_is_used() {
        let output = expand(
            quote!(registrar = PersonObservationRegistrar),
            quote!(struct Person { name: String }),
        )
        .to_string();
        assert!(output.contains(&quote!(type Registrar = PersonObservationRegistrar;).to_string()));
        assert!(output.contains("begin_modifications"));
    }
}
