//! `#[relayed]`: observation and publishing for a struct's stored properties in one expansion.
//!
//! Unlike `#[publishable]`, which layers a registrar over `#[observable]`, the accessors
//! generated here drive both channels directly.

use proc_macro2::TokenStream;
use quote::quote;

use crate::attrs::{Accepts, ClassParameters};
use crate::builders::observable::{ObservableBuilder, Tracking};
use crate::builders::property_publisher::PropertyPublisherBuilder;
use crate::builders::publisher::PublisherBuilder;
use crate::builders::Context;
use crate::class::{self, Target};
use crate::diagnostic::{Diagnostic, Diagnostics};
use crate::isolation::GlobalActorIsolation;
use crate::properties::PropertiesList;
use crate::superclass::Superclass;

const NAME: &str = "relayed";

pub fn relayed(
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
        Target::Impl(item) => match class::expand_publishing_impl(args, item.clone(), NAME) {
            Ok(expanded) => expanded,
            Err(diagnostics) => class::reemit(Target::Impl(item), diagnostics),
        },
    }
}

fn expand_struct(args: TokenStream, mut item: syn::ItemStruct) -> Result<TokenStream, Diagnostics> {
    class::reject_combined(&item.attrs, NAME, &["observable", "publishable"])?;
    let params = ClassParameters::parse(
        args,
        Accepts {
            has_superclass: true,
            registrar: false,
        },
    )?;

    let mut diagnostics = Diagnostics::new();
    diagnostics.extend(class::model_warning(&item, NAME));

    let isolation = GlobalActorIsolation::resolve(params.isolation.as_ref(), &item.attrs)?;
    let span = item.ident.span();
    let fields = class::named_fields(&mut item, NAME)?.clone();
    let (superclass, warning) =
        Superclass::resolve(&fields, params.has_superclass, span).map_err(Diagnostic::from)?;
    diagnostics.extend(warning);
    let properties =
        PropertiesList::from_fields(&fields, superclass.as_ref().map(Superclass::field))?;

    diagnostics.extend(properties.type_errors());
    for property in properties.stored() {
        let Some(span) = property.explicit_relayed_property() else {
            continue;
        };
        if !property.is_stored_observation_tracked() && !property.is_stored_publisher_tracked() {
            diagnostics.push(
                Diagnostic::error(
                    span,
                    "#[relayed_property] can only be applied to stored properties that are tracked",
                )
                .with_fix_it("remove #[relayed_property]"),
            );
        }
    }
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
    let publisher = PublisherBuilder::new(&ctx);
    let builder = ObservableBuilder::new(
        &ctx,
        Tracking::ObservationAndPublisher,
        None,
        vec![publisher.hidden_field()],
    );
    let published = properties.publisher_tracked().collect();

    let fields = builder.fields();
    let constructor = builder.constructor();
    let accessors = builder.accessors();
    let publisher_accessor = publisher.accessor();
    let observable = builder.conformance();
    let publishable = publisher.conformance();
    let deref = builder.superclass_deref();
    let isolation_assertion = builder.isolation_assertion();
    let property_publisher = PropertyPublisherBuilder::new(&ctx, published).build();
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
            #publisher_accessor
            #accessors
        }

        #observable
        #publishable
        #deref
        #isolation_assertion
        #property_publisher
        #warnings
    })
}

#[cfg(test)]
mod tests {
    use quote::quote;

    use super::*;

    #[test]
    fn expands_both_channels() {
        let output = expand(
            quote!(),
            quote! {
                pub struct Person {
                    name: String,
                    age: u32,
                }
            },
        )
        .to_string();
        assert!(output.contains("pub struct PersonPropertyPublisher"));
        assert!(output.contains(&quote!(impl ::relay::Publishable for Person).to_string()));
        assert!(output.contains(&quote!(impl ::relay::Observable for Person).to_string()));
        assert!(output.contains(&quote!(type Registrar = ::relay::NativeObservationRegistrar;).to_string()));
        assert!(output.contains(&quote!(__publisher: ::std::sync::OnceLock<PersonPropertyPublisher>).to_string()));
        assert!(output.contains("fn set_name"));
    }

    #[test]
    fn cannot_be_combined_with_observable() {
        let output = expand(
            quote!(),
            quote! {
                #[observable]
                struct Person { name: String }
            },
        )
        .to_string();
        assert!(output.contains("#[relayed] cannot be combined with #[observable]"));
        assert!(output.contains("remove #[observable]"));
    }

    #[test]
    fn relayed_property_on_an_untracked_property_is_an_error() {
        let output = expand(
            quote!(),
            quote! {
                struct Person {
                    #[relayed_property]
                    #[relay(immutable)]
                    id: u64,
                }
            },
        )
        .to_string();
        assert!(output.contains("can only be applied to stored properties that are tracked"));
    }

    #[test]
    fn model_types_still_expand_with_a_warning() {
        let output = expand(
            quote!(),
            quote! {
                #[derive(Clone, Model)]
                pub struct Person {
                    name: String,
                }
            },
        )
        .to_string();
        assert!(output.contains("#[relayed] on a model type"));
        assert!(output.contains("deprecated"));
        assert!(output.contains(&quote!(#[derive(Clone, Model)]).to_string()));
        assert!(output.contains("pub struct PersonPropertyPublisher"));
        assert!(!output.contains("compile_error"));
    }

    #[test]
    fn rejects_enums() {
        let output = expand(quote!(), quote!(enum Person { A })).to_string();
        assert!(output.contains("can only be applied to a struct"));
    }

    #[test]
    fn impl_blocks_get_computed_publishers() {
        let output = expand(
            quote!(),
            quote! {
                impl Person {
                    pub fn full_name(&self) -> String {
                        format!("{} {}", self.name(), self.surname())
                    }
                }
            },
        )
        .to_string();
        assert!(output.contains(&quote!(impl PersonPropertyPublisher).to_string()));
        assert!(output.contains("computed_property_publisher"));
    }
}
