//! `#[publishable]`: a companion property publisher for a struct that `#[observable]` expands.
//!
//! The struct's layout is left to `#[observable]`. This macro only injects the hidden publisher
//! field and rewrites the observable attribute so that every observed write is also published,
//! through the generated `{T}ObservationRegistrar`.

use proc_macro2::TokenStream;
use quote::quote;
use syn::spanned::Spanned;

use crate::attrs::{attr_name, Accepts, ClassParameters};
use crate::builders::property_publisher::PropertyPublisherBuilder;
use crate::builders::publisher::PublisherBuilder;
use crate::builders::registrar::RegistrarBuilder;
use crate::builders::Context;
use crate::class::{self, Target};
use crate::diagnostic::{Diagnostic, Diagnostics};
use crate::isolation::GlobalActorIsolation;
use crate::properties::PropertiesList;
use crate::superclass::Superclass;

const NAME: &str = "publishable";

pub fn publishable(
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
    class::reject_combined(&item.attrs, NAME, &["relayed"])?;
    let params = ClassParameters::parse(
        args,
        Accepts {
            has_superclass: true,
            registrar: false,
        },
    )?;

    let span = item.ident.span();
    let fields = class::named_fields(&mut item, NAME)?;
    if PropertiesList::from_fields(fields, None)?.contains_expanded_observation() {
        return Err(Diagnostic::error(span, "#[publishable] must be placed above #[observable]")
            .with_fix_it("move #[publishable] above #[observable]")
            .into());
    }
    let Some(observable_index) = item
        .attrs
        .iter()
        .position(|attr| attr_name(attr).as_deref() == Some("observable"))
    else {
        return Err(Diagnostic::error(span, "#[publishable] requires #[observable]")
            .with_fix_it("add #[observable] below #[publishable]")
            .into());
    };

    let mut diagnostics = Diagnostics::new();
    diagnostics.extend(class::model_warning(&item, NAME));

    let observable_params = observable_parameters(&item.attrs[observable_index])?;
    let explicit = params
        .isolation
        .as_ref()
        .or(observable_params.isolation.as_ref());
    let isolation = GlobalActorIsolation::resolve(explicit, &item.attrs)?;

    let fields = class::named_fields(&mut item, NAME)?;
    let (superclass, warning) =
        Superclass::resolve(fields, params.has_superclass, span).map_err(Diagnostic::from)?;
    diagnostics.extend(warning);
    mark_superclass(fields, superclass.as_ref());
    let properties =
        PropertiesList::from_fields(fields, superclass.as_ref().map(Superclass::field))?;

    let ident = item.ident.clone();
    let vis = item.vis.clone();
    let ctx = Context {
        ident: &ident,
        vis: &vis,
        properties: &properties,
        isolation: &isolation,
        superclass: superclass.as_ref(),
    };
    let publisher = PublisherBuilder::new(&ctx);
    let published = properties
        .observation_tracked()
        .filter(|property| property.is_stored_publisher_tracked())
        .collect::<Vec<_>>();
    let property_publisher = PropertyPublisherBuilder::new(&ctx, published.clone()).build();
    let registrar = RegistrarBuilder::new(&ctx, published).build();

    let registrar_ident = ctx.registrar_ident();
    let mut extra = vec![quote!(registrar = #registrar_ident)];
    if observable_params.isolation.is_none() {
        extra.extend(params.isolation.as_ref().map(GlobalActorIsolation::to_parameter));
    }
    item.attrs[observable_index] = with_parameters(&item.attrs[observable_index], extra);
    class::named_fields(&mut item, NAME)?
        .named
        .push(publisher.injected_field()?);

    let accessor = publisher.accessor();
    let conformance = publisher.conformance();
    let warnings = diagnostics.to_tokens();
    Ok(quote! {
        #item

        impl #ident {
            #accessor
        }

        #conformance
        #property_publisher
        #registrar
        #warnings
    })
}

/// The parameters already written on the `#[observable]` attribute
fn observable_parameters(attr: &syn::Attribute) -> syn::parse::Result<ClassParameters> {
    let accepts = Accepts {
        has_superclass: false,
        registrar: true,
    };
    match &attr.meta {
        syn::Meta::Path(_) => Ok(ClassParameters::default()),
        syn::Meta::List(list) => {
            let params = ClassParameters::parse(list.tokens.clone(), accepts)?;
            if let Some(registrar) = &params.registrar {
                return Err(syn::Error::new(
                    registrar.span(),
                    "#[publishable] provides the registrar of #[observable]",
                ));
            }
            Ok(params)
        }
        syn::Meta::NameValue(name_value) => Err(syn::Error::new(
            name_value.span(),
            "expected #[observable] or #[observable(..)]",
        )),
    }
}

/// `attr` with `extra` appended to its parameter list
fn with_parameters(attr: &syn::Attribute, extra: Vec<TokenStream>) -> syn::Attribute {
    let path = attr.path();
    let existing = match &attr.meta {
        syn::Meta::List(list) if !list.tokens.is_empty() => Some(list.tokens.clone()),
        _ => None,
    };
    let params = existing.into_iter().chain(extra);
    syn::parse_quote!(#[#path(#(#params),*)])
}

/// `#[observable]` honors only marked superclass fields, so the resolved link is marked and any
/// other marking is dropped
fn mark_superclass(fields: &mut syn::FieldsNamed, superclass: Option<&Superclass>) {
    for field in fields.named.iter_mut() {
        field
            .attrs
            .retain(|attr| attr_name(attr).as_deref() != Some("superclass"));
        let is_link =
            superclass.is_some_and(|superclass| field.ident.as_ref() == Some(superclass.field()));
        if is_link {
            field.attrs.push(syn::parse_quote!(#[superclass]));
        }
    }
}
