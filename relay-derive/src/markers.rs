//! The opt-out markers as attribute macros.
//!
//! On fields and on methods of an annotated impl block the markers are read and consumed by the
//! enclosing class-level macro. These macros cover the remaining places: they leave the item
//! unchanged, except that a marker written above `#[memoized]` is moved below it so the memoized
//! expansion still sees it.

use proc_macro2::TokenStream;
use quote::{format_ident, quote, ToTokens};

use crate::memoized::is_memoized;

pub fn marker(
    name: &'static str,
    args: proc_macro::TokenStream,
    input: proc_macro::TokenStream,
) -> proc_macro::TokenStream {
    proc_macro::TokenStream::from(expand(name, args.into(), input.into()))
}

fn expand(name: &'static str, args: TokenStream, input: TokenStream) -> TokenStream {
    if !args.is_empty() {
        let message = format!("#[{}] takes no arguments", name);
        let error = syn::Error::new_spanned(&args, message).to_compile_error();
        return quote!(#error #input);
    }
    let Ok(mut method) = syn::parse2::<syn::ImplItemFn>(input.clone()) else {
        return input;
    };
    let Some(index) = method.attrs.iter().position(is_memoized) else {
        return input;
    };
    let memoized = method.attrs.remove(index);
    let marker = format_ident!("{}", name);
    method.attrs.insert(0, memoized);
    method.attrs.push(syn::parse_quote!(#[::relay::#marker]));
    method.into_token_stream()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn leaves_plain_items_unchanged() {
        let input = quote!(fn full_name(&self) -> String { String::new() });
        assert_eq!(
            expand("publisher_ignored", quote!(), input.clone()).to_string(),
            input.to_string()
        );
    }

    #[test]
    fn moves_below_memoized() {
        let output = expand(
            "observation_ignored",
            quote!(),
            quote! {
                #[memoized]
                #[inline]
                fn calculate_area(&self) -> f64 { 0.0 }
            },
        );
        assert_eq!(
            output.to_string(),
            quote! {
                #[memoized]
                #[inline]
                #[::relay::observation_ignored]
                fn calculate_area(&self) -> f64 { 0.0 }
            }
            .to_string()
        );
    }

    #[test]
    fn rejects_arguments() {
        let output = expand("publisher_ignored", quote!(always), quote!(fn f() {})).to_string();
        assert!(output.contains("takes no arguments"));
    }
}
