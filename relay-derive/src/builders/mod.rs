//! Builders for each generated artifact.
//!
//! Builders are pure functions of a [`Context`]; they never call each other. Entry points decide
//! which builders run and in which order.

use proc_macro2::{Ident, TokenStream, TokenTree};
use quote::format_ident;

use crate::isolation::GlobalActorIsolation;
use crate::properties::PropertiesList;
use crate::superclass::Superclass;

pub(crate) mod memoized;
pub(crate) mod observable;
pub(crate) mod property_publisher;
pub(crate) mod publisher;
pub(crate) mod registrar;
pub(crate) mod relayed_property;

/// Everything the builders know about the class being expanded
pub(crate) struct Context<'a> {
    pub(crate) ident: &'a Ident,
    pub(crate) vis: &'a syn::Visibility,
    pub(crate) properties: &'a PropertiesList,
    pub(crate) isolation: &'a GlobalActorIsolation,
    pub(crate) superclass: Option<&'a Superclass>,
}

impl<'a> Context<'a> {
    pub(crate) fn publisher_ident(&self) -> Ident {
        publisher_ident(self.ident)
    }

    pub(crate) fn registrar_ident(&self) -> Ident {
        format_ident!("{}ObservationRegistrar", self.ident)
    }
}

pub(crate) fn publisher_ident(class: &Ident) -> Ident {
    format_ident!("{}PropertyPublisher", class)
}

/// `snake_case` for an `UpperCamelCase` identifier
pub(crate) fn snake_case(name: &str) -> String {
    let mut result = String::with_capacity(name.len() + 4);
    let chars: Vec<char> = name.chars().collect();
    for (i, c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let after_lower = i > 0 && (chars[i - 1].is_lowercase() || chars[i - 1].is_ascii_digit());
            let before_lower = i > 0
                && chars[i - 1].is_uppercase()
                && chars.get(i + 1).is_some_and(|next| next.is_lowercase());
            if after_lower || before_lower {
                result.push('_');
            }
            result.extend(c.to_lowercase());
        } else {
            result.push(*c);
        }
    }
    result
}

/// Replace `Self` in a type written inside the class's impl block, so the type can be used in
/// the companion publisher's impl
pub(crate) fn replace_self(tokens: TokenStream, class: &Ident) -> TokenStream {
    tokens
        .into_iter()
        .map(|token| match token {
            TokenTree::Ident(ident) if ident == "Self" => {
                TokenTree::Ident(Ident::new(&class.to_string(), ident.span()))
            }
            TokenTree::Group(group) => {
                let mut replaced =
                    proc_macro2::Group::new(group.delimiter(), replace_self(group.stream(), class));
                replaced.set_span(group.span());
                TokenTree::Group(replaced)
            }
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snake_case_names() {
        assert_eq!(snake_case("Person"), "person");
        assert_eq!(snake_case("ShoppingCart"), "shopping_cart");
        assert_eq!(snake_case("HTTPClient"), "http_client");
        assert_eq!(snake_case("Vector3D"), "vector3_d");
    }

    #[test]
    fn self_is_replaced_everywhere() {
        let class = format_ident!("Node");
        let replaced = replace_self(quote::quote!(Option<Vec<Self>>), &class);
        assert_eq!(replaced.to_string(), quote::quote!(Option<Vec<Node>>).to_string());
    }
}
