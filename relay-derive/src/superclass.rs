//! Resolution of the "superclass" link.
//!
//! Rust has no class inheritance, so a subclass embeds its base as an `Arc<Base>` field and
//! derefs to it. The field is either marked `#[superclass]` or, failing that, guessed from its
//! name and type.

use proc_macro2::{Span, TokenStream};
use quote::quote;
use syn::spanned::Spanned;

use crate::attrs::has_attr;
use crate::diagnostic::Diagnostic;

const CANDIDATE_NAMES: &[&str] = &["base", "superclass", "parent"];

#[derive(Clone, Debug)]
pub(crate) struct Superclass {
    field: syn::Ident,
    base: syn::TypePath,
    inferred: bool,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum SuperclassError {
    #[error("the #[superclass] field must have type Arc<Base>")]
    NotAnArc(Span),
    #[error("only one field can be marked #[superclass]")]
    Duplicate(Span),
    #[error("has_superclass = true, but no superclass field was found")]
    Missing(Span),
}

impl SuperclassError {
    fn span(&self) -> Span {
        match self {
            Self::NotAnArc(span) | Self::Duplicate(span) | Self::Missing(span) => *span,
        }
    }
}

impl From<SuperclassError> for Diagnostic {
    fn from(e: SuperclassError) -> Self {
        let fix_it = matches!(e, SuperclassError::Missing(_))
            .then_some("mark the field with #[superclass]");
        let diagnostic = Diagnostic::error(e.span(), e.to_string());
        match fix_it {
            Some(fix_it) => diagnostic.with_fix_it(fix_it),
            None => diagnostic,
        }
    }
}

impl Superclass {
    /// The field holding the base object
    pub(crate) fn field(&self) -> &syn::Ident {
        &self.field
    }

    pub(crate) fn base(&self) -> &syn::TypePath {
        &self.base
    }

    pub(crate) fn is_inferred(&self) -> bool {
        self.inferred
    }

    /// The base's companion publisher, in the same module as the base
    pub(crate) fn base_publisher(&self) -> TokenStream {
        let mut path = self.base.path.clone();
        if let Some(last) = path.segments.last_mut() {
            last.ident = quote::format_ident!("{}PropertyPublisher", last.ident);
            last.arguments = syn::PathArguments::None;
        }
        quote!(#path)
    }

    /// The field explicitly marked `#[superclass]`, if any
    pub(crate) fn marked(fields: &syn::FieldsNamed) -> Result<Option<Self>, SuperclassError> {
        let mut result: Option<Self> = None;
        for field in &fields.named {
            if !has_attr(&field.attrs, "superclass") {
                continue;
            }
            if result.is_some() {
                return Err(SuperclassError::Duplicate(field.span()));
            }
            let base = arc_inner(&field.ty).ok_or(SuperclassError::NotAnArc(field.ty.span()))?;
            let Some(ident) = field.ident.clone() else {
                continue;
            };
            result = Some(Superclass {
                field: ident,
                base,
                inferred: false,
            });
        }
        Ok(result)
    }

    /// A field that looks like a superclass link: one of the conventional names, holding an
    /// `Arc` of a named type
    pub(crate) fn candidate(fields: &syn::FieldsNamed) -> Option<Self> {
        fields.named.iter().find_map(|field| {
            let ident = field.ident.as_ref()?;
            if !CANDIDATE_NAMES.contains(&ident.to_string().as_str()) {
                return None;
            }
            let base = arc_inner(&field.ty)?;
            let starts_upper = base
                .path
                .segments
                .last()
                .and_then(|segment| segment.ident.to_string().chars().next())
                .is_some_and(|c| c.is_ascii_uppercase());
            starts_upper.then(|| Superclass {
                field: ident.clone(),
                base,
                inferred: true,
            })
        })
    }

    /// Decide whether the class has a superclass.
    ///
    /// `has_superclass = false` masks any link. `true` requires one. When the parameter is absent
    /// a marked field is trusted and a candidate is used with a warning.
    pub(crate) fn resolve(
        fields: &syn::FieldsNamed,
        has_superclass: Option<bool>,
        span: Span,
    ) -> Result<(Option<Self>, Option<Diagnostic>), SuperclassError> {
        let marked = Self::marked(fields)?;
        let superclass = match has_superclass {
            Some(false) => None,
            Some(true) => Some(
                marked
                    .or_else(|| Self::candidate(fields).map(|c| Superclass { inferred: false, ..c }))
                    .ok_or(SuperclassError::Missing(span))?,
            ),
            None => marked.or_else(|| Self::candidate(fields)),
        };
        let warning = superclass
            .as_ref()
            .filter(|superclass| superclass.is_inferred())
            .map(|candidate| {
                Diagnostic::warning(
                    candidate.field.span(),
                    format!(
                        "superclass inferred from field `{}`; verify or pass `has_superclass`",
                        candidate.field
                    ),
                )
                .with_fix_it("mark the field with #[superclass]")
            });
        Ok((superclass, warning))
    }
}

/// `T` for a type spelled `Arc<T>` (or `std::sync::Arc<T>`)
pub(crate) fn arc_inner(ty: &syn::Type) -> Option<syn::TypePath> {
    let syn::Type::Path(path) = ty else {
        return None;
    };
    let last = path.path.segments.last()?;
    if last.ident != "Arc" {
        return None;
    }
    let syn::PathArguments::AngleBracketed(args) = &last.arguments else {
        return None;
    };
    if args.args.len() != 1 {
        return None;
    }
    match args.args.first()? {
        syn::GenericArgument::Type(syn::Type::Path(inner)) => Some(inner.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(tokens: TokenStream) -> syn::FieldsNamed {
        syn::parse2(tokens).unwrap()
    }

    #[test]
    fn marked_field_is_trusted() {
        let fields = fields(quote!({
            #[superclass]
            animal: Arc<crate::zoo::Animal>,
            name: String,
        }));
        let (superclass, warning) = Superclass::resolve(&fields, None, Span::call_site()).unwrap();
        let superclass = superclass.unwrap();
        assert!(warning.is_none());
        assert_eq!(superclass.field().to_string(), "animal");
        assert_eq!(
            superclass.base_publisher().to_string(),
            quote!(crate::zoo::AnimalPropertyPublisher).to_string()
        );
    }

    #[test]
    fn candidate_is_used_with_a_warning() {
        let fields = fields(quote!({ base: Arc<Animal>, name: String }));
        let (superclass, warning) = Superclass::resolve(&fields, None, Span::call_site()).unwrap();
        assert!(superclass.unwrap().is_inferred());
        assert!(warning.is_some());
    }

    #[test]
    fn has_superclass_masks_or_requires() {
        let with_base = fields(quote!({ base: Arc<Animal> }));
        let (masked, _) =
            Superclass::resolve(&with_base, Some(false), Span::call_site()).unwrap();
        assert!(masked.is_none());

        let (required, warning) =
            Superclass::resolve(&with_base, Some(true), Span::call_site()).unwrap();
        assert!(required.is_some() && warning.is_none());

        let without = fields(quote!({ name: String }));
        assert!(matches!(
            Superclass::resolve(&without, Some(true), Span::call_site()),
            Err(SuperclassError::Missing(_))
        ));
    }

    #[test]
    fn lowercase_and_non_arc_fields_are_not_candidates() {
        assert!(Superclass::candidate(&fields(quote!({ parent: Arc<str> }))).is_none());
        assert!(Superclass::candidate(&fields(quote!({ parent: Box<Animal> }))).is_none());
        assert!(matches!(
            Superclass::marked(&fields(quote!({ #[superclass] parent: Box<Animal> }))),
            Err(SuperclassError::NotAnArc(_))
        ));
    }
}
