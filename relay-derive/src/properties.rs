//! Classification of a struct's fields and an impl block's methods into properties.

use proc_macro2::{Span, TokenStream, TokenTree};
use syn::spanned::Spanned;

use crate::attrs::{self, Channel, Markers, MemberOptions};
use crate::diagnostic::Diagnostic;
use crate::infer::infer_type;

/// Types that manage their own interior mutability and so cannot be tracked
const TYPE_SCOPED: &[&str] = &[
    "Storage", "Cell", "RefCell", "Mutex", "RwLock", "OnceCell", "OnceLock", "LazyLock", "LazyCell",
];

/// Method names which never denote a computed property
const RESERVED_METHODS: &[&str] = &["new", "publisher"];
const RESERVED_PREFIXES: &[&str] = &["set_", "modify_", "__"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PropertyKind {
    Stored,
    Computed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Mutability {
    Mutable,
    Immutable,
}

#[derive(Clone)]
pub(crate) struct Property {
    name: syn::Ident,
    kind: PropertyKind,
    mutability: Mutability,
    inferred_type: Option<syn::Type>,
    default: Option<syn::Expr>,
    vis: syn::Visibility,
    attrs: Vec<syn::Attribute>,
    markers: Markers,
    is_superclass: bool,
    is_override: bool,
    has_explicit_type_scope: bool,
    explicit_relayed_property: Option<Span>,
    span: Span,
}

impl Property {
    pub(crate) fn from_field(
        field: &syn::Field,
        superclass: Option<&syn::Ident>,
    ) -> syn::parse::Result<Option<Self>> {
        let Some(name) = field.ident.clone() else {
            return Ok(None);
        };
        let options = MemberOptions::from_attrs(&field.attrs)?;
        let declared_type = match &field.ty {
            syn::Type::Infer(_) => None,
            ty => Some(ty.clone()),
        };
        let inferred_type = declared_type
            .clone()
            .or_else(|| options.default().and_then(infer_type));
        let explicit_relayed_property = match attrs::find_attr(&field.attrs, "relayed_property") {
            Some(attr) => {
                attr.meta.require_path_only()?;
                Some(attr.span())
            }
            None => None,
        };
        Ok(Some(Property {
            is_superclass: superclass == Some(&name) || attrs::has_attr(&field.attrs, "superclass"),
            name,
            kind: PropertyKind::Stored,
            mutability: if options.immutable() {
                Mutability::Immutable
            } else {
                Mutability::Mutable
            },
            has_explicit_type_scope: declared_type.as_ref().is_some_and(is_type_scoped),
            inferred_type,
            default: options.default().cloned(),
            vis: field.vis.clone(),
            attrs: field.attrs.clone(),
            markers: Markers::from_attrs(&field.attrs),
            is_override: options.overrides(),
            explicit_relayed_property,
            span: field.span(),
        }))
    }

    /// A method which reads like a computed property: `&self` only, not generic, not async or
    /// unsafe, returning an owned value
    pub(crate) fn from_method(method: &syn::ImplItemFn) -> syn::parse::Result<Option<Self>> {
        if attrs::has_attr(&method.attrs, "memoized") {
            return Ok(None);
        }
        let sig = &method.sig;
        let name = sig.ident.to_string();
        if RESERVED_METHODS.contains(&name.as_str())
            || RESERVED_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
        {
            return Ok(None);
        }
        if !is_getter_signature(sig) {
            return Ok(None);
        }
        let syn::ReturnType::Type(_, ty) = &sig.output else {
            return Ok(None);
        };
        if !is_owned_value(ty) {
            return Ok(None);
        }
        let options = MemberOptions::for_method(&method.attrs)?;
        Ok(Some(Property {
            name: sig.ident.clone(),
            kind: PropertyKind::Computed,
            mutability: Mutability::Immutable,
            inferred_type: Some((**ty).clone()),
            default: None,
            vis: method.vis.clone(),
            attrs: method.attrs.clone(),
            markers: Markers::from_attrs(&method.attrs),
            is_superclass: false,
            is_override: options.overrides(),
            has_explicit_type_scope: false,
            explicit_relayed_property: None,
            span: sig.ident.span(),
        }))
    }

    pub(crate) fn name(&self) -> &syn::Ident {
        &self.name
    }

    pub(crate) fn kind(&self) -> PropertyKind {
        self.kind
    }

    /// The declared type, or the type inferred from the default
    pub(crate) fn inferred_type(&self) -> Option<&syn::Type> {
        self.inferred_type.as_ref()
    }

    pub(crate) fn default(&self) -> Option<&syn::Expr> {
        self.default.as_ref()
    }

    pub(crate) fn vis(&self) -> &syn::Visibility {
        &self.vis
    }

    pub(crate) fn attrs(&self) -> &[syn::Attribute] {
        &self.attrs
    }

    pub(crate) fn explicit_relayed_property(&self) -> Option<Span> {
        self.explicit_relayed_property
    }

    pub(crate) fn span(&self) -> Span {
        self.span
    }

    pub(crate) fn availability(&self) -> Vec<syn::Attribute> {
        attrs::availability(&self.attrs)
    }

    pub(crate) fn cfgs(&self) -> Vec<syn::Attribute> {
        attrs::cfgs(&self.attrs)
    }

    pub(crate) fn docs(&self) -> Vec<syn::Attribute> {
        attrs::docs(&self.attrs)
    }

    fn is_trackable_storage(&self) -> bool {
        self.kind == PropertyKind::Stored
            && self.mutability == Mutability::Mutable
            && !self.has_explicit_type_scope
            && !self.is_override
            && !self.is_superclass
    }

    pub(crate) fn is_stored_observation_tracked(&self) -> bool {
        self.is_trackable_storage() && !self.markers.excludes(Channel::Observation)
    }

    pub(crate) fn is_stored_publisher_tracked(&self) -> bool {
        self.is_trackable_storage() && !self.markers.excludes(Channel::Publisher)
    }

    pub(crate) fn is_computed_publisher_tracked(&self) -> bool {
        self.kind == PropertyKind::Computed
            && !self.is_override
            && !self.markers.excludes(Channel::Publisher)
    }

    pub(crate) fn deprecation_warnings(&self) -> Vec<Diagnostic> {
        self.markers.deprecation_warnings().collect()
    }
}

/// The properties of one declaration, in declaration order
#[derive(Clone, Default)]
pub(crate) struct PropertiesList {
    properties: Vec<Property>,
}

impl PropertiesList {
    pub(crate) fn from_fields(
        fields: &syn::FieldsNamed,
        superclass: Option<&syn::Ident>,
    ) -> syn::parse::Result<Self> {
        let mut properties = Vec::new();
        for field in &fields.named {
            if let Some(property) = Property::from_field(field, superclass)? {
                properties.push(property);
            }
        }
        Ok(PropertiesList { properties })
    }

    pub(crate) fn from_impl(item: &syn::ItemImpl) -> syn::parse::Result<Self> {
        let mut properties = Vec::new();
        for impl_item in &item.items {
            if let syn::ImplItem::Fn(method) = impl_item {
                if let Some(property) = Property::from_method(method)? {
                    properties.push(property);
                }
            }
        }
        Ok(PropertiesList { properties })
    }

    pub(crate) fn filter<'a, F>(&'a self, predicate: F) -> impl Iterator<Item = &'a Property> + 'a
    where
        F: Fn(&Property) -> bool + 'a,
    {
        self.properties.iter().filter(move |p| predicate(p))
    }

    pub(crate) fn stored(&self) -> impl Iterator<Item = &Property> {
        self.filter(|p| p.kind() == PropertyKind::Stored)
    }

    pub(crate) fn computed(&self) -> impl Iterator<Item = &Property> {
        self.filter(|p| p.kind() == PropertyKind::Computed)
    }

    pub(crate) fn observation_tracked(&self) -> impl Iterator<Item = &Property> {
        self.filter(Property::is_stored_observation_tracked)
    }

    pub(crate) fn publisher_tracked(&self) -> impl Iterator<Item = &Property> {
        self.filter(|p| p.is_stored_publisher_tracked() || p.is_computed_publisher_tracked())
    }

    pub(crate) fn find(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name() == name)
    }

    /// Whether any property was tracked by an observation-tracking macro already expanded on the
    /// same struct
    pub(crate) fn contains_expanded_observation(&self) -> bool {
        self.find("__observation_registrar").is_some()
    }

    /// The distinct inferred types of `properties`, in order of first appearance
    pub(crate) fn unique_types<'a>(
        properties: impl IntoIterator<Item = &'a Property>,
    ) -> Vec<&'a syn::Type> {
        let mut seen = Vec::<(String, &syn::Type)>::new();
        for property in properties {
            let Some(ty) = property.inferred_type() else {
                continue;
            };
            let key = type_key(ty);
            if !seen.iter().any(|(other, _)| *other == key) {
                seen.push((key, ty));
            }
        }
        seen.into_iter().map(|(_, ty)| ty).collect()
    }

    /// Errors for stored properties whose type is neither written nor inferable
    pub(crate) fn type_errors(&self) -> Vec<Diagnostic> {
        self.stored()
            .filter(|p| p.inferred_type().is_none())
            .map(|p| {
                Diagnostic::error(
                    p.span(),
                    format!("cannot infer the type of `{}`; add an explicit type", p.name()),
                )
            })
            .collect()
    }

    pub(crate) fn deprecation_warnings(&self) -> Vec<Diagnostic> {
        self.properties
            .iter()
            .flat_map(Property::deprecation_warnings)
            .collect()
    }
}

pub(crate) fn type_key(ty: &syn::Type) -> String {
    quote::ToTokens::to_token_stream(ty).to_string()
}

fn is_type_scoped(ty: &syn::Type) -> bool {
    let syn::Type::Path(path) = ty else {
        return false;
    };
    path.path.segments.last().is_some_and(|segment| {
        let name = segment.ident.to_string();
        TYPE_SCOPED.contains(&name.as_str()) || name.starts_with("Atomic")
    })
}

fn is_getter_signature(sig: &syn::Signature) -> bool {
    let by_ref = matches!(
        sig.receiver(),
        Some(receiver)
            if receiver.reference.is_some()
                && receiver.mutability.is_none()
                && receiver.colon_token.is_none()
    );
    by_ref
        && sig.inputs.len() == 1
        && sig.generics.params.is_empty()
        && sig.generics.where_clause.is_none()
        && sig.asyncness.is_none()
        && sig.unsafety.is_none()
        && sig.constness.is_none()
        && sig.abi.is_none()
        && sig.variadic.is_none()
}

/// Not a reference, not `()`, not `impl Trait`, and not borrowing anything
pub(crate) fn is_owned_value(ty: &syn::Type) -> bool {
    match ty {
        syn::Type::Reference(_) | syn::Type::ImplTrait(_) | syn::Type::Never(_) => false,
        syn::Type::Tuple(tuple) if tuple.elems.is_empty() => false,
        ty => !mentions_lifetime(quote::ToTokens::to_token_stream(ty)),
    }
}

fn mentions_lifetime(tokens: TokenStream) -> bool {
    tokens.into_iter().any(|token| match token {
        TokenTree::Punct(punct) => punct.as_char() == '\'',
        TokenTree::Group(group) => mentions_lifetime(group.stream()),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use quote::quote;

    use super::*;

    fn fields(tokens: TokenStream) -> PropertiesList {
        let fields: syn::FieldsNamed = syn::parse2(tokens).unwrap();
        PropertiesList::from_fields(&fields, None).unwrap()
    }

    fn names<'a>(properties: impl Iterator<Item = &'a Property>) -> Vec<String> {
        properties.map(|p| p.name().to_string()).collect()
    }

    #[test]
    fn stored_fields_are_tracked_unless_excluded() {
        let properties = fields(quote!({
            name: String,
            #[relay(immutable)]
            id: u64,
            #[publisher_ignored]
            draft: String,
            #[observation_suppressed]
            cache: Vec<u8>,
            counter: AtomicUsize,
            lock: Mutex<i32>,
            #[superclass]
            base: Arc<Animal>,
            #[relay(overrides)]
            label: String,
        }));
        assert_eq!(
            names(properties.filter(Property::is_stored_observation_tracked)),
            vec!["name", "draft"]
        );
        assert_eq!(
            names(properties.filter(Property::is_stored_publisher_tracked)),
            vec!["name", "cache"]
        );
    }

    #[test]
    fn types_are_inferred_from_defaults() {
        let properties = fields(quote!({
            #[relay(default = 0.5)]
            ratio: _,
            #[relay(default = compute())]
            opaque: _,
            missing: _,
        }));
        let ratio = properties.find("ratio").unwrap();
        assert_eq!(
            type_key(ratio.inferred_type().unwrap()),
            quote!(f64).to_string()
        );
        assert_eq!(properties.type_errors().len(), 2);
    }

    #[test]
    fn methods_that_read_like_getters_are_computed() {
        let item: syn::ItemImpl = syn::parse2(quote! {
            impl Person {
                fn full_name(&self) -> String { todo!() }
                fn greeting(&self, other: &str) -> String { todo!() }
                fn borrowed(&self) -> &str { todo!() }
                fn cow(&self) -> Cow<'_, str> { todo!() }
                fn nothing(&self) {}
                fn reset(&mut self) -> bool { todo!() }
                fn set_age(&self) -> u32 { todo!() }
                fn make() -> Self { todo!() }
                async fn fetch(&self) -> String { todo!() }
                fn generic<T>(&self) -> T { todo!() }
                #[memoized]
                fn calculate_area(&self) -> f64 { todo!() }
                #[publisher_ignored]
                fn hidden(&self) -> u8 { todo!() }
            }
        })
        .unwrap();
        let properties = PropertiesList::from_impl(&item).unwrap();
        assert_eq!(names(properties.computed()), vec!["full_name", "hidden"]);
        assert_eq!(
            names(properties.filter(Property::is_computed_publisher_tracked)),
            vec!["full_name"]
        );
    }

    #[test]
    fn unique_types_keep_first_appearance() {
        let properties = fields(quote!({ a: i32, b: String, c: i32, d: Option<i32> }));
        let types = PropertiesList::unique_types(properties.stored())
            .into_iter()
            .map(type_key)
            .collect::<Vec<_>>();
        assert_eq!(
            types,
            vec![
                quote!(i32).to_string(),
                quote!(String).to_string(),
                quote!(Option<i32>).to_string()
            ]
        );
    }
}
