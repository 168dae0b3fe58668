//! Inferring a field's type from its default expression.
//!
//! A field declared with type `_` and a `#[relay(default = ..)]` gets the type of the default.
//! Only expressions whose type is evident from their syntax are handled. Anything else yields
//! `None` and the caller reports that the type must be written out.

use syn::parse_quote;
use syn::punctuated::Punctuated;

/// Types whose `::new(x)` wraps `x`
const WRAPPERS: &[&str] = &["Box", "Arc", "Rc", "Cell", "RefCell", "Mutex", "RwLock"];

/// Generic containers whose type cannot be read off `Container::new()` without a turbofish
const GENERIC_CONTAINERS: &[&str] = &[
    "Vec",
    "VecDeque",
    "HashMap",
    "HashSet",
    "BTreeMap",
    "BTreeSet",
    "BinaryHeap",
    "LinkedList",
    "Option",
    "Result",
    "Box",
    "Arc",
    "Rc",
    "Weak",
    "Cell",
    "RefCell",
    "Mutex",
    "RwLock",
    "PhantomData",
];

/// Paths that look like types but are variants of prelude enums or traits
const NOT_TYPES: &[&str] = &[
    "Self", "Some", "None", "Ok", "Err", "Default", "From", "Into", "TryFrom", "TryInto",
];

const PRIMITIVES: &[&str] = &[
    "i8", "i16", "i32", "i64", "i128", "isize", "u8", "u16", "u32", "u64", "u128", "usize", "f32",
    "f64", "bool", "char",
];

pub(crate) fn infer_type(expr: &syn::Expr) -> Option<syn::Type> {
    match expr {
        syn::Expr::Cast(cast) => Some((*cast.ty).clone()),
        syn::Expr::Lit(lit) => infer_lit(&lit.lit),
        syn::Expr::Unary(syn::ExprUnary {
            op: syn::UnOp::Neg(_),
            expr,
            ..
        }) => match &**expr {
            syn::Expr::Lit(lit) => infer_lit(&lit.lit),
            _ => None,
        },
        syn::Expr::Paren(paren) => infer_type(&paren.expr),
        syn::Expr::Group(group) => infer_type(&group.expr),
        syn::Expr::MethodCall(call) => infer_method_call(call),
        syn::Expr::Macro(mac) => infer_macro(&mac.mac),
        syn::Expr::Call(call) => infer_call(call),
        syn::Expr::Path(path) if path.qself.is_none() => infer_path(&path.path),
        syn::Expr::Struct(lit) if lit.qself.is_none() => type_of_constructor(&lit.path),
        syn::Expr::Array(array) => {
            let first = array.elems.first()?;
            let elem = infer_type(first)?;
            let len = array.elems.len();
            Some(parse_quote!([#elem; #len]))
        }
        syn::Expr::Repeat(repeat) => {
            let elem = infer_type(&repeat.expr)?;
            let len = &repeat.len;
            Some(parse_quote!([#elem; #len]))
        }
        syn::Expr::Tuple(tuple) => {
            let elems = tuple
                .elems
                .iter()
                .map(infer_type)
                .collect::<Option<Punctuated<syn::Type, syn::Token![,]>>>()?;
            if elems.len() == 1 {
                let only = &elems[0];
                Some(parse_quote!((#only,)))
            } else {
                Some(parse_quote!((#elems)))
            }
        }
        _ => None,
    }
}

fn infer_lit(lit: &syn::Lit) -> Option<syn::Type> {
    match lit {
        syn::Lit::Int(int) => match int.suffix() {
            "" => Some(parse_quote!(i32)),
            suffix => syn::parse_str(suffix).ok(),
        },
        syn::Lit::Float(float) => match float.suffix() {
            "" => Some(parse_quote!(f64)),
            suffix => syn::parse_str(suffix).ok(),
        },
        syn::Lit::Bool(_) => Some(parse_quote!(bool)),
        syn::Lit::Char(_) => Some(parse_quote!(char)),
        syn::Lit::Byte(_) => Some(parse_quote!(u8)),
        syn::Lit::Str(_) => Some(parse_quote!(&'static str)),
        syn::Lit::ByteStr(bytes) => {
            let len = bytes.value().len();
            Some(parse_quote!(&'static [u8; #len]))
        }
        _ => None,
    }
}

fn infer_method_call(call: &syn::ExprMethodCall) -> Option<syn::Type> {
    let method = call.method.to_string();
    let receiver_is_str = matches!(
        &*call.receiver,
        syn::Expr::Lit(syn::ExprLit {
            lit: syn::Lit::Str(_),
            ..
        })
    );
    if receiver_is_str && call.args.is_empty() && (method == "to_string" || method == "to_owned") {
        return Some(parse_quote!(String));
    }
    None
}

fn infer_macro(mac: &syn::Macro) -> Option<syn::Type> {
    let name = mac.path.segments.last()?.ident.to_string();
    match name.as_str() {
        "format" => Some(parse_quote!(String)),
        "vec" => {
            if let Ok(repeat) = mac.parse_body::<VecRepeat>() {
                let elem = infer_type(&repeat.elem)?;
                return Some(parse_quote!(::std::vec::Vec<#elem>));
            }
            let elems = mac
                .parse_body_with(Punctuated::<syn::Expr, syn::Token![,]>::parse_terminated)
                .ok()?;
            let elem = infer_type(elems.first()?)?;
            Some(parse_quote!(::std::vec::Vec<#elem>))
        }
        _ => None,
    }
}

/// `vec![elem; len]`
struct VecRepeat {
    elem: syn::Expr,
}

impl syn::parse::Parse for VecRepeat {
    fn parse(input: syn::parse::ParseStream) -> syn::parse::Result<Self> {
        let elem = input.parse()?;
        input.parse::<syn::Token![;]>()?;
        let _len: syn::Expr = input.parse()?;
        Ok(VecRepeat { elem })
    }
}

fn infer_call(call: &syn::ExprCall) -> Option<syn::Type> {
    let syn::Expr::Path(func) = &*call.func else {
        return None;
    };
    if func.qself.is_some() {
        return None;
    }
    let path = &func.path;
    let last = path.segments.last()?;

    if path.segments.len() == 1 && last.ident == "Some" && call.args.len() == 1 {
        let inner = infer_type(call.args.first()?)?;
        return Some(parse_quote!(::std::option::Option<#inner>));
    }

    // Tuple structs and tuple variants
    if is_upper_camel(&last.ident) {
        return type_of_constructor(path);
    }

    // `Type::function(..)`
    let type_segments = path.segments.len().checked_sub(1)?;
    if type_segments == 0 {
        return None;
    }
    let ty = &path.segments[type_segments - 1];
    let ty_name = ty.ident.to_string();
    if WRAPPERS.contains(&ty_name.as_str())
        && last.ident == "new"
        && call.args.len() == 1
        && ty.arguments.is_none()
    {
        let inner = infer_type(call.args.first()?)?;
        let wrapper = prefix_path(path, type_segments);
        return Some(parse_quote!(#wrapper<#inner>));
    }
    associated_type(path, type_segments)
}

fn infer_path(path: &syn::Path) -> Option<syn::Type> {
    let last = path.segments.last()?;
    if path.segments.len() >= 2 {
        let ty = &path.segments[path.segments.len() - 2];
        // `f64::MAX`, `u8::MIN`
        if PRIMITIVES.contains(&ty.ident.to_string().as_str()) && is_screaming(&last.ident) {
            let ty = &ty.ident;
            return Some(parse_quote!(#ty));
        }
    }
    if is_upper_camel(&last.ident) {
        return type_of_constructor(path);
    }
    None
}

/// The type built by a constructor path: `Point`, `geometry::Point`, `Shape::Square`
fn type_of_constructor(path: &syn::Path) -> Option<syn::Type> {
    let len = path.segments.len();
    let last = path.segments.last()?;
    if is_not_a_type(&last.ident) || !is_upper_camel(&last.ident) {
        return None;
    }
    let parent_is_type = len >= 2 && is_upper_camel(&path.segments[len - 2].ident);
    if parent_is_type {
        associated_type(path, len - 1)
    } else {
        let ty = prefix_path(path, len);
        Some(parse_quote!(#ty))
    }
}

/// The type named by the first `type_segments` segments of `path`, if it can stand on its own
fn associated_type(path: &syn::Path, type_segments: usize) -> Option<syn::Type> {
    let ty = &path.segments[type_segments - 1];
    let ty_name = ty.ident.to_string();
    if is_not_a_type(&ty.ident) || !is_upper_camel(&ty.ident) {
        return None;
    }
    if GENERIC_CONTAINERS.contains(&ty_name.as_str()) && ty.arguments.is_none() {
        return None;
    }
    let ty = prefix_path(path, type_segments);
    Some(parse_quote!(#ty))
}

/// The first `len` segments of `path`, with turbofish arguments turned into type arguments
fn prefix_path(path: &syn::Path, len: usize) -> syn::Path {
    let segments = path
        .segments
        .iter()
        .take(len)
        .cloned()
        .map(|mut segment| {
            if let syn::PathArguments::AngleBracketed(args) = &mut segment.arguments {
                args.colon2_token = None;
            }
            segment
        })
        .collect();
    syn::Path {
        leading_colon: path.leading_colon,
        segments,
    }
}

fn is_not_a_type(ident: &syn::Ident) -> bool {
    NOT_TYPES.contains(&ident.to_string().as_str())
}

fn is_upper_camel(ident: &syn::Ident) -> bool {
    let name = ident.to_string();
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_uppercase()) && name.chars().any(|c| c.is_lowercase())
}

fn is_screaming(ident: &syn::Ident) -> bool {
    let name = ident.to_string();
    !name.is_empty() && name.chars().all(|c| c.is_ascii_uppercase() || c == '_' || c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use quote::{quote, ToTokens};

    fn inferred(expr: proc_macro2::TokenStream) -> Option<String> {
        let expr: syn::Expr = syn::parse2(expr).unwrap();
        infer_type(&expr).map(|ty| ty.to_token_stream().to_string())
    }

    fn ty(tokens: proc_macro2::TokenStream) -> Option<String> {
        Some(tokens.to_string())
    }

    #[test]
    fn literals() {
        assert_eq!(inferred(quote!(42)), ty(quote!(i32)));
        assert_eq!(inferred(quote!(42u64)), ty(quote!(u64)));
        assert_eq!(inferred(quote!(-1.5)), ty(quote!(f64)));
        assert_eq!(inferred(quote!(2.0f32)), ty(quote!(f32)));
        assert_eq!(inferred(quote!(true)), ty(quote!(bool)));
        assert_eq!(inferred(quote!('x')), ty(quote!(char)));
        assert_eq!(inferred(quote!(b'x')), ty(quote!(u8)));
        assert_eq!(inferred(quote!("name")), ty(quote!(&'static str)));
    }

    #[test]
    fn casts_win() {
        assert_eq!(inferred(quote!(compute() as u16)), ty(quote!(u16)));
    }

    #[test]
    fn strings() {
        assert_eq!(inferred(quote!("a".to_string())), ty(quote!(String)));
        assert_eq!(inferred(quote!("a".to_owned())), ty(quote!(String)));
        assert_eq!(inferred(quote!(String::new())), ty(quote!(String)));
        assert_eq!(inferred(quote!(String::from("a"))), ty(quote!(String)));
        assert_eq!(inferred(quote!(format!("{}", 1))), ty(quote!(String)));
    }

    #[test]
    fn wrappers_and_options() {
        assert_eq!(
            inferred(quote!(Some(1))),
            ty(quote!(::std::option::Option<i32>))
        );
        assert_eq!(inferred(quote!(Arc::new(1.0))), ty(quote!(Arc<f64>)));
        assert_eq!(
            inferred(quote!(std::sync::Mutex::new(false))),
            ty(quote!(std::sync::Mutex<bool>))
        );
        assert_eq!(inferred(quote!(None)), None);
    }

    #[test]
    fn constructors_and_variants() {
        assert_eq!(inferred(quote!(Point { x: 1, y: 2 })), ty(quote!(Point)));
        assert_eq!(inferred(quote!(Point(1, 2))), ty(quote!(Point)));
        assert_eq!(inferred(quote!(geometry::Point::origin())), ty(quote!(geometry::Point)));
        assert_eq!(inferred(quote!(Shape::Circle(1.0))), ty(quote!(Shape)));
        assert_eq!(inferred(quote!(Direction::North)), ty(quote!(Direction)));
        assert_eq!(inferred(quote!(Shape::Square { side: 1 })), ty(quote!(Shape)));
        assert_eq!(inferred(quote!(f64::MAX)), ty(quote!(f64)));
    }

    #[test]
    fn collections() {
        assert_eq!(
            inferred(quote!(vec![1, 2, 3])),
            ty(quote!(::std::vec::Vec<i32>))
        );
        assert_eq!(
            inferred(quote!(vec![0u8; 4])),
            ty(quote!(::std::vec::Vec<u8>))
        );
        assert_eq!(inferred(quote!(vec![])), None);
        assert_eq!(inferred(quote!(Vec::new())), None);
        assert_eq!(inferred(quote!(Vec::<i32>::new())), ty(quote!(Vec<i32>)));
        assert_eq!(inferred(quote!([1, 2])), ty(quote!([i32; 2usize])));
        assert_eq!(inferred(quote!((1, "a"))), ty(quote!((i32, &'static str))));
    }

    #[test]
    fn opaque_expressions_are_not_inferred() {
        assert_eq!(inferred(quote!(compute())), None);
        assert_eq!(inferred(quote!(Default::default())), None);
        assert_eq!(inferred(quote!(Self::new())), None);
        assert_eq!(inferred(quote!(x + 1)), None);
        assert_eq!(inferred(quote!(MAX)), None);
    }
}
