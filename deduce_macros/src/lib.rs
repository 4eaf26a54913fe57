//! Procedural macros for **deduce-rs**
#![forbid(unsafe_code)]

use proc_macro::TokenStream;
use proc_macro2::{Ident, Span};
use proc_macro_crate::{FoundCrate, crate_name};
use proc_macro_error::{abort, proc_macro_error};
use quote::quote;
use syn::{
    Attribute, Expr, ExprLit, FnArg, GenericArgument, ItemFn, Lit, LitStr, Meta, Pat, PatIdent,
    PatType, PathArguments, Type, TypePath, parse_macro_input,
};

// ============================================================================
// HELPERS
// ============================================================================

fn get_crate_path() -> proc_macro2::TokenStream {
    let found = crate_name("deduce_core").or_else(|_| crate_name("deduce-rs"));
    match found {
        Ok(FoundCrate::Itself) => quote!(crate),
        Ok(FoundCrate::Name(name)) => {
            let ident = Ident::new(&name, Span::call_site());
            quote!(::#ident)
        }
        Err(_) => quote!(::deduce_core),
    }
}

/// `T` for `Option<T>`, `std::option::Option<T>` and `core::option::Option<T>`.
fn option_inner(ty: &Type) -> Option<&Type> {
    let Type::Path(TypePath { qself: None, path }) = ty else {
        return None;
    };

    let idents: Vec<_> = path.segments.iter().map(|s| &s.ident).collect();
    let is_option = match idents.as_slice() {
        [ident] => *ident == "Option",
        [first, second, ident] => {
            (*first == "std" || *first == "core") && *second == "option" && *ident == "Option"
        }
        _ => false,
    };
    if !is_option {
        return None;
    }

    let PathArguments::AngleBracketed(args) = &path.segments.last()?.arguments else {
        return None;
    };
    match args.args.first()? {
        GenericArgument::Type(inner) if args.args.len() == 1 => Some(inner),
        _ => None,
    }
}

/// Gather `///` doc-comments into a single string, trimming the leading space after `///`.
fn docs(attrs: &[Attribute]) -> String {
    attrs
        .iter()
        .filter_map(|a| match &a.meta {
            Meta::NameValue(nv) if a.path().is_ident("doc") => {
                if let Expr::Lit(ExprLit {
                    lit: Lit::Str(s), ..
                }) = &nv.value
                {
                    Some(s.value().trim_start().to_owned())
                } else {
                    None
                }
            }
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Options of a `#[convert(...)]` parameter attribute.
#[derive(Default)]
struct ConvertAttr {
    alias: Option<LitStr>,
    with: Option<Expr>,
    skip: bool,
    default: Option<Expr>,
}

impl ConvertAttr {
    /// Parses and removes every `#[convert(...)]` in `attrs`.
    fn take(attrs: &mut Vec<Attribute>) -> syn::Result<Self> {
        let mut conf = ConvertAttr::default();
        let mut result = Ok(());

        attrs.retain(|attr| {
            if !attr.path().is_ident("convert") {
                return true;
            }
            if result.is_ok() {
                result = attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("alias") {
                        conf.alias = Some(meta.value()?.parse()?);
                    } else if meta.path.is_ident("with") {
                        conf.with = Some(meta.value()?.parse()?);
                    } else if meta.path.is_ident("default") {
                        conf.default = Some(meta.value()?.parse()?);
                    } else if meta.path.is_ident("skip") {
                        conf.skip = true;
                    } else {
                        return Err(meta.error("expected `alias`, `with`, `default` or `skip`"));
                    }
                    Ok(())
                });
            }
            false
        });
        result?;

        let picked = [conf.alias.is_some(), conf.with.is_some(), conf.skip];
        if picked.iter().filter(|set| **set).count() > 1 {
            return Err(syn::Error::new(
                Span::call_site(),
                "use only one of `alias`, `with` and `skip`",
            ));
        }
        Ok(conf)
    }
}

// ============================================================================
// DEDUCE ATTRIBUTE MACRO
// ============================================================================

#[proc_macro_error]
#[proc_macro_attribute]
pub fn deduce(_attr: TokenStream, item: TokenStream) -> TokenStream {
    // ───────── Parse the user function ─────────
    let mut func: ItemFn = parse_macro_input!(item);
    let fn_name = func.sig.ident.clone();
    let fn_name_str = fn_name.to_string();
    let doc_lit = LitStr::new(&docs(&func.attrs), Span::call_site());
    let crate_path = get_crate_path();

    if let Some(asyncness) = &func.sig.asyncness {
        abort!(asyncness, "`#[deduce]` does not support async functions");
    }
    if !func.sig.generics.params.is_empty() {
        abort!(func.sig.generics, "`#[deduce]` does not support generic functions");
    }

    // ───────── Inputs → signature entries ─────────
    let mut names = Vec::new();
    let mut types = Vec::new();
    let mut params = Vec::new();

    for arg in func.sig.inputs.iter_mut() {
        let (attrs, pat, ty) = match arg {
            FnArg::Typed(PatType { attrs, pat, ty, .. }) => (attrs, &**pat, &**ty),
            FnArg::Receiver(receiver) => {
                abort!(receiver, "`#[deduce]` may not be used on `self` methods")
            }
        };
        let Pat::Ident(PatIdent { ident, .. }) = pat else {
            abort!(pat, "`#[deduce]` supports only identifier patterns");
        };
        if let Type::Reference(_) = ty {
            abort!(ty, "`#[deduce]` parameters must be owned types");
        }
        let conf = match ConvertAttr::take(attrs) {
            Ok(conf) => conf,
            Err(err) => abort!(err.span(), "{}", err),
        };

        let name = ident.to_string();
        let inner = option_inner(ty);
        let spec = match (&conf, inner) {
            (ConvertAttr { skip: true, .. }, _) => quote!(#crate_path::ConverterSpec::Identity),
            (ConvertAttr { with: Some(with), .. }, Some(_)) => quote! {
                #crate_path::ConverterSpec::optional(#crate_path::ConverterSpec::converter(#with))
            },
            (ConvertAttr { with: Some(with), .. }, None) => {
                quote!(#crate_path::ConverterSpec::converter(#with))
            }
            (ConvertAttr { alias: Some(alias), .. }, Some(_)) => quote! {
                #crate_path::ConverterSpec::optional(#crate_path::ConverterSpec::alias(#alias))
            },
            (ConvertAttr { alias: Some(alias), .. }, None) => {
                quote!(#crate_path::ConverterSpec::alias(#alias))
            }
            (_, Some(inner)) => quote! {
                #crate_path::ConverterSpec::optional(#crate_path::ConverterSpec::of::<#inner>())
            },
            (_, None) => quote!(#crate_path::ConverterSpec::of::<#ty>()),
        };
        let default = match (&conf.default, inner) {
            (Some(expr), _) => quote! {
                ::std::option::Option::Some(#crate_path::__private::serde_json::json!(#expr))
            },
            (None, Some(_)) => quote! {
                ::std::option::Option::Some(#crate_path::__private::serde_json::Value::Null)
            },
            (None, None) => quote!(::std::option::Option::None),
        };

        params.push(quote! {
            .param(#crate_path::Param {
                name: ::std::borrow::Cow::Borrowed(#name),
                spec: #spec,
                default: #default,
            })
        });
        names.push(name);
        types.push(ty.clone());
    }

    // ───────── Generated helper idents ─────────
    let signature_fn = Ident::new(&format!("__deduce_signature_{fn_name}"), Span::call_site());
    let call_fn = Ident::new(&format!("__deduce_call_{fn_name}"), Span::call_site());

    // ───────── Macro expansion ─────────
    TokenStream::from(quote! {
        #func

        #[doc(hidden)]
        #[allow(non_snake_case)]
        fn #signature_fn() -> #crate_path::Signature {
            #crate_path::Signature::new() #( #params )*
        }

        #[doc(hidden)]
        #[allow(non_snake_case, unused_mut, unused_variables)]
        fn #call_fn(
            mut __bound: #crate_path::BoundArguments,
        ) -> ::std::result::Result<#crate_path::__private::serde_json::Value, #crate_path::DeduceError> {
            let __out = #fn_name( #( __bound.take::<#types>(#names)? ),* );
            ::std::result::Result::Ok(#crate_path::__private::serde_json::to_value(__out)?)
        }

        #crate_path::__private::inventory::submit! {
            #crate_path::DeducedRegistration::new(
                #fn_name_str,
                #doc_lit,
                #signature_fn,
                #call_fn,
            )
        }
    })
}

// ============================================================================
// ALIAS ATTRIBUTE MACRO
// ============================================================================

#[proc_macro_error]
#[proc_macro_attribute]
pub fn alias(attr: TokenStream, item: TokenStream) -> TokenStream {
    let key = parse_macro_input!(attr as LitStr);
    let func: ItemFn = parse_macro_input!(item);
    let fn_name = &func.sig.ident;
    let fn_name_str = fn_name.to_string();
    let crate_path = get_crate_path();

    if key.value().is_empty() {
        abort!(key, "alias key must not be empty");
    }
    if func.sig.inputs.len() != 1 {
        abort!(
            func.sig.inputs,
            "`#[alias]` functions take exactly one `serde_json::Value`"
        );
    }

    TokenStream::from(quote! {
        #func

        #crate_path::__private::inventory::submit! {
            #crate_path::AliasRegistration::new(#key, #fn_name_str, #fn_name)
        }
    })
}
