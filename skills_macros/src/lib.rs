//! Procedural macros for **skills-rs**
#![forbid(unsafe_code)]

use proc_macro::TokenStream;
use proc_macro2::{Ident, Span, TokenStream as TokenStream2};
use proc_macro_crate::{FoundCrate, crate_name};
use proc_macro_error::{abort, proc_macro_error};
use quote::quote;
use syn::{
    Attribute, Data, DataEnum, DeriveInput, Expr, ExprLit, Fields, FieldsNamed, FieldsUnnamed,
    FnArg, ItemFn, Lit, LitBool, LitStr, Meta, Pat, PatIdent, PatType, Token, Type, TypePath,
    ext::IdentExt, meta::ParseNestedMeta, parse_macro_input, parse_quote,
};

// ============================================================================
// DESCRIBE DERIVE MACRO
// ============================================================================

/// Derive `Describe` for records, newtypes and enums.
///
/// * named structs become objects; `Option` fields are not required and
///   `#[describe(default = expr)]` gives a field a default value
/// * a single-field tuple struct is described as its field
/// * unit-only enums become string enums over the variant names; the value
///   behind each name is the variant's serde form, so the enum must also
///   implement `Serialize`
/// * enums whose variants all wrap one value become unions, tried in
///   declaration order; the matched variant is handed to serde in its
///   default externally tagged form, so `#[serde(untagged)]` is rejected
///
/// The serde attributes that change what the model sends are honored:
/// `rename`, `rename_all`, `skip`, `skip_deserializing` and `default`.
/// `#[serde(flatten)]` is rejected.
#[proc_macro_error]
#[proc_macro_derive(Describe, attributes(describe))]
pub fn derive_describe(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let crate_path = get_crate_path();

    let body = match &input.data {
        Data::Struct(data_struct) => match &data_struct.fields {
            Fields::Named(fields) => object_body(&input, fields, &crate_path),
            Fields::Unnamed(fields) => tuple_body(fields, &crate_path),
            Fields::Unit => quote! {
                ::core::result::Result::Ok(#crate_path::TypeDescriptor::Null)
            },
        },
        Data::Enum(data_enum) => enum_body(&input, data_enum, &crate_path),
        Data::Union(_) => abort!(input.ident, "`Describe` cannot be derived for unions"),
    };

    let name = &input.ident;
    let mut generics = input.generics.clone();
    for param in generics.type_params_mut() {
        param.bounds.push(parse_quote!(#crate_path::Describe));
    }
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    TokenStream::from(quote! {
        impl #impl_generics #crate_path::Describe for #name #ty_generics #where_clause {
            #[allow(unused_variables)]
            fn describe(
                cx: &mut #crate_path::Introspector,
            ) -> ::core::result::Result<#crate_path::TypeDescriptor, #crate_path::UnsupportedTypeError> {
                cx.nested::<Self>(|cx| { #body })
            }
        }
    })
}

fn object_body(input: &DeriveInput, fields: &FieldsNamed, crate_path: &TokenStream2) -> TokenStream2 {
    let name_str = input.ident.to_string();
    let doc = docs(&input.attrs);
    let container = SerdeAttrs::parse(&input.attrs);

    let properties = fields.named.iter().filter_map(|field| {
        let Some(ident) = field.ident.as_ref() else {
            abort!(field, "expected a named field");
        };
        let serde = SerdeAttrs::parse(&field.attrs);
        if serde.flatten {
            abort!(field, "`Describe` does not support `#[serde(flatten)]`");
        }
        if serde.skip {
            return None;
        }
        let field_name = ident.unraw().to_string();
        let key = serde.rename.unwrap_or_else(|| match container.rename_all {
            Some(rule) => rule.apply_to_field(&field_name),
            None => field_name,
        });
        let ty = &field.ty;
        let field_doc = docs(&field.attrs);
        let described = quote! { <#ty as #crate_path::Describe>::describe(cx)? };

        let property = match describe_default(&field.attrs) {
            Some(default) => quote! {
                #crate_path::Property::optional(
                    #described,
                    ::core::option::Option::Some(
                        #crate_path::__private::default_value::<#ty>(#default, #name_str, #key)?,
                    ),
                )
            },
            // Left absent when not sent; serde supplies the value.
            None if is_option_type(ty) || serde.default || container.default => quote! {
                #crate_path::Property::optional(#described, ::core::option::Option::None)
            },
            None => quote! { #crate_path::Property::required(#described) },
        };
        Some(quote! { .property(#key, #property.with_doc(#field_doc))? })
    });

    quote! {
        let object = #crate_path::ObjectType::new(#name_str)
            .with_doc(#doc)
            #(#properties)*;
        ::core::result::Result::Ok(#crate_path::TypeDescriptor::Object(object))
    }
}

fn tuple_body(fields: &FieldsUnnamed, crate_path: &TokenStream2) -> TokenStream2 {
    let types: Vec<&Type> = fields.unnamed.iter().map(|f| &f.ty).collect();
    match types.as_slice() {
        // Newtypes are transparent, as serde treats them.
        [inner] => quote! { <#inner as #crate_path::Describe>::describe(cx) },
        _ => quote! {
            ::core::result::Result::Ok(#crate_path::TypeDescriptor::Tuple(::std::vec![
                #( <#types as #crate_path::Describe>::describe(cx)? ),*
            ]))
        },
    }
}

fn enum_body(input: &DeriveInput, data: &DataEnum, crate_path: &TokenStream2) -> TokenStream2 {
    let name_str = input.ident.to_string();
    if data.variants.is_empty() {
        abort!(input.ident, "`Describe` cannot be derived for an enum without variants");
    }

    if data.variants.iter().all(|v| matches!(v.fields, Fields::Unit)) {
        let doc = docs(&input.attrs);
        let members = data
            .variants
            .iter()
            .filter(|v| !SerdeAttrs::parse(&v.attrs).skip)
            .map(|variant| {
                let ident = &variant.ident;
                let member = ident.to_string();
                quote! {
                    (#member, #crate_path::__private::enum_value(&Self::#ident, #name_str)?)
                }
            });
        return quote! {
            let members = [#(#members),*];
            let ty = #crate_path::EnumType::new(#name_str, members)?.with_doc(#doc);
            ::core::result::Result::Ok(#crate_path::TypeDescriptor::Enum(ty))
        };
    }

    let container = SerdeAttrs::parse(&input.attrs);
    if container.untagged || container.tagged_inline {
        abort!(
            input.ident,
            "`Describe` hands enum variants to serde externally tagged; remove `untagged`, `tag` and `content`"
        );
    }

    let alternatives: Vec<TokenStream2> = data
        .variants
        .iter()
        .filter_map(|variant| match &variant.fields {
            Fields::Unnamed(fields) if fields.unnamed.len() == 1 => {
                let serde = SerdeAttrs::parse(&variant.attrs);
                if serde.skip {
                    return None;
                }
                let variant_name = variant.ident.unraw().to_string();
                let tag = serde.rename.unwrap_or_else(|| match container.rename_all {
                    Some(rule) => rule.apply_to_variant(&variant_name),
                    None => variant_name,
                });
                let ty = &fields.unnamed[0].ty;
                Some(quote! { (#tag, <#ty as #crate_path::Describe>::describe(cx)?) })
            }
            _ => abort!(
                variant,
                "`Describe` supports enums whose variants are all unit variants or all single-value tuple variants"
            ),
        })
        .collect();
    if alternatives.is_empty() {
        abort!(input.ident, "every variant of this enum is skipped");
    }
    quote! {
        ::core::result::Result::Ok(#crate_path::TypeDescriptor::variants([#(#alternatives),*]))
    }
}

/// `#[describe(default = expr)]`
fn describe_default(attrs: &[Attribute]) -> Option<Expr> {
    let mut default = None;
    for attr in attrs.iter().filter(|a| a.path().is_ident("describe")) {
        let parsed = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("default") {
                default = Some(meta.value()?.parse::<Expr>()?);
                Ok(())
            } else {
                Err(meta.error("unsupported describe attribute, expected `default = ...`"))
            }
        });
        if let Err(err) = parsed {
            abort!(err.span(), "{}", err);
        }
    }
    default
}

/// The `#[serde(...)]` settings that change what the model has to send.
/// Everything else serde accepts is skipped over.
#[derive(Debug, Default)]
struct SerdeAttrs {
    rename: Option<String>,
    rename_all: Option<RenameRule>,
    skip: bool,
    default: bool,
    flatten: bool,
    untagged: bool,
    tagged_inline: bool,
}

impl SerdeAttrs {
    fn parse(attrs: &[Attribute]) -> Self {
        let mut out = SerdeAttrs::default();
        for attr in attrs.iter().filter(|a| a.path().is_ident("serde")) {
            if let Err(err) = attr.parse_nested_meta(|meta| out.parse_meta(meta)) {
                abort!(err.span(), "{}", err);
            }
        }
        out
    }

    fn parse_meta(&mut self, meta: ParseNestedMeta) -> syn::Result<()> {
        if meta.path.is_ident("rename") {
            if let Some(name) = deserialize_name(&meta)? {
                self.rename = Some(name);
            }
        } else if meta.path.is_ident("rename_all") {
            if let Some(name) = deserialize_name(&meta)? {
                let Some(rule) = RenameRule::from_name(&name) else {
                    return Err(meta.error(format!("unknown rename rule `{name}`")));
                };
                self.rename_all = Some(rule);
            }
        } else if meta.path.is_ident("skip") || meta.path.is_ident("skip_deserializing") {
            self.skip = true;
        } else if meta.path.is_ident("default") {
            self.default = true;
            skip_value(&meta)?;
        } else if meta.path.is_ident("flatten") {
            self.flatten = true;
        } else if meta.path.is_ident("untagged") {
            self.untagged = true;
        } else if meta.path.is_ident("tag") || meta.path.is_ident("content") {
            self.tagged_inline = true;
            skip_value(&meta)?;
        } else {
            skip_value(&meta)?;
        }
        Ok(())
    }
}

/// The deserialize-side name of `key = "name"` or
/// `key(serialize = "..", deserialize = "name")`.
fn deserialize_name(meta: &ParseNestedMeta) -> syn::Result<Option<String>> {
    if meta.input.peek(Token![=]) {
        return Ok(Some(meta.value()?.parse::<LitStr>()?.value()));
    }
    let mut name = None;
    meta.parse_nested_meta(|inner| {
        let value = inner.value()?.parse::<LitStr>()?;
        if inner.path.is_ident("deserialize") {
            name = Some(value.value());
        }
        Ok(())
    })?;
    Ok(name)
}

fn skip_value(meta: &ParseNestedMeta) -> syn::Result<()> {
    if meta.input.peek(Token![=]) {
        meta.value()?.parse::<Expr>()?;
    } else if meta.input.peek(syn::token::Paren) {
        let content;
        syn::parenthesized!(content in meta.input);
        content.parse::<TokenStream2>()?;
    }
    Ok(())
}

/// Case conventions accepted by `#[serde(rename_all = "...")]`.
#[derive(Debug, Clone, Copy, PartialEq)]
enum RenameRule {
    Lower,
    Upper,
    Pascal,
    Camel,
    Snake,
    ScreamingSnake,
    Kebab,
    ScreamingKebab,
}

impl RenameRule {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "lowercase" => RenameRule::Lower,
            "UPPERCASE" => RenameRule::Upper,
            "PascalCase" => RenameRule::Pascal,
            "camelCase" => RenameRule::Camel,
            "snake_case" => RenameRule::Snake,
            "SCREAMING_SNAKE_CASE" => RenameRule::ScreamingSnake,
            "kebab-case" => RenameRule::Kebab,
            "SCREAMING-KEBAB-CASE" => RenameRule::ScreamingKebab,
            _ => return None,
        })
    }

    /// Rename a `snake_case` field.
    fn apply_to_field(self, field: &str) -> String {
        match self {
            RenameRule::Lower | RenameRule::Snake => field.to_owned(),
            RenameRule::Upper | RenameRule::ScreamingSnake => field.to_ascii_uppercase(),
            RenameRule::Pascal => {
                let mut out = String::with_capacity(field.len());
                let mut capitalize = true;
                for ch in field.chars() {
                    if ch == '_' {
                        capitalize = true;
                    } else if capitalize {
                        out.push(ch.to_ascii_uppercase());
                        capitalize = false;
                    } else {
                        out.push(ch);
                    }
                }
                out
            }
            RenameRule::Camel => lower_first(&RenameRule::Pascal.apply_to_field(field)),
            RenameRule::Kebab => field.replace('_', "-"),
            RenameRule::ScreamingKebab => field.to_ascii_uppercase().replace('_', "-"),
        }
    }

    /// Rename a `PascalCase` variant.
    fn apply_to_variant(self, variant: &str) -> String {
        match self {
            RenameRule::Pascal => variant.to_owned(),
            RenameRule::Lower => variant.to_ascii_lowercase(),
            RenameRule::Upper => variant.to_ascii_uppercase(),
            RenameRule::Camel => lower_first(variant),
            RenameRule::Snake => {
                let mut out = String::with_capacity(variant.len() + 4);
                for (i, ch) in variant.char_indices() {
                    if i > 0 && ch.is_uppercase() {
                        out.push('_');
                    }
                    out.push(ch.to_ascii_lowercase());
                }
                out
            }
            RenameRule::ScreamingSnake => {
                RenameRule::Snake.apply_to_variant(variant).to_ascii_uppercase()
            }
            RenameRule::Kebab => RenameRule::Snake.apply_to_variant(variant).replace('_', "-"),
            RenameRule::ScreamingKebab => RenameRule::ScreamingSnake
                .apply_to_variant(variant)
                .replace('_', "-"),
        }
    }
}

fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

fn get_crate_path() -> TokenStream2 {
    match crate_name("skills-rs") {
        Ok(FoundCrate::Itself) => return quote!(::skills_rs),
        Ok(FoundCrate::Name(name)) => {
            let ident = Ident::new(&name, Span::call_site());
            return quote!(::#ident);
        }
        Err(_) => {}
    }
    match crate_name("skills_core") {
        Ok(FoundCrate::Itself) => quote!(::skills_core),
        Ok(FoundCrate::Name(name)) => {
            let ident = Ident::new(&name, Span::call_site());
            quote!(::#ident)
        }
        Err(_) => quote!(::skills_rs),
    }
}

fn is_option_type(ty: &Type) -> bool {
    let Type::Path(TypePath { qself: None, path }) = ty else {
        return false;
    };

    let Some(last) = path.segments.last() else {
        return false;
    };
    if last.ident != "Option" {
        return false;
    }

    match path
        .segments
        .iter()
        .map(|s| &s.ident)
        .collect::<Vec<_>>()
        .as_slice()
    {
        [ident] if *ident == "Option" => true,

        // `std::option::Option` or `core::option::Option`
        [first, second, ident]
            if (*first == "std" || *first == "core")
                && *second == "option"
                && *ident == "Option" =>
        {
            true
        }

        _ => false,
    }
}

/// Gather `///` doc-comments into a single string, dropping the one space
/// after `///` but keeping any deeper indentation.
fn docs(attrs: &[Attribute]) -> String {
    attrs
        .iter()
        .filter_map(|a| match &a.meta {
            Meta::NameValue(nv) if a.path().is_ident("doc") => {
                if let Expr::Lit(ExprLit {
                    lit: Lit::Str(s), ..
                }) = &nv.value
                {
                    let line = s.value();
                    Some(line.strip_prefix(' ').unwrap_or(&line).to_owned())
                } else {
                    None
                }
            }
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ============================================================================
// FUNCTION ATTRIBUTE MACRO
// ============================================================================

#[derive(Default)]
struct FunctionArgs {
    name: Option<LitStr>,
    description: Option<LitStr>,
    save_return: Option<LitBool>,
    serialize: Option<LitBool>,
    interpret_as_response: Option<LitBool>,
}

impl FunctionArgs {
    fn parse(&mut self, meta: ParseNestedMeta) -> syn::Result<()> {
        if meta.path.is_ident("name") {
            self.name = Some(meta.value()?.parse()?);
        } else if meta.path.is_ident("description") {
            self.description = Some(meta.value()?.parse()?);
        } else if meta.path.is_ident("save_return") {
            self.save_return = Some(meta.value()?.parse()?);
        } else if meta.path.is_ident("serialize") {
            self.serialize = Some(meta.value()?.parse()?);
        } else if meta.path.is_ident("interpret_as_response") {
            self.interpret_as_response = Some(meta.value()?.parse()?);
        } else {
            return Err(meta.error("unsupported function attribute"));
        }
        Ok(())
    }

    fn options(&self, crate_path: &TokenStream2) -> TokenStream2 {
        let mut options = quote! { #crate_path::FunctionOptions::default() };
        if let Some(name) = &self.name {
            options = quote! { #options.named(#name) };
        }
        if let Some(description) = &self.description {
            options = quote! { #options.described(#description) };
        }
        if let Some(value) = &self.save_return {
            options = quote! { #options.save_return(#value) };
        }
        if let Some(value) = &self.serialize {
            options = quote! { #options.serialize(#value) };
        }
        if let Some(value) = &self.interpret_as_response {
            options = quote! { #options.interpret_as_response(#value) };
        }
        options
    }
}

struct Param {
    ident: Ident,
    ty: Type,
    default: Option<Expr>,
}

/// Take the `#[param(default = expr)]` attributes off a parameter.
fn take_param_default(attrs: &mut Vec<Attribute>) -> Option<Expr> {
    let mut default = None;
    for attr in attrs.iter().filter(|a| a.path().is_ident("param")) {
        let parsed = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("default") {
                default = Some(meta.value()?.parse::<Expr>()?);
                Ok(())
            } else {
                Err(meta.error("unsupported param attribute, expected `default = ...`"))
            }
        });
        if let Err(err) = parsed {
            abort!(err.span(), "{}", err);
        }
    }
    attrs.retain(|a| !a.path().is_ident("param"));
    default
}

/// Expose a plain function to the model.
///
/// The schema is built from the signature and the doc comment: the summary
/// line becomes the description and an `# Arguments` section documents the
/// parameters. Parameters of type `Option<_>` default to `null`; others can be
/// given a default with `#[param(default = expr)]`.
///
/// ```ignore
/// #[function(serialize = false)]
/// /// Greet someone.
/// ///
/// /// # Arguments
/// ///
/// /// * `name` - Who to greet
/// fn greet(name: String, #[param(default = 1)] times: u32) -> String {
///     format!("Hello {name}! ").repeat(times as usize)
/// }
/// ```
#[proc_macro_error]
#[proc_macro_attribute]
pub fn function(attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut args = FunctionArgs::default();
    let parser = syn::meta::parser(|meta| args.parse(meta));
    parse_macro_input!(attr with parser);

    let mut func: ItemFn = parse_macro_input!(item);
    if let Some(asyncness) = &func.sig.asyncness {
        abort!(asyncness, "`#[function]` requires a synchronous fn");
    }
    if !func.sig.generics.params.is_empty() {
        abort!(func.sig.generics, "`#[function]` does not support generic functions");
    }

    let params: Vec<Param> = func
        .sig
        .inputs
        .iter_mut()
        .map(|arg| match arg {
            FnArg::Typed(PatType { attrs, pat, ty, .. }) => {
                let Pat::Ident(PatIdent { ident, .. }) = &**pat else {
                    abort!(pat, "`#[function]` supports only identifier patterns");
                };
                if let Type::Reference(reference) = &**ty {
                    abort!(reference, "`#[function]` parameters must be owned types");
                }
                Param {
                    ident: ident.clone(),
                    ty: (**ty).clone(),
                    default: take_param_default(attrs),
                }
            }
            _ => abort!(arg, "`#[function]` may not be used on `self` methods"),
        })
        .collect();

    let fn_name = &func.sig.ident;
    let fn_name_str = fn_name.to_string();
    let exposed_name = args
        .name
        .as_ref()
        .map(LitStr::value)
        .unwrap_or_else(|| fn_name_str.clone());
    let doc_lit = LitStr::new(&docs(&func.attrs), Span::call_site());
    let build_fn = Ident::new(&format!("__skill_function_{fn_name}"), Span::call_site());
    let crate_path = get_crate_path();
    let options = args.options(&crate_path);

    let declarations = params.iter().map(|param| {
        let name = param.ident.to_string();
        let ty = &param.ty;
        match &param.default {
            Some(default) => quote! { .param_with_default::<#ty>(#name, #default) },
            None => quote! { .param::<#ty>(#name) },
        }
    });

    let body = if params.is_empty() {
        quote! { |_| ::core::result::Result::Ok(#fn_name()) }
    } else {
        let takes = params.iter().map(|param| {
            let name = param.ident.to_string();
            let ty = &param.ty;
            quote! { __args.take::<#ty>(#name)? }
        });
        quote! {
            |mut __args: #crate_path::Arguments| {
                ::core::result::Result::Ok(#fn_name(#(#takes),*))
            }
        }
    };

    TokenStream::from(quote! {
        #func

        #[doc(hidden)]
        #[allow(non_snake_case)]
        fn #build_fn() -> ::core::result::Result<#crate_path::FunctionDescriptor, #crate_path::SkillError> {
            #crate_path::FunctionDescriptor::builder(#fn_name_str)
                .doc(#doc_lit)
                .options(#options)
                #(#declarations)*
                .build(#body)
        }

        #crate_path::__private::inventory::submit! {
            #crate_path::FunctionRegistration::new(#exposed_name, #build_fn)
        }
    })
}
