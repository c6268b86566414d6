//! `#[derive(Record)]` for brrtbind.
//!
//! Generates `Record::record_schema()` from the struct definition so the
//! schema's field names always match the serde keys the type reads and writes.
//!
//! ```rust,ignore
//! #[derive(Serialize, Deserialize, Record)]
//! #[record(name = "PostCreate")]
//! struct PostCreate {
//!     #[record(min_length = 1, max_length = 200)]
//!     title: String,
//!     #[serde(rename = "authorId")]
//!     #[record(ge = 1)]
//!     author_id: i64,
//!     #[record(default)]
//!     tags: Vec<String>,
//! }
//! ```
//!
//! Field attributes (`#[record(...)]`):
//!
//! - `default` - default from `Default::default()`
//! - `default = expr` - default from any `Into<serde_json::Value>` expression
//! - `ge`, `gt`, `le`, `lt` - numeric bounds
//! - `min_length`, `max_length` - length bounds
//! - `pattern = "regex"` - string pattern
//!
//! `#[serde(rename)]`, `#[serde(rename_all)]`, `#[serde(skip)]` and
//! `#[serde(default)]` are honoured. `#[serde(flatten)]` is rejected.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::ext::IdentExt;
use syn::meta::ParseNestedMeta;
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Expr, ExprPath, Fields, LitStr, Token};

enum DefaultSpec {
    TypeDefault,
    Value(Expr),
    Function(ExprPath),
}

#[derive(Default)]
struct FieldAttrs {
    rename: Option<String>,
    skip: bool,
    default: Option<DefaultSpec>,
    serde_default: Option<DefaultSpec>,
    constraints: Vec<TokenStream2>,
}

#[derive(Default)]
struct ContainerAttrs {
    name: Option<String>,
    rename_all: Option<String>,
}

/// Consume the value of a serde attribute this macro does not interpret.
fn skip_value(meta: &ParseNestedMeta) -> syn::Result<()> {
    if meta.input.peek(Token![=]) {
        meta.value()?.parse::<Expr>()?;
    } else if meta.input.peek(syn::token::Paren) {
        meta.parse_nested_meta(|inner| skip_value(&inner))?;
    }
    Ok(())
}

fn parse_record_field(attr: &Attribute, attrs: &mut FieldAttrs) -> syn::Result<()> {
    attr.parse_nested_meta(|meta| {
        let key = meta.path.get_ident().map(ToString::to_string).unwrap_or_default();
        match key.as_str() {
            "default" => {
                attrs.default = Some(if meta.input.peek(Token![=]) {
                    DefaultSpec::Value(meta.value()?.parse()?)
                } else {
                    DefaultSpec::TypeDefault
                });
            }
            "ge" | "gt" | "le" | "lt" => {
                let bound: Expr = meta.value()?.parse()?;
                let method = format_ident!("{}", key);
                attrs.constraints.push(quote! { .#method((#bound) as f64) });
            }
            "min_length" | "max_length" => {
                let len: Expr = meta.value()?.parse()?;
                let method = format_ident!("{}", key);
                attrs.constraints.push(quote! { .#method((#len) as usize) });
            }
            "pattern" => {
                let source: LitStr = meta.value()?.parse()?;
                attrs.constraints.push(quote! { .pattern(#source) });
            }
            _ => return Err(meta.error("unknown record attribute")),
        }
        Ok(())
    })
}

fn parse_serde_field(attr: &Attribute, attrs: &mut FieldAttrs) -> syn::Result<()> {
    attr.parse_nested_meta(|meta| {
        if meta.path.is_ident("rename") && meta.input.peek(Token![=]) {
            let name: LitStr = meta.value()?.parse()?;
            attrs.rename = Some(name.value());
        } else if meta.path.is_ident("skip") {
            attrs.skip = true;
        } else if meta.path.is_ident("default") {
            attrs.serde_default = Some(if meta.input.peek(Token![=]) {
                let path: LitStr = meta.value()?.parse()?;
                DefaultSpec::Function(path.parse()?)
            } else {
                DefaultSpec::TypeDefault
            });
        } else if meta.path.is_ident("flatten") {
            return Err(meta.error("#[serde(flatten)] is not supported by #[derive(Record)]"));
        } else {
            skip_value(&meta)?;
        }
        Ok(())
    })
}

fn parse_container(attrs: &[Attribute]) -> syn::Result<ContainerAttrs> {
    let mut out = ContainerAttrs::default();
    for attr in attrs {
        if attr.path().is_ident("record") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    let name: LitStr = meta.value()?.parse()?;
                    out.name = Some(name.value());
                    Ok(())
                } else {
                    Err(meta.error("unknown record attribute"))
                }
            })?;
        } else if attr.path().is_ident("serde") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename_all") && meta.input.peek(Token![=]) {
                    let rule: LitStr = meta.value()?.parse()?;
                    if rename_field("a_b", &rule.value()).is_none() {
                        return Err(syn::Error::new(rule.span(), "unknown rename_all rule"));
                    }
                    out.rename_all = Some(rule.value());
                    Ok(())
                } else {
                    skip_value(&meta)
                }
            })?;
        }
    }
    Ok(out)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Apply a serde `rename_all` rule to a snake_case field name.
fn rename_field(field: &str, rule: &str) -> Option<String> {
    let renamed = match rule {
        "snake_case" => field.to_string(),
        "lowercase" => field.to_lowercase(),
        "UPPERCASE" => field.to_uppercase(),
        "SCREAMING_SNAKE_CASE" => field.to_uppercase(),
        "kebab-case" => field.replace('_', "-"),
        "SCREAMING-KEBAB-CASE" => field.replace('_', "-").to_uppercase(),
        "PascalCase" => field.split('_').map(capitalize).collect(),
        "camelCase" => {
            let pascal: String = field.split('_').map(capitalize).collect();
            let mut chars = pascal.chars();
            match chars.next() {
                Some(first) => first.to_lowercase().chain(chars).collect(),
                None => String::new(),
            }
        }
        _ => return None,
    };
    Some(renamed)
}

fn default_tokens(spec: Option<&DefaultSpec>, ty: &syn::Type) -> TokenStream2 {
    match spec {
        None => quote! {},
        Some(DefaultSpec::TypeDefault) => quote! { .default_of::<#ty>() },
        Some(DefaultSpec::Value(expr)) => quote! { .default(#expr) },
        Some(DefaultSpec::Function(path)) => quote! { .default_value(#path()) },
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "#[derive(Record)] requires a struct with named fields",
        ));
    };
    let Fields::Named(named) = &data.fields else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "#[derive(Record)] requires a struct with named fields",
        ));
    };

    let container = parse_container(&input.attrs)?;
    let ident = &input.ident;
    let record_name = container.name.unwrap_or_else(|| ident.to_string());

    let mut fields = Vec::new();
    for field in &named.named {
        let mut attrs = FieldAttrs::default();
        for attr in &field.attrs {
            if attr.path().is_ident("record") {
                parse_record_field(attr, &mut attrs)?;
            } else if attr.path().is_ident("serde") {
                parse_serde_field(attr, &mut attrs)?;
            }
        }
        if attrs.skip {
            continue;
        }

        let Some(field_ident) = &field.ident else {
            continue;
        };
        let rust_name = field_ident.unraw().to_string();
        let key = match (attrs.rename, &container.rename_all) {
            (Some(rename), _) => rename,
            (None, Some(rule)) => rename_field(&rust_name, rule).unwrap_or(rust_name),
            (None, None) => rust_name,
        };

        let ty = &field.ty;
        let default = default_tokens(attrs.default.as_ref().or(attrs.serde_default.as_ref()), ty);
        let constraints = &attrs.constraints;
        fields.push(quote! {
            .field(::brrtbind::schema::Field::of::<#ty>(#key) #default #(#constraints)*)
        });
    }

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    Ok(quote! {
        impl #impl_generics ::brrtbind::schema::Record for #ident #ty_generics #where_clause {
            fn record_schema() -> ::brrtbind::schema::RecordSchema {
                ::brrtbind::schema::RecordSchema::builder(#record_name)
                    #(#fields)*
                    .build()
            }
        }
    })
}

#[proc_macro_derive(Record, attributes(record))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}
