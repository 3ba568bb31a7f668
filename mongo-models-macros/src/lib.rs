//! Procedural macros for the mongo-models project.
//!
//! `#[derive(Model)]` binds a serde type to its collection, and optionally to a schema and
//! a list of indexes:
//!
//! ```ignore
//! use mongo_models::Model;
//!
//! #[derive(Debug, Clone, Serialize, Deserialize, Model)]
//! #[model(collection = "people", schema = "person_schema", indexes = "person_indexes")]
//! pub struct Person {
//!     pub name: String,
//! }
//! ```
//!
//! Without a `collection`, the snake_case type name plus `s` is used (`UserProfile` becomes
//! `user_profiles`). `schema` and `indexes` name functions returning `Schema` and
//! `Vec<IndexSpec>`.

#[allow(unused_extern_crates)]
extern crate self as mongo_models_macros;

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, DeriveInput, LitStr, Path};

#[derive(Default)]
struct ModelAttributes {
    collection: Option<String>,
    schema: Option<Path>,
    indexes: Option<Path>,
}

#[proc_macro_derive(Model, attributes(model))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    expand_model(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand_model(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let attributes = parse_attributes(input)?;

    let collection = attributes
        .collection
        .unwrap_or_else(|| format!("{}s", to_snake_case(&name.to_string())));

    let schema = attributes.schema.map(|path| quote! {
        fn schema() -> ::mongo_models::schema::Schema {
            #path()
        }
    });

    let indexes = attributes.indexes.map(|path| quote! {
        fn indexes() -> ::std::vec::Vec<::mongo_models::options::IndexSpec> {
            #path()
        }
    });

    Ok(quote! {
        impl #impl_generics ::mongo_models::model::Model for #name #ty_generics #where_clause {
            fn collection_name() -> &'static str {
                #collection
            }

            #schema
            #indexes
        }
    })
}

fn parse_attributes(input: &DeriveInput) -> syn::Result<ModelAttributes> {
    let mut attributes = ModelAttributes::default();

    for attr in &input.attrs {
        if !attr.path().is_ident("model") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("collection") {
                let value: LitStr = meta.value()?.parse()?;
                if value.value().is_empty() {
                    return Err(meta.error("collection name must not be empty"));
                }
                attributes.collection = Some(value.value());
            } else if meta.path.is_ident("schema") {
                let value: LitStr = meta.value()?.parse()?;
                attributes.schema = Some(value.parse()?);
            } else if meta.path.is_ident("indexes") {
                let value: LitStr = meta.value()?.parse()?;
                attributes.indexes = Some(value.parse()?);
            } else {
                return Err(meta.error("expected `collection`, `schema` or `indexes`"));
            }

            Ok(())
        })?;
    }

    Ok(attributes)
}

fn to_snake_case(name: &str) -> String {
    let mut result = String::new();

    for (i, ch) in name.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.extend(ch.to_lowercase());
        } else {
            result.push(ch);
        }
    }

    result
}
