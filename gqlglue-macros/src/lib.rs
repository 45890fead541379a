//! Procedural macros for gqlglue
//!
//! - `#[derive(Entity)]` - Generate entity metadata (table, columns, GraphQL field names)

use convert_case::{Case, Casing};
use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{Data, DeriveInput, Fields, LitStr, parse_macro_input};

/// Generate an `Entity` implementation and one `Column` constant per field.
///
/// # Usage
///
/// ```ignore
/// #[derive(Entity, sqlx::FromRow)]
/// #[entity(table = "users")]
/// pub struct User {
///     pub id: i64,
///     pub name: String,
///     #[entity(field = "yearsOld")]
///     pub age: i64,
///     #[entity(skip)]
///     #[sqlx(skip)]
///     pub cached: Option<String>,
/// }
/// ```
///
/// Entities queried with a narrowed projection (`Select::columns`) also need
/// `#[sqlx(default)]` on every field that may be left out.
///
/// # Generated Code
///
/// ```ignore
/// impl gqlglue::orm::Entity for User {
///     const TABLE_NAME: &'static str = "users";
///     const PRIMARY_KEY: &'static str = "id";
///     const COLUMNS: &'static [gqlglue::orm::ColumnDef] = &[
///         gqlglue::orm::ColumnDef::new("id", "id"),
///         gqlglue::orm::ColumnDef::new("name", "name"),
///         gqlglue::orm::ColumnDef::new("age", "yearsOld"),
///     ];
/// }
///
/// impl User {
///     pub const ID: gqlglue::orm::Column<User> = gqlglue::orm::Column::new("id", "id");
///     pub const NAME: gqlglue::orm::Column<User> = gqlglue::orm::Column::new("name", "name");
///     pub const AGE: gqlglue::orm::Column<User> = gqlglue::orm::Column::new("age", "yearsOld");
/// }
/// ```
#[proc_macro_derive(Entity, attributes(entity))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_entity(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Struct-level `#[entity(...)]` options
#[derive(Default)]
struct EntityAttrs {
    table: Option<String>,
    primary_key: Option<String>,
}

/// Field-level `#[entity(...)]` options
#[derive(Default)]
struct FieldAttrs {
    column: Option<String>,
    field: Option<String>,
    skip: bool,
}

struct ColumnSpec {
    ident: syn::Ident,
    column: String,
    field: String,
}

fn expand_entity(input: DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let struct_name = &input.ident;
    let attrs = parse_entity_attrs(&input.attrs)?;

    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            struct_name,
            "Entity can only be derived for structs",
        ));
    };
    let Fields::Named(fields) = &data.fields else {
        return Err(syn::Error::new_spanned(
            struct_name,
            "Entity requires a struct with named fields",
        ));
    };

    let mut columns = Vec::new();
    for field in &fields.named {
        let field_attrs = parse_field_attrs(&field.attrs)?;
        if field_attrs.skip {
            continue;
        }
        let Some(ident) = field.ident.clone() else {
            continue;
        };
        let rust_name = ident.to_string().trim_start_matches("r#").to_string();
        columns.push(ColumnSpec {
            column: field_attrs.column.unwrap_or_else(|| rust_name.clone()),
            field: field_attrs
                .field
                .unwrap_or_else(|| rust_name.to_case(Case::Camel)),
            ident,
        });
    }

    if columns.is_empty() {
        return Err(syn::Error::new_spanned(
            struct_name,
            "Entity needs at least one column",
        ));
    }

    let table = attrs
        .table
        .unwrap_or_else(|| struct_name.to_string().to_case(Case::Snake));
    let primary_key = attrs.primary_key.unwrap_or_else(|| {
        columns
            .iter()
            .find(|c| c.column == "id")
            .unwrap_or(&columns[0])
            .column
            .clone()
    });

    let column_defs = columns.iter().map(|c| {
        let column = &c.column;
        let field = &c.field;
        quote! { ::gqlglue::orm::ColumnDef::new(#column, #field) }
    });

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let column_consts = columns.iter().map(|c| {
        let rust_name = c.ident.to_string().trim_start_matches("r#").to_string();
        let const_name = format_ident!("{}", rust_name.to_case(Case::UpperSnake));
        let column = &c.column;
        let field = &c.field;
        let doc = format!("The `{column}` column (GraphQL field `{field}`).");
        quote! {
            #[doc = #doc]
            pub const #const_name: ::gqlglue::orm::Column<#struct_name #ty_generics> =
                ::gqlglue::orm::Column::new(#column, #field);
        }
    });

    Ok(quote! {
        impl #impl_generics ::gqlglue::orm::Entity for #struct_name #ty_generics #where_clause {
            const TABLE_NAME: &'static str = #table;
            const PRIMARY_KEY: &'static str = #primary_key;
            const COLUMNS: &'static [::gqlglue::orm::ColumnDef] = &[#(#column_defs),*];
        }

        impl #impl_generics #struct_name #ty_generics #where_clause {
            #(#column_consts)*
        }
    })
}

fn parse_entity_attrs(attrs: &[syn::Attribute]) -> syn::Result<EntityAttrs> {
    let mut parsed = EntityAttrs::default();
    for attr in attrs.iter().filter(|a| a.path().is_ident("entity")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                parsed.table = Some(meta.value()?.parse::<LitStr>()?.value());
                Ok(())
            } else if meta.path.is_ident("primary_key") {
                parsed.primary_key = Some(meta.value()?.parse::<LitStr>()?.value());
                Ok(())
            } else {
                Err(meta.error("unsupported entity attribute, expected `table` or `primary_key`"))
            }
        })?;
    }
    Ok(parsed)
}

fn parse_field_attrs(attrs: &[syn::Attribute]) -> syn::Result<FieldAttrs> {
    let mut parsed = FieldAttrs::default();
    for attr in attrs.iter().filter(|a| a.path().is_ident("entity")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("column") {
                parsed.column = Some(meta.value()?.parse::<LitStr>()?.value());
                Ok(())
            } else if meta.path.is_ident("field") {
                parsed.field = Some(meta.value()?.parse::<LitStr>()?.value());
                Ok(())
            } else if meta.path.is_ident("skip") {
                parsed.skip = true;
                Ok(())
            } else {
                Err(meta.error(
                    "unsupported field attribute, expected `column`, `field` or `skip`",
                ))
            }
        })?;
    }
    Ok(parsed)
}
