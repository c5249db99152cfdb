//! Procedural macros for rowmap.
//!
//! `rowmap-macros` writes the reflective descriptions the materializer
//! compiler works from:
//!
//! - `#[derive(Entity)]` produces an `Entity` implementation listing the
//!   struct's settable members and constructors, and optionally `ToParams`.
//! - `#[derive(SqlEnum)]` produces `SqlEnum` metadata plus the `SqlValue`
//!   glue so the enum reads from numbers or names and binds as a number.
//!
//! These macros are used by application crates via the `rowmap` facade.

use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;

mod parse;

use parse::{EntityDef, EnumDef, parse_entity, parse_enum};

/// Derive macro for the `Entity` trait.
///
/// # Attributes
///
/// - `#[rowmap(default)]` - Construct through `Default`, then assign members
///   (the default when no `constructor` attribute is present)
/// - `#[rowmap(constructor)]` - Add a preferred constructor taking every
///   non-skipped field, bound to columns by name
/// - `#[rowmap(params)]` - Also implement `ToParams`
/// - `#[rowmap(column = "name")]` - Override a field's column name
/// - `#[rowmap(skip)]` - Never read or bind this field
///
/// # Example
///
/// ```ignore
/// use rowmap::Entity;
///
/// #[derive(Entity, Default)]
/// #[rowmap(params)]
/// struct Hero {
///     id: i64,
///     #[rowmap(column = "hero_name")]
///     name: String,
///     age: Option<i32>,
///     #[rowmap(skip)]
///     loaded_at: u64,
/// }
/// ```
#[proc_macro_derive(Entity, attributes(rowmap))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as syn::DeriveInput);

    let entity = match parse_entity(&input) {
        Ok(e) => e,
        Err(e) => return e.to_compile_error().into(),
    };

    let mut tokens = generate_entity_impl(&entity);
    if entity.params {
        tokens.extend(generate_to_params_impl(&entity));
    }
    tokens.into()
}

/// Generate the `Entity` implementation.
fn generate_entity_impl(entity: &EntityDef) -> proc_macro2::TokenStream {
    let name = &entity.name;
    let name_lit = name.to_string();
    let (impl_generics, ty_generics, where_clause) = entity.generics.split_for_impl();
    let mapped = entity.mapped_fields();

    let default_ctor = entity.default.then(|| {
        quote! {
            .default_constructor(<Self as ::core::default::Default>::default)
        }
    });

    let ctor = entity.constructor.then(|| {
        let idents: Vec<_> = mapped.iter().map(|f| &f.name).collect();
        let tys: Vec<_> = mapped.iter().map(|f| &f.ty).collect();
        let columns: Vec<_> = mapped.iter().map(|f| f.column.as_str()).collect();
        let skipped = entity.skipped_fields();
        let skipped_idents: Vec<_> = skipped.iter().map(|f| &f.name).collect();
        quote! {
            .constructor(
                rowmap_core::Constructor::new(
                    &[#(#columns),*],
                    |(#(#idents,)*): (#(#tys,)*)| Self {
                        #(#idents,)*
                        #(#skipped_idents: ::core::default::Default::default(),)*
                    },
                )
                .preferred(),
            )
        }
    });

    let members = mapped.iter().map(|f| {
        let field = &f.name;
        let ty = &f.ty;
        let column = f.column.as_str();
        quote! {
            .member(#column, |target: &mut Self, value: #ty| target.#field = value)
        }
    });

    quote! {
        impl #impl_generics rowmap_core::Entity for #name #ty_generics #where_clause {
            fn describe() -> rowmap_core::EntityDescriptor<Self> {
                rowmap_core::EntityDescriptor::<Self>::new(#name_lit)
                    #default_ctor
                    #ctor
                    #(#members)*
            }
        }
    }
}

/// Generate the `ToParams` implementation, one parameter per mapped field.
fn generate_to_params_impl(entity: &EntityDef) -> proc_macro2::TokenStream {
    let name = &entity.name;
    let (impl_generics, ty_generics, where_clause) = entity.generics.split_for_impl();
    let pushes = entity.mapped_fields().into_iter().map(|f| {
        let field = &f.name;
        let column = f.column.as_str();
        quote! {
            params.push(#column, ::core::clone::Clone::clone(&self.#field));
        }
    });

    quote! {
        impl #impl_generics rowmap_core::ToParams for #name #ty_generics #where_clause {
            fn to_params(&self) -> rowmap_core::Params {
                let mut params = rowmap_core::Params::new();
                #(#pushes)*
                params
            }
        }
    }
}

/// Derive macro for the `SqlEnum` trait.
///
/// The enum must be field-less and `Copy`. Discriminants may be explicit or
/// implicit. Reading accepts the discriminant or a variant name (ignoring
/// case); binding writes the discriminant with an explicit storage type.
///
/// # Attributes
///
/// - `#[rowmap(storage = "tinyint" | "smallint" | "integer" | "bigint")]` -
///   Parameter storage type (defaults to `integer`)
///
/// # Example
///
/// ```ignore
/// use rowmap::SqlEnum;
///
/// #[derive(SqlEnum, Clone, Copy, Debug, PartialEq)]
/// #[rowmap(storage = "tinyint")]
/// enum Status {
///     Active = 1,
///     Suspended = 2,
/// }
/// ```
#[proc_macro_derive(SqlEnum, attributes(rowmap))]
pub fn derive_sql_enum(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as syn::DeriveInput);

    match parse_enum(&input) {
        Ok(def) => generate_sql_enum_impl(&def).into(),
        Err(e) => e.to_compile_error().into(),
    }
}

fn generate_sql_enum_impl(def: &EnumDef) -> proc_macro2::TokenStream {
    let name = &def.name;
    let name_lit = name.to_string();
    let (impl_generics, ty_generics, where_clause) = def.generics.split_for_impl();
    let storage = syn::Ident::new(def.storage.variant(), Span::call_site());
    let variants = &def.variants;
    let variant_names: Vec<String> = variants.iter().map(ToString::to_string).collect();

    quote! {
        impl #impl_generics rowmap_core::SqlEnum for #name #ty_generics #where_clause {
            const NAME: &'static str = #name_lit;
            const VARIANTS: &'static [(&'static str, i64)] = &[
                #((#variant_names, #name::#variants as i64),)*
            ];
            const STORAGE: rowmap_core::SqlType = rowmap_core::SqlType::#storage;

            fn from_discriminant(discriminant: i64) -> ::core::option::Option<Self> {
                #(
                    if discriminant == #name::#variants as i64 {
                        return ::core::option::Option::Some(#name::#variants);
                    }
                )*
                ::core::option::Option::None
            }

            fn discriminant(self) -> i64 {
                self as i64
            }
        }

        rowmap_core::sql_enum_value!(#name #ty_generics);
    }
}
