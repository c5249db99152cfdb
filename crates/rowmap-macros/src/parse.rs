//! Parsing logic for the derive macros.
//!
//! Extracts struct-level and field-level `#[rowmap(...)]` attributes into
//! `EntityDef`/`FieldDef`, and enum variants plus storage into `EnumDef`.

use proc_macro2::Span;
use syn::{Attribute, Data, DeriveInput, Error, Expr, Field, Fields, Generics, Ident, Lit, Result, Type};

/// Largest constructor arity the core crate implements argument lists for.
pub const MAX_CONSTRUCTOR_ARITY: usize = 12;

/// Parsed `#[derive(Entity)]` input.
#[derive(Debug)]
pub struct EntityDef {
    pub name: Ident,
    pub generics: Generics,
    /// Construct through `Default` and assign members afterwards
    pub default: bool,
    /// Generate a preferred constructor over every non-skipped field
    pub constructor: bool,
    /// Also implement `ToParams`
    pub params: bool,
    pub fields: Vec<FieldDef>,
}

impl EntityDef {
    /// Fields that map to columns.
    pub fn mapped_fields(&self) -> Vec<&FieldDef> {
        self.fields.iter().filter(|f| !f.skip).collect()
    }

    pub fn skipped_fields(&self) -> Vec<&FieldDef> {
        self.fields.iter().filter(|f| f.skip).collect()
    }
}

#[derive(Debug)]
pub struct FieldDef {
    pub name: Ident,
    /// Column name; defaults to the field name
    pub column: String,
    pub ty: Type,
    pub skip: bool,
}

/// Parsed `#[derive(SqlEnum)]` input.
#[derive(Debug)]
pub struct EnumDef {
    pub name: Ident,
    pub generics: Generics,
    pub storage: Storage,
    pub variants: Vec<Ident>,
}

/// Parameter storage width for an enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Storage {
    TinyInt,
    SmallInt,
    #[default]
    Integer,
    BigInt,
}

impl Storage {
    fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "tinyint" => Some(Storage::TinyInt),
            "smallint" => Some(Storage::SmallInt),
            "integer" | "int" => Some(Storage::Integer),
            "bigint" => Some(Storage::BigInt),
            _ => None,
        }
    }

    /// `SqlType` variant name.
    pub fn variant(self) -> &'static str {
        match self {
            Storage::TinyInt => "TinyInt",
            Storage::SmallInt => "SmallInt",
            Storage::Integer => "Integer",
            Storage::BigInt => "BigInt",
        }
    }
}

/// Parse a `#[derive(Entity)]` input.
pub fn parse_entity(input: &DeriveInput) -> Result<EntityDef> {
    let fields = match &input.data {
        Data::Struct(data) => parse_fields(&data.fields)?,
        Data::Enum(_) => {
            return Err(Error::new_spanned(
                input,
                "Entity can only be derived for structs, not enums",
            ));
        }
        Data::Union(_) => {
            return Err(Error::new_spanned(
                input,
                "Entity can only be derived for structs, not unions",
            ));
        }
    };

    let mut default = false;
    let mut constructor = false;
    let mut params = false;
    for attr in rowmap_attrs(&input.attrs) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("default") {
                default = true;
                Ok(())
            } else if meta.path.is_ident("constructor") {
                constructor = true;
                Ok(())
            } else if meta.path.is_ident("params") {
                params = true;
                Ok(())
            } else {
                Err(Error::new_spanned(
                    meta.path,
                    "unknown rowmap struct attribute (supported: default, constructor, params)",
                ))
            }
        })?;
    }
    // Parameterless construction unless only a constructor was asked for.
    if !constructor {
        default = true;
    }

    let def = EntityDef {
        name: input.ident.clone(),
        generics: input.generics.clone(),
        default,
        constructor,
        params,
        fields,
    };

    if def.constructor {
        let arity = def.mapped_fields().len();
        if arity == 0 {
            return Err(Error::new_spanned(
                input,
                "#[rowmap(constructor)] needs at least one non-skipped field",
            ));
        }
        if arity > MAX_CONSTRUCTOR_ARITY {
            return Err(Error::new_spanned(
                input,
                format!(
                    "#[rowmap(constructor)] supports at most {MAX_CONSTRUCTOR_ARITY} fields, found {arity}"
                ),
            ));
        }
    }
    Ok(def)
}

fn parse_fields(fields: &Fields) -> Result<Vec<FieldDef>> {
    match fields {
        Fields::Named(named) => named.named.iter().map(parse_field).collect(),
        Fields::Unnamed(_) => Err(Error::new(
            Span::call_site(),
            "Entity requires a struct with named fields, not a tuple struct",
        )),
        Fields::Unit => Err(Error::new(
            Span::call_site(),
            "Entity requires a struct with fields, not a unit struct",
        )),
    }
}

fn parse_field(field: &Field) -> Result<FieldDef> {
    let name = field
        .ident
        .clone()
        .ok_or_else(|| Error::new_spanned(field, "expected named field"))?;

    let mut column = None;
    let mut skip = false;
    for attr in rowmap_attrs(&field.attrs) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                skip = true;
                Ok(())
            } else if meta.path.is_ident("column") {
                if column.is_some() {
                    return Err(Error::new_spanned(
                        meta.path,
                        "duplicate rowmap attribute: column",
                    ));
                }
                let value: Lit = meta.value()?.parse()?;
                if let Lit::Str(lit_str) = value {
                    column = Some(lit_str.value());
                    Ok(())
                } else {
                    Err(Error::new_spanned(
                        value,
                        "expected string literal for column name",
                    ))
                }
            } else {
                Err(Error::new_spanned(
                    meta.path,
                    "unknown rowmap field attribute (supported: column, skip)",
                ))
            }
        })?;
    }

    Ok(FieldDef {
        column: column.unwrap_or_else(|| name.to_string()),
        name,
        ty: field.ty.clone(),
        skip,
    })
}

/// Parse a `#[derive(SqlEnum)]` input.
pub fn parse_enum(input: &DeriveInput) -> Result<EnumDef> {
    let Data::Enum(data) = &input.data else {
        return Err(Error::new_spanned(
            input,
            "SqlEnum can only be derived for enums",
        ));
    };
    if data.variants.is_empty() {
        return Err(Error::new_spanned(input, "SqlEnum needs at least one variant"));
    }

    let mut variants = Vec::with_capacity(data.variants.len());
    for variant in &data.variants {
        if !matches!(variant.fields, Fields::Unit) {
            return Err(Error::new_spanned(
                variant,
                "SqlEnum variants cannot carry data",
            ));
        }
        if let Some((_, discriminant)) = &variant.discriminant {
            if !matches!(discriminant, Expr::Lit(_) | Expr::Unary(_) | Expr::Path(_) | Expr::Paren(_)) {
                return Err(Error::new_spanned(
                    discriminant,
                    "SqlEnum discriminants must be constant integers",
                ));
            }
        }
        variants.push(variant.ident.clone());
    }

    let mut storage = None;
    for attr in rowmap_attrs(&input.attrs) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("storage") {
                let value: Lit = meta.value()?.parse()?;
                let Lit::Str(lit_str) = value else {
                    return Err(Error::new_spanned(value, "expected string literal for storage"));
                };
                storage = Some(Storage::parse(&lit_str.value()).ok_or_else(|| {
                    Error::new_spanned(
                        &lit_str,
                        "storage must be one of: 'tinyint', 'smallint', 'integer', 'bigint'",
                    )
                })?);
                Ok(())
            } else {
                Err(Error::new_spanned(
                    meta.path,
                    "unknown rowmap enum attribute (supported: storage)",
                ))
            }
        })?;
    }

    Ok(EnumDef {
        name: input.ident.clone(),
        generics: input.generics.clone(),
        storage: storage.unwrap_or_default(),
        variants,
    })
}

fn rowmap_attrs(attrs: &[Attribute]) -> impl Iterator<Item = &Attribute> {
    attrs.iter().filter(|attr| attr.path().is_ident("rowmap"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn default_construction_unless_constructor_requested() {
        let input: DeriveInput = parse_quote! {
            struct User {
                id: i64,
                #[rowmap(column = "user_name")]
                name: String,
                #[rowmap(skip)]
                cache: Vec<u8>,
            }
        };
        let def = parse_entity(&input).unwrap();
        assert!(def.default);
        assert!(!def.constructor);
        assert_eq!(def.mapped_fields().len(), 2);
        assert_eq!(def.fields[1].column, "user_name");
        assert_eq!(def.skipped_fields()[0].name, "cache");
    }

    #[test]
    fn constructor_only() {
        let input: DeriveInput = parse_quote! {
            #[rowmap(constructor, params)]
            struct Point { x: i32, y: i32 }
        };
        let def = parse_entity(&input).unwrap();
        assert!(!def.default);
        assert!(def.constructor);
        assert!(def.params);
    }

    #[test]
    fn rejects_bad_entity_input() {
        let tuple: DeriveInput = parse_quote! { struct P(i32); };
        assert!(parse_entity(&tuple).is_err());

        let unknown: DeriveInput = parse_quote! {
            #[rowmap(table = "x")]
            struct P { a: i32 }
        };
        assert!(parse_entity(&unknown).is_err());

        let empty_ctor: DeriveInput = parse_quote! {
            #[rowmap(constructor)]
            struct P { #[rowmap(skip)] a: i32 }
        };
        assert!(parse_entity(&empty_ctor).is_err());
    }

    #[test]
    fn enum_storage_and_variants() {
        let input: DeriveInput = parse_quote! {
            #[rowmap(storage = "TinyInt")]
            enum Color { Red = 1, Green, Blue = -3 }
        };
        let def = parse_enum(&input).unwrap();
        assert_eq!(def.storage, Storage::TinyInt);
        assert_eq!(def.variants.len(), 3);

        let plain: DeriveInput = parse_quote! { enum E { A } };
        assert_eq!(parse_enum(&plain).unwrap().storage, Storage::Integer);
    }

    #[test]
    fn rejects_data_carrying_enums() {
        let input: DeriveInput = parse_quote! { enum E { A(i32) } };
        assert!(parse_enum(&input).is_err());
        let input: DeriveInput = parse_quote! {
            #[rowmap(storage = "text")]
            enum E { A }
        };
        assert!(parse_enum(&input).is_err());
    }
}
