use proc_macro::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, LitStr, parse_macro_input};

/// Derive macro describing a struct as a coerce record.
///
/// Implements `Reflect`, `HasShape`, `IntoValue` and `FromValue` from
/// `rhi_coerce_core::reflect`. The record type is built on first use and
/// cached.
///
/// # Example
///
/// ```ignore
/// #[derive(Record)]
/// #[record(name = "shop.Order")]
/// pub struct Order {
///     pub id: i64,
///     #[record(rename = "lines")]
///     pub items: Vec<String>,
///     #[record(skip)]
///     pub cache: Option<String>,
/// }
/// ```
///
/// Every field type must implement the three value traits. Skipped fields
/// are not part of the record and come back as `Default::default()`.
#[proc_macro_derive(Record, attributes(record))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match derive_impl(&input) {
        Ok(tokens) => tokens,
        Err(e) => e.to_compile_error().into(),
    }
}

struct RecordField<'a> {
    ident: &'a syn::Ident,
    ty: &'a syn::Type,
    key: String,
}

fn derive_impl(input: &DeriveInput) -> Result<TokenStream, syn::Error> {
    let name = &input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Record cannot be derived for generic types",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "Record only supports structs with named fields",
                ));
            }
        },
        _ => return Err(syn::Error::new_spanned(name, "Record only supports structs")),
    };

    let mut type_name: Option<String> = None;
    for attr in &input.attrs {
        if !attr.path().is_ident("record") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                let value: LitStr = meta.value()?.parse()?;
                type_name = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("expected `name = \"...\"`"))
            }
        })?;
    }
    let type_name = match type_name {
        Some(type_name) => quote! { #type_name },
        None => {
            let ident = name.to_string();
            quote! { ::core::concat!(::core::module_path!(), "::", #ident) }
        }
    };

    let mut included = Vec::new();
    let mut skipped = Vec::new();
    for field in fields {
        let ident = field
            .ident
            .as_ref()
            .ok_or_else(|| syn::Error::new_spanned(field, "expected named field"))?;

        let mut key = ident.to_string();
        let mut skip = false;
        for attr in &field.attrs {
            if !attr.path().is_ident("record") {
                continue;
            }
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename") {
                    let value: LitStr = meta.value()?.parse()?;
                    key = value.value();
                    Ok(())
                } else if meta.path.is_ident("skip") {
                    skip = true;
                    Ok(())
                } else {
                    Err(meta.error("expected `rename = \"...\"` or `skip`"))
                }
            })?;
        }

        if skip {
            skipped.push(ident);
        } else {
            included.push(RecordField {
                ident,
                ty: &field.ty,
                key,
            });
        }
    }

    let declare = included.iter().map(|f| {
        let (key, ty) = (&f.key, f.ty);
        quote! {
            .field(#key, <#ty as ::rhi_coerce_core::reflect::HasShape>::shape())
        }
    });
    let store = included.iter().map(|f| {
        let (key, ident) = (&f.key, f.ident);
        quote! {
            (#key, ::rhi_coerce_core::reflect::IntoValue::into_value(self.#ident))
        }
    });
    let load = included.iter().map(|f| {
        let (key, ident, ty) = (&f.key, f.ident, f.ty);
        quote! {
            #ident: <#ty as ::rhi_coerce_core::reflect::FromValue>::from_value(record.get(#key)?)
                .map_err(|e| e.with_context(#key))?,
        }
    });
    let defaults = skipped.iter().map(|ident| {
        quote! { #ident: ::core::default::Default::default(), }
    });

    let expanded = quote! {
        impl ::rhi_coerce_core::reflect::Reflect for #name {
            fn record_type() -> ::std::sync::Arc<::rhi_coerce_core::RecordType> {
                static TYPE: ::std::sync::OnceLock<::std::sync::Arc<::rhi_coerce_core::RecordType>> =
                    ::std::sync::OnceLock::new();
                ::std::sync::Arc::clone(TYPE.get_or_init(|| {
                    ::rhi_coerce_core::RecordType::builder(#type_name)
                        #(#declare)*
                        .build()
                }))
            }

            fn into_record(self) -> ::rhi_coerce_core::RecordValue {
                ::rhi_coerce_core::RecordValue::from_fields(
                    &<Self as ::rhi_coerce_core::reflect::Reflect>::record_type(),
                    [#(#store),*],
                )
            }

            fn from_record(
                record: &::rhi_coerce_core::RecordValue,
            ) -> ::core::result::Result<Self, ::rhi_coerce_core::ConvertError> {
                ::core::result::Result::Ok(Self {
                    #(#load)*
                    #(#defaults)*
                })
            }
        }

        impl ::rhi_coerce_core::reflect::HasShape for #name {
            fn shape() -> ::rhi_coerce_core::Shape {
                ::rhi_coerce_core::Shape::record(
                    &<Self as ::rhi_coerce_core::reflect::Reflect>::record_type(),
                )
            }
        }

        impl ::rhi_coerce_core::reflect::IntoValue for #name {
            fn into_value(self) -> ::rhi_coerce_core::Value {
                ::rhi_coerce_core::Value::record(
                    <Self as ::rhi_coerce_core::reflect::Reflect>::into_record(self),
                )
            }
        }

        impl ::rhi_coerce_core::reflect::FromValue for #name {
            fn from_value(
                value: &::rhi_coerce_core::Value,
            ) -> ::core::result::Result<Self, ::rhi_coerce_core::ConvertError> {
                match value {
                    ::rhi_coerce_core::Value::Record(record) => {
                        <Self as ::rhi_coerce_core::reflect::Reflect>::from_record(&record.read())
                    }
                    other => ::core::result::Result::Err(
                        ::rhi_coerce_core::ConvertError::unsupported(
                            other,
                            &<Self as ::rhi_coerce_core::reflect::HasShape>::shape(),
                        ),
                    ),
                }
            }
        }
    };

    Ok(expanded.into())
}
