use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Ident, LitStr};

pub fn derive_record(input: &DeriveInput) -> TokenStream {
    let name = &input.ident;

    let collection = extract_collection(input);
    let id_field = match marked_field(input, "id").or_else(|| named_field(input, "id")) {
        Some(field) => field,
        None => {
            return syn::Error::new_spanned(
                name,
                "Record derive: no field marked with #[record(id)] and no field named `id`",
            )
            .to_compile_error();
        }
    };
    let created_field = match marked_field(input, "created") {
        Some(field) => field,
        None => {
            return syn::Error::new_spanned(
                name,
                "Record derive: mark the creation timestamp with #[record(created)]",
            )
            .to_compile_error();
        }
    };
    let created_name = to_camel_case(&created_field.to_string());

    quote! {
        impl library_sync::Record for #name {
            const COLLECTION: &'static str = #collection;
            const CREATED_FIELD: &'static str = #created_name;

            fn id(&self) -> &str {
                &self.#id_field
            }

            fn created_at(&self) -> library_sync::Timestamp {
                self.#created_field
            }
        }
    }
}

fn extract_collection(input: &DeriveInput) -> String {
    for attr in &input.attrs {
        if !attr.path().is_ident("record") {
            continue;
        }

        let mut collection = None;
        let _ = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("collection") {
                let value: LitStr = meta.value()?.parse()?;
                collection = Some(value.value());
            }
            Ok(())
        });

        if let Some(c) = collection {
            return c;
        }
    }

    format!("{}s", to_snake_case(&input.ident.to_string()))
}

/// Finds the field carrying `#[record(<marker>)]`.
fn marked_field(input: &DeriveInput, marker: &str) -> Option<Ident> {
    let Data::Struct(data_struct) = &input.data else {
        return None;
    };
    let Fields::Named(fields) = &data_struct.fields else {
        return None;
    };

    for field in &fields.named {
        for attr in &field.attrs {
            if !attr.path().is_ident("record") {
                continue;
            }
            let mut hit = false;
            let _ = attr.parse_nested_meta(|meta| {
                if meta.path.is_ident(marker) {
                    hit = true;
                }
                Ok(())
            });
            if hit {
                return field.ident.clone();
            }
        }
    }

    None
}

fn named_field(input: &DeriveInput, wanted: &str) -> Option<Ident> {
    let Data::Struct(data_struct) = &input.data else {
        return None;
    };
    let Fields::Named(fields) = &data_struct.fields else {
        return None;
    };

    fields
        .named
        .iter()
        .filter_map(|field| field.ident.clone())
        .find(|ident| ident == wanted)
}

fn to_snake_case(s: &str) -> String {
    let mut result = String::new();
    for (i, ch) in s.chars().enumerate() {
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

fn to_camel_case(s: &str) -> String {
    let mut result = String::new();
    let mut upper_next = false;
    for ch in s.chars() {
        if ch == '_' {
            upper_next = !result.is_empty();
        } else if upper_next {
            result.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            result.push(ch);
        }
    }
    result
}
