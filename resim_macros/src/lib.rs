use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields, GenericArgument, Index, PathArguments, Type};

fn reject_generics(ast: &DeriveInput) -> Option<TokenStream> {
    if ast.generics.params.is_empty() {
        return None;
    }

    // Each payload type owns a single static type index, which a generic
    // impl cannot provide per instantiation.
    let err = syn::Error::new_spanned(&ast.generics, "payload types cannot be generic");
    Some(err.to_compile_error().into())
}

fn type_index_fn() -> proc_macro2::TokenStream {
    quote! {
        fn type_index() -> usize {
            static TYPE_INDEX: ::std::sync::OnceLock<usize> = ::std::sync::OnceLock::new();

            *TYPE_INDEX.get_or_init(|| ::resim::payload::next_id())
        }
    }
}

#[proc_macro_derive(Payload)]
pub fn payload_derive(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);
    if let Some(err) = reject_generics(&ast) {
        return err;
    }

    let name = &ast.ident;
    let type_index = type_index_fn();

    let gen = quote! {
        // Use absolute paths that work both inside and outside the crate
        impl ::resim::payload::Payload for #name {
            type Record = ::resim::container::FieldRecord<#name>;
            const KIND: ::resim::payload::PayloadKind = ::resim::payload::PayloadKind::Field;

            #type_index
        }
    };

    gen.into()
}

/// Returns `T` when `ty` is written as `Vec<T>` (any path ending in `Vec`).
fn vec_item(ty: &Type) -> Option<&Type> {
    let Type::Path(tp) = ty else {
        return None;
    };

    let seg = tp.path.segments.last()?;
    if seg.ident != "Vec" {
        return None;
    }

    match &seg.arguments {
        PathArguments::AngleBracketed(ab) => match ab.args.first() {
            Some(GenericArgument::Type(t)) => Some(t),
            _ => None,
        },
        _ => None,
    }
}

#[proc_macro_derive(ListPayload)]
pub fn list_payload_derive(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);
    if let Some(err) = reject_generics(&ast) {
        return err;
    }

    let name = &ast.ident;

    let Data::Struct(data) = &ast.data else {
        return syn::Error::new_spanned(name, "ListPayload can only be derived for structs")
            .to_compile_error()
            .into();
    };

    // The first `Vec<_>` field holds the items.
    let found = match &data.fields {
        Fields::Named(named) => named.named.iter().find_map(|f| {
            let ident = f.ident.as_ref()?;
            vec_item(&f.ty).map(|item| (quote!(#ident), item))
        }),
        Fields::Unnamed(unnamed) => unnamed.unnamed.iter().enumerate().find_map(|(i, f)| {
            let index = Index::from(i);
            vec_item(&f.ty).map(|item| (quote!(#index), item))
        }),
        Fields::Unit => None,
    };

    let Some((field, item)) = found else {
        return syn::Error::new_spanned(name, "ListPayload needs a `Vec<Item>` field")
            .to_compile_error()
            .into();
    };

    let type_index = type_index_fn();

    let gen = quote! {
        impl ::resim::payload::Payload for #name {
            type Record = ::resim::container::ListRecord<#name>;
            const KIND: ::resim::payload::PayloadKind = ::resim::payload::PayloadKind::List;

            #type_index
        }

        impl ::resim::payload::ListPayload for #name {
            type Item = #item;

            fn items(&self) -> &[Self::Item] {
                &self.#field
            }

            fn from_items(items: ::std::vec::Vec<Self::Item>) -> Self {
                let mut value = <Self as ::std::default::Default>::default();
                value.#field = items;
                value
            }
        }
    };

    gen.into()
}
