//! Implementation of `#[derive(NativeType)]`.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Data, DeriveInput, Fields, parse_macro_input};

use crate::attrs::{CopyAttr, FieldAttrs, TypeAttrs};

pub fn derive_native_type_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match derive_native_type_inner(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn derive_native_type_inner(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let attrs = TypeAttrs::from_attrs(&input.attrs)?;

    let native_type = generate_native_type(input, &attrs);
    let host_cast = generate_host_cast(input);
    let fields = generate_define_fields(input)?;

    Ok(quote! {
        #native_type
        #host_cast
        #fields
    })
}

fn generate_native_type(input: &DeriveInput, attrs: &TypeAttrs) -> TokenStream2 {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let copy = match attrs.copy {
        CopyAttr::None => quote! {},
        CopyAttr::Bitwise => quote! { .bitwise_copy() },
        CopyAttr::Clone => quote! { .cloneable() },
    };
    let shared = attrs.shared.then(|| quote! { .shared_from_this() });

    quote! {
        impl #impl_generics ::hostbind::NativeType for #name #ty_generics #where_clause {
            fn capabilities() -> ::hostbind::Capabilities<Self> {
                ::hostbind::Capabilities::new() #copy #shared
            }
        }
    }
}

fn generate_host_cast(input: &DeriveInput) -> TokenStream2 {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    quote! {
        impl #impl_generics ::hostbind::HostCast for #name #ty_generics #where_clause {
            type Kind = ::hostbind::Bound;

            fn from_host(
                rt: &mut ::hostbind::HostRuntime,
                value: &::hostbind::Value,
                cleanup: &mut ::hostbind::CleanupList,
            ) -> ::hostbind::HostResult<Self> {
                ::hostbind::bound::from_host(rt, value, cleanup)
            }

            fn into_host(self, rt: &mut ::hostbind::HostRuntime) -> ::hostbind::HostResult<::hostbind::Value> {
                ::hostbind::bound::into_host(rt, self)
            }

            fn borrowed_into_host(
                &self,
                rt: &mut ::hostbind::HostRuntime,
                parent: ::hostbind::Handle,
            ) -> ::hostbind::HostResult<::hostbind::Value> {
                ::hostbind::bound::borrowed(rt, self, parent)
            }

            fn assign_from_host(
                slot: &mut Self,
                rt: &mut ::hostbind::HostRuntime,
                value: &::hostbind::Value,
            ) -> ::hostbind::HostResult<()> {
                ::hostbind::bound::assign(slot, rt, value)
            }
        }
    }
}

fn generate_define_fields(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            name,
            "NativeType can only be derived for structs",
        ));
    };

    let mut defs = Vec::new();
    if let Fields::Named(fields) = &data.fields {
        for field in &fields.named {
            let attrs = FieldAttrs::from_attrs(&field.attrs)?;
            if !attrs.is_exposed() {
                continue;
            }
            let Some(ident) = &field.ident else { continue };
            let prop = attrs.name.clone().unwrap_or_else(|| ident.to_string());

            defs.push(if attrs.set {
                quote! {
                    let class = class.def_rw(#prop, |this: &Self| &this.#ident, |this: &mut Self| &mut this.#ident)?;
                }
            } else {
                quote! {
                    let class = class.def_ro(#prop, |this: &Self| &this.#ident)?;
                }
            });
        }
    } else {
        for field in data.fields.iter() {
            if FieldAttrs::from_attrs(&field.attrs)?.is_exposed() {
                return Err(syn::Error::new_spanned(
                    field,
                    "only named fields can be exposed as properties",
                ));
            }
        }
    }

    Ok(quote! {
        impl #impl_generics ::hostbind::DefineFields for #name #ty_generics #where_clause {
            fn define_fields<'rt, B, A>(
                class: ::hostbind::Class<'rt, Self, B, A>,
            ) -> ::hostbind::HostResult<::hostbind::Class<'rt, Self, B, A>>
            where
                A: ::hostbind::Upcast<Self>,
            {
                #(#defs)*
                Ok(class)
            }
        }
    })
}
