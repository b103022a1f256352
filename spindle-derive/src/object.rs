// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use crate::util::{parse_field_meta, parse_struct_meta};
use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{Data, DeriveInput, Fields, Index, Member};

struct SourceField<'a> {
    member: Member,
    wire_name: String,
    ty: &'a syn::Type,
    skip: bool,
}

pub fn derive_graph_object(input: &DeriveInput) -> syn::Result<TokenStream> {
    let ident = &input.ident;
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "GraphObject cannot be derived for generic types",
        ));
    }
    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            ident,
            "GraphObject can only be derived for structs",
        ));
    };
    let meta = parse_struct_meta(&input.attrs)?;
    let type_name = meta.name.unwrap_or_else(|| ident.to_string());
    let fields = source_fields(&data.fields)?;

    let def_fields = fields.iter().filter(|f| !f.skip).map(|f| {
        let (ty, name) = (f.ty, &f.wire_name);
        quote! { .field_of::<#ty>(#name) }
    });
    let record = meta.record.then(|| quote! { .record() });

    let sets = fields.iter().filter(|f| !f.skip).map(|f| {
        let (member, name) = (&f.member, &f.wire_name);
        quote! {
            object.set(#name, ::spindle_core::typed::GraphObject::to_value(&self.#member, context)?)?;
        }
    });

    let inits = fields.iter().map(|f| {
        let (member, ty, name) = (&f.member, f.ty, &f.wire_name);
        if f.skip {
            quote! { #member: ::std::default::Default::default() }
        } else {
            quote! { #member: context.field::<#ty>(&object, #name)? }
        }
    });
    let construct = match &data.fields {
        Fields::Unit => quote! { Ok(#ident) },
        _ => quote! { Ok(#ident { #(#inits),* }) },
    };

    Ok(quote! {
        impl ::spindle_core::typed::GraphStruct for #ident {
            const TYPE_NAME: &'static str = #type_name;

            fn type_def() -> ::std::result::Result<::spindle_core::meta::TypeDef, ::spindle_core::error::Error> {
                ::spindle_core::meta::TypeDef::builder(Self::TYPE_NAME)
                    #(#def_fields)*
                    #record
                    .build()
            }
        }

        impl ::spindle_core::typed::GraphObject for #ident {
            fn field_type() -> ::spindle_core::meta::FieldType {
                ::spindle_core::meta::FieldType::object(
                    <Self as ::spindle_core::typed::GraphStruct>::TYPE_NAME,
                )
            }

            fn to_value(
                &self,
                context: &mut ::spindle_core::typed::ToValueContext,
            ) -> ::std::result::Result<::spindle_core::value::Value, ::spindle_core::error::Error> {
                let def = context.type_def::<Self>()?;
                #[allow(unused_mut)]
                let mut object = ::spindle_core::value::Object::new(&def);
                #(#sets)*
                Ok(::spindle_core::value::Value::object(object))
            }

            fn from_value(
                value: &::spindle_core::value::Value,
                context: &mut ::spindle_core::typed::FromValueContext,
            ) -> ::std::result::Result<Self, ::spindle_core::error::Error> {
                let object = context.object::<Self>(value)?;
                #[allow(unused_variables)]
                let object = object.borrow();
                #construct
            }
        }
    })
}

fn source_fields(fields: &Fields) -> syn::Result<Vec<SourceField<'_>>> {
    fields
        .iter()
        .enumerate()
        .map(|(i, field)| {
            let meta = parse_field_meta(field)?;
            let (member, default_name) = match &field.ident {
                Some(ident) => (Member::Named(ident.clone()), ident.to_string()),
                None => (Member::Unnamed(Index::from(i)), format_ident!("_{}", i).to_string()),
            };
            Ok(SourceField {
                member,
                wire_name: meta.rename.unwrap_or(default_name),
                ty: &field.ty,
                skip: meta.skip,
            })
        })
        .collect()
}
