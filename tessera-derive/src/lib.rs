//! # Tessera Derive Macros
//!
//! This crate provides the procedural macros for `tessera`:
//!
//! * `#[derive(Archive)]` generates the `#[repr(C)]` archived view of a struct or enum
//!   and implements `Archive` (serialization and fingerprint) for the owned type and
//!   `Verify` (validation and byte-order fix-up) for the view.
//! * `#[derive(Reflect)]` implements field-level reflection for structs.
//!
//! Both walk the same field list, so `#[tessera(skip)]` hides a field from all of
//! them.
//!
//! Compatible with `syn 2.0`.

use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::{format_ident, quote};
use syn::{
    parse_macro_input, parse_quote, Attribute, Data, DataEnum, DataStruct, DeriveInput, Fields,
    Generics, Ident, Index, LitInt, Member, Type, Visibility,
};

/// Derives `tessera::Archive` and an archived view type `Archived<Name>`.
///
/// Container attributes:
/// * `#[tessera(version = N)]`: schema version stored in the version trailer.
/// * `#[tessera(derive(Trait, ...))]`: derives added to the archived type.
/// * `#[tessera(compare)]`: implements `PartialEq<Name>` for the archived type.
///
/// Field attributes:
/// * `#[tessera(skip)]`: the field is not archived.
#[proc_macro_derive(Archive, attributes(tessera))]
pub fn derive_archive(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let expanded = match &input.data {
        Data::Struct(data) => expand_struct(&input, data),
        Data::Enum(data) => expand_enum(&input, data),
        Data::Union(u) => Err(syn::Error::new_spanned(
            u.union_token,
            "Archive cannot be derived for unions",
        )),
    };
    expanded.unwrap_or_else(syn::Error::into_compile_error).into()
}

/// Derives `tessera::Reflect` for a struct.
#[proc_macro_derive(Reflect, attributes(tessera))]
pub fn derive_reflect(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_reflect(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

// --- Attributes ---

#[derive(Default)]
struct ContainerAttrs {
    version: u32,
    derives: Vec<syn::Path>,
    compare: bool,
}

fn parse_container_attrs(attrs: &[Attribute]) -> syn::Result<ContainerAttrs> {
    let mut out = ContainerAttrs::default();
    for attr in attrs {
        if !attr.path().is_ident("tessera") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("version") {
                let lit: LitInt = meta.value()?.parse()?;
                out.version = lit.base10_parse()?;
                return Ok(());
            }
            if meta.path.is_ident("compare") {
                out.compare = true;
                return Ok(());
            }
            if meta.path.is_ident("derive") {
                return meta.parse_nested_meta(|inner| {
                    out.derives.push(inner.path.clone());
                    Ok(())
                });
            }
            Err(meta.error("unknown tessera attribute. Supported: version, derive, compare"))
        })?;
    }
    Ok(out)
}

fn is_skipped(attrs: &[Attribute]) -> syn::Result<bool> {
    let mut skip = false;
    for attr in attrs {
        if !attr.path().is_ident("tessera") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                skip = true;
                return Ok(());
            }
            Err(meta.error("unknown tessera field attribute. Supported: skip"))
        })?;
    }
    Ok(skip)
}

// --- Field analysis ---

struct FieldInfo {
    /// Member in the owned type.
    member: Member,
    /// Member in the archived type (tuple indices close the gaps left by skips).
    archived: Member,
    /// Name used for the field in generated helper structs and bindings.
    ident: Ident,
    ty: Type,
    vis: Visibility,
    docs: Vec<Attribute>,
    skip: bool,
}

fn collect_fields(fields: &Fields) -> syn::Result<Vec<FieldInfo>> {
    let mut out = Vec::new();
    let mut kept = 0;
    for (i, field) in fields.iter().enumerate() {
        let skip = is_skipped(&field.attrs)?;
        let (member, archived, ident) = match &field.ident {
            Some(id) => (Member::Named(id.clone()), Member::Named(id.clone()), id.clone()),
            None => (
                Member::Unnamed(Index::from(i)),
                Member::Unnamed(Index::from(kept)),
                format_ident!("_{}", kept),
            ),
        };
        if !skip {
            kept += 1;
        }
        out.push(FieldInfo {
            member,
            archived,
            ident,
            ty: field.ty.clone(),
            vis: field.vis.clone(),
            docs: field
                .attrs
                .iter()
                .filter(|a| a.path().is_ident("doc"))
                .cloned()
                .collect(),
            skip,
        });
    }
    Ok(out)
}

fn kept(fields: &[FieldInfo]) -> impl Iterator<Item = &FieldInfo> + Clone {
    fields.iter().filter(|f| !f.skip)
}

fn reject_lifetimes(generics: &Generics, what: &str) -> syn::Result<()> {
    match generics.lifetimes().next() {
        Some(lt) => Err(syn::Error::new_spanned(
            lt,
            format!("{what} cannot be derived for types with lifetime parameters"),
        )),
        None => Ok(()),
    }
}

/// `generics` with `bound` added to every type parameter.
fn bounded(generics: &Generics, bound: TokenStream2) -> Generics {
    let mut generics = generics.clone();
    let params: Vec<Ident> = generics.type_params().map(|p| p.ident.clone()).collect();
    let where_clause = generics.make_where_clause();
    for param in params {
        where_clause.predicates.push(parse_quote!(#param: #bound));
    }
    generics
}

fn archived_ty(ty: &Type) -> TokenStream2 {
    quote! { <#ty as ::tessera::rt::Archive>::Archived }
}

/// Body of a struct definition (fields plus the correctly placed where clause).
fn struct_body(fields: &Fields, infos: &[FieldInfo], generics: &Generics) -> TokenStream2 {
    let where_clause = &generics.where_clause;
    let defs = kept(infos).map(|f| {
        let docs = &f.docs;
        let vis = &f.vis;
        let ty = archived_ty(&f.ty);
        match &f.member {
            Member::Named(ident) => quote! { #(#docs)* #vis #ident: #ty },
            Member::Unnamed(_) => quote! { #(#docs)* #vis #ty },
        }
    });
    match fields {
        Fields::Named(_) => quote! { #where_clause { #(#defs,)* } },
        Fields::Unnamed(_) => quote! { ( #(#defs,)* ) #where_clause; },
        Fields::Unit => quote! { #where_clause; },
    }
}

fn fingerprint_fields<'a>(fields: impl Iterator<Item = &'a FieldInfo> + Clone) -> TokenStream2 {
    let count = fields.clone().count() as u64;
    let types = fields.map(|f| &f.ty);
    quote! {
        hasher.write_u64(#count);
        #( hasher.visit::<#types>()?; )*
    }
}

fn derive_list(attrs: &ContainerAttrs) -> TokenStream2 {
    let derives = &attrs.derives;
    if derives.is_empty() {
        quote! {}
    } else {
        quote! { #[derive(#(#derives),*)] }
    }
}

/// Verify calls for fields of the value behind `base`, with `addr` being `addr_of` or
/// `addr_of_mut`.
fn field_checks<'a>(
    fields: impl Iterator<Item = &'a FieldInfo>,
    base: &Ident,
    member: impl Fn(&FieldInfo) -> TokenStream2,
    call: TokenStream2,
    addr: TokenStream2,
    arg: &Ident,
) -> TokenStream2 {
    let calls: Vec<_> = fields
        .map(|f| {
            let m = member(f);
            quote! { #call(::tessera::rt::#addr!((*#base).#m), #arg)?; }
        })
        .collect();
    if calls.is_empty() {
        return quote! {};
    }
    quote! {
        // SAFETY: fields of a value the caller vouched for.
        unsafe { #(#calls)* }
    }
}

// --- Structs ---

fn expand_struct(input: &DeriveInput, data: &DataStruct) -> syn::Result<TokenStream2> {
    reject_lifetimes(&input.generics, "Archive")?;
    let attrs = parse_container_attrs(&input.attrs)?;
    let name = &input.ident;
    let vis = &input.vis;
    let archived = format_ident!("Archived{}", name);
    let infos = collect_fields(&data.fields)?;

    let generics = bounded(&input.generics, quote!(::tessera::rt::Archive));
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let body = struct_body(&data.fields, &infos, &generics);
    let derives = derive_list(&attrs);
    let doc = format!("Archived form of [`{name}`].");
    let version = attrs.version;

    let serialize = kept(&infos).map(|f| {
        let member = &f.member;
        let archived_member = &f.archived;
        quote! {
            ::tessera::rt::Archive::serialize_into(
                &self.#member,
                serializer,
                pos + ::tessera::rt::offset_of!(#archived #ty_generics, #archived_member) as u64,
            )?;
        }
    });
    let fingerprint = fingerprint_fields(kept(&infos));

    let ptr = format_ident!("ptr");
    let validator = format_ident!("validator");
    let fixup = format_ident!("fixup");
    let verify = field_checks(
        kept(&infos),
        &ptr,
        |f| {
            let m = &f.archived;
            quote!(#m)
        },
        quote!(::tessera::rt::Verify::verify),
        quote!(addr_of),
        &validator,
    );
    let fix = field_checks(
        kept(&infos),
        &ptr,
        |f| {
            let m = &f.archived;
            quote!(#m)
        },
        quote!(::tessera::rt::Verify::fix_endian),
        quote!(addr_of_mut),
        &fixup,
    );

    let compare = if attrs.compare {
        let mut cmp_generics = generics.clone();
        let predicates = &mut cmp_generics.make_where_clause().predicates;
        for f in kept(&infos) {
            let ty = &f.ty;
            let aty = archived_ty(ty);
            predicates.push(parse_quote!(#aty: ::core::cmp::PartialEq<#ty>));
        }
        let (impl_g, _, where_g) = cmp_generics.split_for_impl();
        let eqs = kept(&infos).map(|f| {
            let a = &f.archived;
            let m = &f.member;
            quote! { && self.#a == other.#m }
        });
        quote! {
            impl #impl_g ::core::cmp::PartialEq<#name #ty_generics> for #archived #ty_generics #where_g {
                fn eq(&self, other: &#name #ty_generics) -> bool {
                    true #(#eqs)*
                }
            }
        }
    } else {
        quote! {}
    };

    Ok(quote! {
        #[doc = #doc]
        #derives
        #[repr(C)]
        #vis struct #archived #impl_generics #body

        impl #impl_generics ::tessera::rt::Archive for #name #ty_generics #where_clause {
            type Archived = #archived #ty_generics;
            const VERSION: u32 = #version;

            fn serialize_into<__W: ::tessera::rt::Target + ?Sized>(
                &self,
                serializer: &mut ::tessera::rt::Serializer<'_, __W>,
                pos: u64,
            ) -> ::tessera::rt::Result<()> {
                let _ = (&serializer, pos);
                #(#serialize)*
                Ok(())
            }

            fn fingerprint(hasher: &mut ::tessera::rt::TypeHasher) -> ::tessera::rt::Result<()> {
                hasher.write_tag("struct");
                #fingerprint
                Ok(())
            }
        }

        // SAFETY: every field is verified (and byte-swapped) through its own `Verify`.
        unsafe impl #impl_generics ::tessera::rt::Verify for #archived #ty_generics #where_clause {
            unsafe fn verify(
                ptr: *const Self,
                validator: &mut ::tessera::rt::Validator<'_>,
            ) -> ::tessera::rt::Result<()> {
                let _ = (&ptr, &validator);
                #verify
                Ok(())
            }

            unsafe fn fix_endian(
                ptr: *mut Self,
                fixup: &mut ::tessera::rt::EndianFixup<'_>,
            ) -> ::tessera::rt::Result<()> {
                let _ = (&ptr, &fixup);
                #fix
                Ok(())
            }
        }

        #compare
    })
}

// --- Enums ---

struct VariantInfo {
    ident: Ident,
    fields: Fields,
    infos: Vec<FieldInfo>,
    /// Hidden `#[repr(C)]` struct mirroring the variant's layout, tag first.
    layout: Ident,
}

impl VariantInfo {
    /// Pattern matching the variant of the owned enum, binding kept fields.
    fn owned_pattern(&self, path: TokenStream2) -> TokenStream2 {
        let ident = &self.ident;
        let binds = self.infos.iter().map(|f| {
            let bind = binding(f);
            match &f.member {
                Member::Named(name) if f.skip => quote!(#name: _),
                Member::Named(name) => quote!(#name: #bind),
                Member::Unnamed(_) if f.skip => quote!(_),
                Member::Unnamed(_) => quote!(#bind),
            }
        });
        match &self.fields {
            Fields::Named(_) => quote!(#path::#ident { #(#binds),* }),
            Fields::Unnamed(_) => quote!(#path::#ident ( #(#binds),* )),
            Fields::Unit => quote!(#path::#ident),
        }
    }

    /// Pattern matching the variant of the archived enum, binding every field.
    fn archived_pattern(&self, prefix: &str) -> TokenStream2 {
        let ident = &self.ident;
        let binds = kept(&self.infos).map(|f| {
            let bind = format_ident!("{}{}", prefix, f.ident);
            match &f.member {
                Member::Named(name) => quote!(#name: #bind),
                Member::Unnamed(_) => quote!(#bind),
            }
        });
        match &self.fields {
            Fields::Named(_) => quote!(Self::#ident { #(#binds),* }),
            Fields::Unnamed(_) => quote!(Self::#ident ( #(#binds),* )),
            Fields::Unit => quote!(Self::#ident),
        }
    }

    fn wildcard(&self, path: TokenStream2) -> TokenStream2 {
        let ident = &self.ident;
        match &self.fields {
            Fields::Named(_) => quote!(#path::#ident { .. }),
            Fields::Unnamed(_) => quote!(#path::#ident(..)),
            Fields::Unit => quote!(#path::#ident),
        }
    }
}

fn binding(f: &FieldInfo) -> Ident {
    format_ident!("__f_{}", f.ident)
}

fn expand_enum(input: &DeriveInput, data: &DataEnum) -> syn::Result<TokenStream2> {
    reject_lifetimes(&input.generics, "Archive")?;
    if data.variants.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "Archive cannot be derived for enums without variants",
        ));
    }
    let attrs = parse_container_attrs(&input.attrs)?;
    let name = &input.ident;
    let vis = &input.vis;
    let archived = format_ident!("Archived{}", name);

    let variants = data
        .variants
        .iter()
        .map(|v| {
            Ok(VariantInfo {
                ident: v.ident.clone(),
                fields: v.fields.clone(),
                infos: collect_fields(&v.fields)?,
                layout: format_ident!("__{}{}Layout", archived, v.ident),
            })
        })
        .collect::<syn::Result<Vec<_>>>()?;
    let count = variants.len() as u32;

    let generics = bounded(&input.generics, quote!(::tessera::rt::Archive));
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();
    let derives = derive_list(&attrs);
    let doc = format!("Archived form of [`{name}`].");
    let version = attrs.version;

    let archived_variants = variants.iter().map(|v| {
        let ident = &v.ident;
        let defs = kept(&v.infos).map(|f| {
            let ty = archived_ty(&f.ty);
            let docs = &f.docs;
            match &f.member {
                Member::Named(field) => quote! { #(#docs)* #field: #ty },
                Member::Unnamed(_) => quote! { #(#docs)* #ty },
            }
        });
        match &v.fields {
            Fields::Named(_) => quote! { #ident { #(#defs,)* } },
            Fields::Unnamed(_) => quote! { #ident ( #(#defs,)* ) },
            Fields::Unit => quote! { #ident },
        }
    });

    let type_params: Vec<&Ident> = input.generics.type_params().map(|p| &p.ident).collect();
    let marker = if type_params.is_empty() {
        quote! {}
    } else {
        quote! { __marker: ::core::marker::PhantomData<fn() -> (#(#type_params,)*)>, }
    };
    let layouts = variants.iter().map(|v| {
        let layout = &v.layout;
        let fields = kept(&v.infos).map(|f| {
            let ident = &f.ident;
            let ty = archived_ty(&f.ty);
            quote! { #ident: #ty }
        });
        quote! {
            #[doc(hidden)]
            #[allow(non_camel_case_types, dead_code)]
            #[repr(C)]
            struct #layout #impl_generics #where_clause {
                __tag: u32,
                #(#fields,)*
                #marker
            }
        }
    });

    let serialize_arms = variants.iter().enumerate().map(|(index, v)| {
        let tag = index as u32;
        let pattern = v.owned_pattern(quote!(Self));
        let layout = &v.layout;
        let writes = kept(&v.infos).map(|f| {
            let bind = binding(f);
            let ident = &f.ident;
            quote! {
                ::tessera::rt::Archive::serialize_into(
                    #bind,
                    serializer,
                    pos + ::tessera::rt::offset_of!(#layout #ty_generics, #ident) as u64,
                )?;
            }
        });
        quote! {
            #pattern => {
                serializer.write_scalar(pos, #tag)?;
                #(#writes)*
            }
        }
    });

    let fingerprint_variants = variants.iter().map(|v| fingerprint_fields(kept(&v.infos)));

    let ptr = format_ident!("ptr");
    let layout_ptr = format_ident!("layout");
    let validator = format_ident!("validator");
    let fixup = format_ident!("fixup");
    let member_of = |f: &FieldInfo| {
        let ident = &f.ident;
        quote!(#ident)
    };

    let verify_arms = variants.iter().enumerate().map(|(index, v)| {
        let tag = index as u32;
        let layout = &v.layout;
        let checks = field_checks(
            kept(&v.infos),
            &layout_ptr,
            member_of,
            quote!(::tessera::rt::Verify::verify),
            quote!(addr_of),
            &validator,
        );
        quote! {
            #tag => {
                let layout = #ptr.cast::<#layout #ty_generics>();
                let _ = &layout;
                #checks
            }
        }
    });

    let fix_arms = variants.iter().enumerate().map(|(index, v)| {
        let tag = index as u32;
        let layout = &v.layout;
        let checks = field_checks(
            kept(&v.infos),
            &layout_ptr,
            member_of,
            quote!(::tessera::rt::Verify::fix_endian),
            quote!(addr_of_mut),
            &fixup,
        );
        quote! {
            #tag => {
                let layout = #ptr.cast::<#layout #ty_generics>();
                let _ = &layout;
                #checks
            }
        }
    });

    let name_str = name.to_string();
    let owned_index_arms = variants.iter().enumerate().map(|(index, v)| {
        let tag = index as u32;
        let pattern = v.wildcard(quote!(Self));
        quote! { #pattern => #tag, }
    });
    let archived_index_arms = variants.iter().enumerate().map(|(index, v)| {
        let tag = index as u32;
        let pattern = v.wildcard(quote!(Self));
        quote! { #pattern => #tag, }
    });

    let compare = if attrs.compare {
        let mut cmp_generics = generics.clone();
        let predicates = &mut cmp_generics.make_where_clause().predicates;
        for v in &variants {
            for f in kept(&v.infos) {
                let ty = &f.ty;
                let aty = archived_ty(ty);
                predicates.push(parse_quote!(#aty: ::core::cmp::PartialEq<#ty>));
            }
        }
        let (impl_g, _, where_g) = cmp_generics.split_for_impl();
        let arms = variants.iter().map(|v| {
            let left = v.archived_pattern("__a");
            let right = v.owned_pattern(quote!(#name));
            let eqs = kept(&v.infos).map(|f| {
                let a = format_ident!("__a{}", f.ident);
                let b = binding(f);
                quote! { && #a == #b }
            });
            quote! { (#left, #right) => true #(#eqs)*, }
        });
        quote! {
            impl #impl_g ::core::cmp::PartialEq<#name #ty_generics> for #archived #ty_generics #where_g {
                #[allow(unreachable_patterns)]
                fn eq(&self, other: &#name #ty_generics) -> bool {
                    match (self, other) {
                        #(#arms)*
                        _ => false,
                    }
                }
            }
        }
    } else {
        quote! {}
    };

    Ok(quote! {
        #[doc = #doc]
        #derives
        #[repr(u32)]
        #vis enum #archived #impl_generics #where_clause {
            #(#archived_variants,)*
        }

        #(#layouts)*

        impl #impl_generics ::tessera::rt::Archive for #name #ty_generics #where_clause {
            type Archived = #archived #ty_generics;
            const VERSION: u32 = #version;

            fn serialize_into<__W: ::tessera::rt::Target + ?Sized>(
                &self,
                serializer: &mut ::tessera::rt::Serializer<'_, __W>,
                pos: u64,
            ) -> ::tessera::rt::Result<()> {
                match self {
                    #(#serialize_arms)*
                }
                Ok(())
            }

            fn fingerprint(hasher: &mut ::tessera::rt::TypeHasher) -> ::tessera::rt::Result<()> {
                hasher.write_tag("enum");
                hasher.write_u64(#count as u64);
                #(#fingerprint_variants)*
                Ok(())
            }
        }

        // SAFETY: the tag is checked against the variant count before the matching
        // variant's fields are verified through their own `Verify`.
        unsafe impl #impl_generics ::tessera::rt::Verify for #archived #ty_generics #where_clause {
            unsafe fn verify(
                ptr: *const Self,
                validator: &mut ::tessera::rt::Validator<'_>,
            ) -> ::tessera::rt::Result<()> {
                // SAFETY: the caller checked that a whole value lies at `ptr`.
                let tag = unsafe { ::tessera::rt::read_tag(ptr) };
                match tag {
                    #(#verify_arms)*
                    _ => return Err(::tessera::rt::invalid_tag(#name_str, tag, #count)),
                }
                Ok(())
            }

            unsafe fn fix_endian(
                ptr: *mut Self,
                fixup: &mut ::tessera::rt::EndianFixup<'_>,
            ) -> ::tessera::rt::Result<()> {
                let tag = ::tessera::rt::fix_tag(ptr, fixup)?;
                match tag {
                    #(#fix_arms)*
                    _ => return Err(::tessera::rt::invalid_tag(#name_str, tag, #count)),
                }
                Ok(())
            }
        }

        impl #impl_generics ::tessera::rt::Variant for #name #ty_generics #where_clause {
            const VARIANT_COUNT: u32 = #count;

            fn variant_index(&self) -> u32 {
                match self {
                    #(#owned_index_arms)*
                }
            }
        }

        impl #impl_generics ::tessera::rt::Variant for #archived #ty_generics #where_clause {
            const VARIANT_COUNT: u32 = #count;

            fn variant_index(&self) -> u32 {
                match self {
                    #(#archived_index_arms)*
                }
            }
        }

        #compare
    })
}

// --- Reflect ---

fn expand_reflect(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let data = match &input.data {
        Data::Struct(data) => data,
        _ => {
            return Err(syn::Error::new(
                Span::call_site(),
                "Reflect only supports structs",
            ))
        }
    };
    reject_lifetimes(&input.generics, "Reflect")?;
    let name = &input.ident;
    let infos = collect_fields(&data.fields)?;
    let generics = bounded(&input.generics, quote!('static));
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let names: Vec<String> = kept(&infos)
        .map(|f| match &f.member {
            Member::Named(ident) => ident.to_string(),
            Member::Unnamed(index) => index.index.to_string(),
        })
        .collect();
    let members: Vec<&Member> = kept(&infos).map(|f| &f.member).collect();
    let types: Vec<&Type> = kept(&infos).map(|f| &f.ty).collect();

    Ok(quote! {
        impl #impl_generics ::tessera::rt::Reflect for #name #ty_generics #where_clause {
            const FIELD_NAMES: &'static [&'static str] = &[#(#names),*];

            type Refs<'__a> = ( #(&'__a #types,)* ) where Self: '__a;

            fn as_tuple(&self) -> Self::Refs<'_> {
                ( #(&self.#members,)* )
            }

            fn for_each_field<__V: ::tessera::rt::FieldVisitor>(&self, visitor: &mut __V) {
                let _ = &visitor;
                #( visitor.visit(#names, &self.#members); )*
            }

            fn for_each_field_mut<__V: ::tessera::rt::FieldVisitorMut>(&mut self, visitor: &mut __V) {
                let _ = &visitor;
                #( visitor.visit(#names, &mut self.#members); )*
            }
        }
    })
}
